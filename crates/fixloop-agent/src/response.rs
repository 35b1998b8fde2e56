use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use fixloop_core::{GeneratorResponse, Proposal};

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```(?P<lang>[A-Za-z0-9_+-]*)[ \t]*\r?\n(?P<body>.*?)```").unwrap();
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    code: String,
    #[serde(default)]
    diagnosis: Option<String>,
}

/// Turn raw generator text into a proposal.
///
/// Accepted shapes, in order: a bare JSON object, a fenced `json` block, a
/// JSON object embedded in prose, a fenced code block. Anything else, or a
/// proposal whose code is empty or only braces, is [`GeneratorResponse::NoResponse`].
pub fn parse_response(text: &str) -> GeneratorResponse {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return GeneratorResponse::NoResponse;
    }

    let proposal = parse_json(trimmed)
        .or_else(|| fenced_blocks(trimmed, true).find_map(parse_json))
        .or_else(|| embedded_object(trimmed).and_then(parse_json))
        .or_else(|| {
            fenced_blocks(trimmed, false)
                .next()
                .map(|body| Proposal::new(body.trim_end()))
        });

    match proposal {
        Some(proposal) if is_usable_code(&proposal.content) => {
            GeneratorResponse::Proposal(proposal)
        }
        Some(_) => {
            debug!("Generator returned empty code");
            GeneratorResponse::NoResponse
        }
        None => {
            debug!(len = trimmed.len(), "No code found in generator response");
            GeneratorResponse::NoResponse
        }
    }
}

/// Whether code is more than whitespace and braces (`{}`, `{ }`, `{\n}`)
pub fn is_usable_code(code: &str) -> bool {
    code.chars()
        .any(|c| !c.is_whitespace() && c != '{' && c != '}')
}

fn parse_json(text: &str) -> Option<Proposal> {
    let body: ResponseBody = serde_json::from_str(text.trim()).ok()?;
    let diagnosis = body
        .diagnosis
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    Some(Proposal {
        content: body.code,
        diagnosis,
    })
}

fn fenced_blocks(text: &str, json_only: bool) -> impl Iterator<Item = &str> {
    FENCED_BLOCK.captures_iter(text).filter_map(move |caps| {
        let lang = caps.name("lang").map(|m| m.as_str()).unwrap_or("");
        let is_json = lang.eq_ignore_ascii_case("json");
        if is_json == json_only {
            caps.name("body").map(|m| m.as_str())
        } else {
            None
        }
    })
}

fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(response: GeneratorResponse) -> Proposal {
        match response {
            GeneratorResponse::Proposal(p) => p,
            GeneratorResponse::NoResponse => panic!("expected a proposal"),
        }
    }

    #[test]
    fn test_bare_json() {
        let p = proposal(parse_response(
            r#"{"code": "@Test\npublic void testPop() {\n    assertEquals(1, s.pop());\n}", "diagnosis": "Missing cast"}"#,
        ));
        assert!(p.content.starts_with("@Test\npublic void testPop()"));
        assert_eq!(p.diagnosis.as_deref(), Some("Missing cast"));
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let text = "Here is the fix:\n```json\n{\"code\": \"void t() { run(); }\"}\n```\nLet me know.";
        let p = proposal(parse_response(text));
        assert_eq!(p.content, "void t() { run(); }");
        assert_eq!(p.diagnosis, None);
    }

    #[test]
    fn test_embedded_object() {
        let text = "Sure. {\"code\": \"void t() { run(); }\", \"diagnosis\": \"  \"} Done.";
        let p = proposal(parse_response(text));
        assert_eq!(p.content, "void t() { run(); }");
        assert_eq!(p.diagnosis, None);
    }

    #[test]
    fn test_fenced_code_block() {
        let text = "```java\n@Test\nvoid t() { run(); }\n```";
        let p = proposal(parse_response(text));
        assert_eq!(p.content, "@Test\nvoid t() { run(); }");
    }

    #[test]
    fn test_brace_only_is_no_response() {
        for code in ["{}", "{ }", "{\\n}", "{\\r\\n}", "{\\n    }", "   "] {
            let text = format!(r#"{{"code": "{}"}}"#, code);
            assert_eq!(parse_response(&text), GeneratorResponse::NoResponse, "{}", code);
        }
    }

    #[test]
    fn test_unparseable_is_no_response() {
        assert_eq!(parse_response(""), GeneratorResponse::NoResponse);
        assert_eq!(
            parse_response("I could not fix this test."),
            GeneratorResponse::NoResponse
        );
        assert_eq!(parse_response(r#"{"answer": "x"}"#), GeneratorResponse::NoResponse);
    }

    #[test]
    fn test_usable_code() {
        assert!(is_usable_code("void t() {}"));
        assert!(!is_usable_code("{\n}"));
        assert!(!is_usable_code(""));
    }
}
