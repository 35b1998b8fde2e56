use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LoopError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
