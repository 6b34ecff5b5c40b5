use crate::types::RunId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unsupported framework: {0}")]
    UnsupportedFramework(String),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Validation failed: {0}")]
    Validation(String),
}
