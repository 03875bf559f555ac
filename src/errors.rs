use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, Deserialize, Serialize)]
pub enum SkillError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("No skill server registered as: {0}")]
    UnknownServer(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

pub type SkillResult<T> = Result<T, SkillError>;
