use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailure(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::ToolNotFound(_) => ErrorKind::ToolNotFound,
            EvalError::InvalidPath(_) => ErrorKind::InvalidPath,
            EvalError::ToolExecutionFailure(_) => ErrorKind::ToolExecutionFailure,
            EvalError::TransportFailure(_) => ErrorKind::TransportFailure,
            EvalError::ScenarioNotFound(_) => ErrorKind::ScenarioNotFound,
            EvalError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<std::io::Error> for EvalError {
    fn from(err: std::io::Error) -> Self {
        EvalError::ToolExecutionFailure(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::ToolExecutionFailure(err.to_string())
    }
}

/// Serializable discriminant of [`EvalError`], carried inside failed tool results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ToolNotFound,
    InvalidPath,
    ToolExecutionFailure,
    TransportFailure,
    ScenarioNotFound,
    Config,
}

/// Error record attached to a failed [`crate::mcp::ToolInvocationResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&EvalError> for ToolError {
    fn from(err: &EvalError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

pub type EvalResult<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_from_eval_error() {
        let err = EvalError::InvalidPath("../../etc/passwd".into());
        let tool_err = ToolError::from(&err);

        assert_eq!(tool_err.kind, ErrorKind::InvalidPath);
        assert!(tool_err.message.contains("../../etc/passwd"));
    }

    #[test]
    fn test_io_error_maps_to_execution_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EvalError = io.into();
        assert_eq!(err.kind(), ErrorKind::ToolExecutionFailure);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ToolNotFound).unwrap();
        assert_eq!(json, "\"tool_not_found\"");
    }
}
