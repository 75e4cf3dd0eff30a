//! Structured errors for the offvault server.
//!
//! Failures that originate in the worker use `offvault_core::Error`; these
//! cover what only the tool layer can get wrong.

use offvault_core::ConfigError;
use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Structured errors for the offvault server.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., no purge criteria).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Configuration could not be reloaded.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),

    /// Tool output could not be encoded.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::Config(e) => (-32010, e.to_string()),
            ToolError::Serialize(e) => (-32603, e.to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_codes() {
        let err: McpError = ToolError::InvalidInput("no criteria".into()).into();
        assert_eq!(err.code.0, -32602);

        let config = ConfigError::Missing { field: "manifest".into(), hint: "list urls".into() };
        let err: McpError = ToolError::from(config).into();
        assert_eq!(err.code.0, -32010);
        assert!(err.message.contains("manifest"));
    }
}
