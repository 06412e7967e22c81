use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected {action} (HTTP {status}): {detail}")]
    Rejected {
        action: &'static str,
        status: u16,
        detail: String,
    },

    #[error("config file not found: {path}")]
    MissingConfig { path: PathBuf },

    #[error("invalid configuration: {}", problems.join("; "))]
    InvalidConfig { problems: Vec<String> },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("{message}")]
    Exit { code: i32, message: String },
}

impl ClientError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code, .. } => *code,
            Self::InvalidConfig { .. } | Self::InvalidArgument { .. } | Self::MissingConfig { .. } => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn exit(code: i32, message: impl Into<String>) -> Self {
        Self::Exit {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether the server answered with an HTTP error status.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::ClientError;

    #[test]
    fn exit_constructor_preserves_code_and_message() {
        let error = ClientError::exit(42, "boom");
        assert_eq!(error.exit_code(), 42);
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn config_problems_are_joined() {
        let error = ClientError::InvalidConfig {
            problems: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(error.to_string(), "invalid configuration: a; b");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn rejection_reports_action_and_status() {
        let error = ClientError::Rejected {
            action: "stop",
            status: 400,
            detail: "Simulation is not running.".to_string(),
        };
        assert!(error.is_rejection());
        assert_eq!(error.exit_code(), 1);
        assert_eq!(
            error.to_string(),
            "server rejected stop (HTTP 400): Simulation is not running."
        );
    }
}
