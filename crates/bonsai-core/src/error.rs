//! Error taxonomy for Bonsai Sensei.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BonsaiError>;

#[derive(Debug, Error)]
pub enum BonsaiError {
    /// The embedding or chat-completion service failed or answered with garbage.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Knowledge, index or metadata files are missing, malformed or inconsistent.
    #[error("Data error: {0}")]
    Data(String),

    /// Missing credential or unreadable configuration. Fatal at startup.
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BonsaiError {
    /// Stable machine-readable code used in the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            BonsaiError::Upstream(_) => "upstream_error",
            BonsaiError::Data(_) | BonsaiError::Json(_) => "data_error",
            BonsaiError::Config(_) => "config_error",
            BonsaiError::InvalidRequest(_) => "invalid_request",
            BonsaiError::Io(_) => "internal_error",
        }
    }

    /// Build a `Data` error describing a vector dimension mismatch.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        BonsaiError::Data(format!(
            "embedding dimension mismatch: index has {expected}, query has {got}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(BonsaiError::Upstream("x".into()).code(), "upstream_error");
        assert_eq!(BonsaiError::Data("x".into()).code(), "data_error");
        assert_eq!(BonsaiError::Config("x".into()).code(), "config_error");
        assert_eq!(BonsaiError::InvalidRequest("x".into()).code(), "invalid_request");
    }

    #[test]
    fn test_json_error_is_data_error() {
        let err: BonsaiError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert_eq!(err.code(), "data_error");
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = BonsaiError::dimension_mismatch(1536, 3);
        assert!(err.to_string().contains("1536"));
        assert!(err.to_string().contains("3"));
    }
}
