//! Error types for vidquiz.

use std::path::PathBuf;
use thiserror::Error;

/// Library-level error type for vidquiz operations.
#[derive(Error, Debug)]
pub enum VidquizError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Video file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported video format '{extension}'. Supported formats: {supported}")]
    UnsupportedFormat { extension: String, supported: String },

    #[error("File size ({size_mb:.1} MB) exceeds maximum allowed size ({max_mb} MB)")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("Video file is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("{service} request failed: {message}")]
    Upstream {
        service: String,
        message: String,
        transient: bool,
    },

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error(
        "Cannot connect to the knowledge store at {host}:{port}: {message}. \
         Check that the database service is running and reachable."
    )]
    StoreConnection {
        host: String,
        port: u16,
        message: String,
    },

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Could not parse quiz response: {0}")]
    Parse(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

/// Broad failure categories reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad path, format, size or prompt. Fixable by the user.
    Input,
    /// Missing or invalid credential.
    Auth,
    /// An external service failed or timed out.
    Upstream,
    /// The knowledge store could not be reached or written.
    Store,
    /// The quiz response did not match the expected format.
    Parse,
    Config,
    Timeout,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Input => "InputError",
            ErrorKind::Auth => "AuthError",
            ErrorKind::Upstream => "UpstreamError",
            ErrorKind::Store => "StoreError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Io => "IoError",
        };
        write!(f, "{}", name)
    }
}

impl VidquizError {
    /// Upstream failure that is worth retrying.
    pub fn transient(service: &str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.to_string(),
            message: message.into(),
            transient: true,
        }
    }

    /// Upstream failure that will not go away on retry.
    pub fn upstream(service: &str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.to_string(),
            message: message.into(),
            transient: false,
        }
    }

    /// Classify the error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VidquizError::FileNotFound(_)
            | VidquizError::UnsupportedFormat { .. }
            | VidquizError::FileTooLarge { .. }
            | VidquizError::EmptyFile(_)
            | VidquizError::EmptyPrompt
            | VidquizError::InvalidInput(_) => ErrorKind::Input,
            VidquizError::Auth(_) => ErrorKind::Auth,
            VidquizError::Upstream { .. }
            | VidquizError::Embedding(_)
            | VidquizError::Http(_) => ErrorKind::Upstream,
            VidquizError::StoreConnection { .. }
            | VidquizError::VectorStore(_)
            | VidquizError::Duplicate(_)
            | VidquizError::Database(_)
            | VidquizError::Mongo(_) => ErrorKind::Store,
            VidquizError::Parse(_) => ErrorKind::Parse,
            VidquizError::Config(_) | VidquizError::TomlParse(_) => ErrorKind::Config,
            VidquizError::Timeout(_) => ErrorKind::Timeout,
            VidquizError::Io(_) | VidquizError::Json(_) => ErrorKind::Io,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            VidquizError::Upstream { transient, .. } => *transient,
            VidquizError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type alias for vidquiz operations.
pub type Result<T> = std::result::Result<T, VidquizError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(VidquizError::EmptyPrompt.kind(), ErrorKind::Input);
        assert_eq!(
            VidquizError::FileNotFound(PathBuf::from("missing.mp4")).kind(),
            ErrorKind::Input
        );
        assert_eq!(VidquizError::Auth("no key".into()).kind(), ErrorKind::Auth);
        assert_eq!(VidquizError::Parse("bad".into()).kind(), ErrorKind::Parse);
        assert_eq!(
            VidquizError::StoreConnection {
                host: "localhost".into(),
                port: 27017,
                message: "refused".into(),
            }
            .kind(),
            ErrorKind::Store
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(VidquizError::transient("Gemini", "503").is_transient());
        assert!(!VidquizError::upstream("Gemini", "400").is_transient());
        assert!(!VidquizError::Parse("bad".into()).is_transient());
    }

    #[test]
    fn test_store_connection_message_has_diagnostics() {
        let err = VidquizError::StoreConnection {
            host: "localhost".into(),
            port: 51083,
            message: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("localhost:51083"));
        assert!(msg.contains("running"));
    }
}
