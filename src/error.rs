use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for mdxclude operations
#[derive(Error, Debug)]
pub enum TranscludeError {
    /// IO error outside of a specific reference read
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No candidate path for a reference resolved to an existing file
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// The referenced heading does not exist in the target file
    #[error("Heading \"{heading}\" not found in {path}")]
    HeadingNotFound { path: PathBuf, heading: String },

    /// IO failure reading a path that resolved successfully
    #[error("Error reading {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    /// Generic resolution failure (variable substitution and friends)
    #[error("Could not resolve reference \"{reference}\": {message}")]
    Resolve { reference: String, message: String },

    /// A reference whose target is an ancestor of the current branch
    #[error("Circular reference detected: {chain}")]
    CircularReference { chain: String },

    /// Expansion depth hit the configured ceiling
    #[error("Maximum transclusion depth ({max_depth}) exceeded at {path}")]
    MaxDepthExceeded { max_depth: usize, path: String },

    /// Absolute or UNC path rejected by the security validator
    #[error("Absolute path not allowed: {reference}")]
    AbsolutePath { reference: String },

    /// Encoded traversal sequence rejected by the security validator
    #[error("Path traversal not allowed: {reference}")]
    PathTraversal { reference: String },

    /// Embedded null byte rejected by the security validator
    #[error("Null byte in reference: {reference}")]
    NullByte { reference: String },

    /// Resolved path escapes the configured base directory
    #[error("Path is outside the base directory: {path}")]
    OutsideRoot { path: PathBuf },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TranscludeError {
    /// Closed taxonomy code for this error, used in accumulated diagnostics.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) | Self::Read { .. } | Self::Json(_) => ErrorCode::ReadError,
            Self::FileNotFound { .. } => ErrorCode::FileNotFound,
            Self::HeadingNotFound { .. } => ErrorCode::HeadingNotFound,
            Self::Resolve { .. } => ErrorCode::ResolveError,
            Self::CircularReference { .. } => ErrorCode::CircularReference,
            Self::MaxDepthExceeded { .. } => ErrorCode::MaxDepthExceeded,
            Self::AbsolutePath { .. } => ErrorCode::AbsolutePath,
            Self::PathTraversal { .. } => ErrorCode::PathTraversal,
            Self::NullByte { .. } => ErrorCode::NullByte,
            Self::OutsideRoot { .. } => ErrorCode::OutsideRoot,
        }
    }

    /// Path associated with this error, when one exists.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::FileNotFound { path }
            | Self::HeadingNotFound { path, .. }
            | Self::Read { path, .. }
            | Self::OutsideRoot { path } => Some(path),
            _ => None,
        }
    }
}

/// Closed error-code taxonomy attached to every accumulated diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FileNotFound,
    HeadingNotFound,
    ReadError,
    ResolveError,
    CircularReference,
    MaxDepthExceeded,
    AbsolutePath,
    PathTraversal,
    NullByte,
    OutsideRoot,
}

/// One accumulated diagnostic. Errors are local to the reference that caused
/// them; processing of sibling references and subsequent lines continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub code: ErrorCode,
}

impl ProcessingError {
    /// Builds a diagnostic from an error, recording the source line when known.
    pub fn from_error(error: &TranscludeError, line: Option<usize>) -> Self {
        Self {
            message: error.to_string(),
            path: error.path().map(Path::to_path_buf),
            line,
            code: error.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TranscludeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TranscludeError::FileNotFound {
            path: PathBuf::from("/docs/missing.md"),
        };
        assert_eq!(format!("{err}"), "File not found: /docs/missing.md");

        let err = TranscludeError::HeadingNotFound {
            path: PathBuf::from("/docs/api.md"),
            heading: "Usage".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Heading \"Usage\" not found in /docs/api.md"
        );

        let err = TranscludeError::CircularReference {
            chain: "a.md -> b.md -> a.md".to_string(),
        };
        assert!(format!("{err}").contains("a.md -> b.md -> a.md"));

        let err = TranscludeError::MaxDepthExceeded {
            max_depth: 10,
            path: "deep.md".to_string(),
        };
        assert!(format!("{err}").contains("10"));

        let err = TranscludeError::AbsolutePath {
            reference: "/etc/passwd".to_string(),
        };
        assert!(format!("{err}").contains("/etc/passwd"));
    }

    #[test]
    fn test_error_codes() {
        let err = TranscludeError::FileNotFound {
            path: PathBuf::from("x.md"),
        };
        assert_eq!(err.code(), ErrorCode::FileNotFound);

        let err = TranscludeError::NullByte {
            reference: "bad\0.md".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::NullByte);

        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = TranscludeError::Read {
            path: PathBuf::from("x.md"),
            source: io_err,
        };
        assert_eq!(err.code(), ErrorCode::ReadError);
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        let err: TranscludeError = io_err.into();
        assert!(matches!(err, TranscludeError::Io(_)));
    }

    #[test]
    fn test_processing_error_serializes_code() {
        let err = TranscludeError::OutsideRoot {
            path: PathBuf::from("/elsewhere/x.md"),
        };
        let diag = ProcessingError::from_error(&err, Some(3));
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("OUTSIDE_ROOT"));
        assert!(json.contains("\"line\":3"));
    }

    #[test]
    fn test_processing_error_omits_absent_fields() {
        let err = TranscludeError::Resolve {
            reference: "{{undefined}}".to_string(),
            message: "undefined variable".to_string(),
        };
        let diag = ProcessingError::from_error(&err, None);
        let json = serde_json::to_string(&diag).unwrap();
        assert!(!json.contains("\"line\""));
        assert!(!json.contains("\"path\""));
    }
}
