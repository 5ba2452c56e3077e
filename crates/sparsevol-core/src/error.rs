//! Error types for sparsevol.

use std::sync::Arc;

use thiserror::Error;

/// The main error type for sparsevol operations.
#[derive(Error, Debug)]
pub enum VolumeError {
    /// The pool has not been initialized.
    #[error("sparsevol not initialized - call sparsevol::init() first")]
    NotInitialized,

    /// The pool has already been initialized.
    #[error("sparsevol already initialized")]
    AlreadyInitialized,

    /// The backing file is missing, unreadable or corrupt.
    #[error("can't open the file [{source_id}]: {cause}")]
    SourceOpen {
        source_id: String,
        #[source]
        cause: Box<VolumeError>,
    },

    /// The file opened but does not contain the requested field.
    #[error("opened the file [{source_id}] but can't get the field [{field}]")]
    FieldNotFound { source_id: String, field: String },

    /// A field advertised by the file failed to materialize.
    #[error("can't read the field [{field}] from [{source_id}]: {cause}")]
    FieldRead {
        source_id: String,
        field: String,
        #[source]
        cause: Box<VolumeError>,
    },

    /// Malformed grid data.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A load failure reported to every caller that waited on the same load.
    #[error(transparent)]
    Shared(Arc<VolumeError>),
}

impl VolumeError {
    /// Wraps a reader failure as a [`VolumeError::SourceOpen`] for `source_id`.
    pub fn source_open(source_id: impl Into<String>, cause: VolumeError) -> Self {
        Self::SourceOpen {
            source_id: source_id.into(),
            cause: Box::new(cause),
        }
    }

    /// Returns true for errors raised because the backing file could not be opened.
    pub fn is_source_open(&self) -> bool {
        match self {
            Self::Shared(inner) => inner.is_source_open(),
            other => matches!(other, Self::SourceOpen { .. }),
        }
    }

    /// Returns true for errors raised because the requested field is absent.
    pub fn is_field_not_found(&self) -> bool {
        match self {
            Self::Shared(inner) => inner.is_field_not_found(),
            other => matches!(other, Self::FieldNotFound { .. }),
        }
    }
}

/// A specialized Result type for sparsevol operations.
pub type Result<T> = std::result::Result<T, VolumeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_source_and_field() {
        let err = VolumeError::FieldNotFound {
            source_id: "smoke.svol.json".into(),
            field: "heat".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("smoke.svol.json"));
        assert!(msg.contains("heat"));
        assert!(err.is_field_not_found());
        assert!(!err.is_source_open());
    }

    #[test]
    fn test_source_open_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = VolumeError::source_open("missing.svol.json", io.into());
        assert!(err.is_source_open());
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("missing.svol.json"));
    }

    #[test]
    fn test_shared_error_keeps_kind_and_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let inner = Arc::new(VolumeError::source_open("gone.svol.json", io.into()));
        let err = VolumeError::Shared(Arc::clone(&inner));
        assert!(err.is_source_open());
        assert!(!err.is_field_not_found());
        assert_eq!(err.to_string(), inner.to_string());
        assert!(std::error::Error::source(&err).is_some());
    }
}
