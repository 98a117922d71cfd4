//! Error types for the AttrSync core crate.

use thiserror::Error;

/// Top-level error type for all AttrSync operations.
#[derive(Debug, Error)]
pub enum AttrSyncError {
    /// Configuration is structurally or semantically invalid. Carries every
    /// violation found, not just the first.
    #[error("configuration error: {}", .0.join("; "))]
    Config(Vec<String>),

    #[error("directory error: {0}")]
    Directory(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification error: {0}")]
    Notify(String),

    #[error("audit error: {0}")]
    Audit(String),
}

impl AttrSyncError {
    /// Build a single-violation configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(vec![msg.into()])
    }
}

/// A convenience Result alias that defaults to [`AttrSyncError`].
pub type Result<T> = std::result::Result<T, AttrSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_joins_all_violations() {
        let err = AttrSyncError::Config(vec![
            "managed_groups must not be empty".into(),
            "rules must not be empty".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "configuration error: managed_groups must not be empty; rules must not be empty"
        );
    }

    #[test]
    fn config_helper_wraps_single_violation() {
        let err = AttrSyncError::config("bad value");
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = AttrSyncError::from(io_err);
        assert!(matches!(err, AttrSyncError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn directory_error_display() {
        let err = AttrSyncError::Directory("list groups failed (500)".into());
        assert_eq!(err.to_string(), "directory error: list groups failed (500)");
    }

    #[test]
    fn result_alias_works() {
        let ok: Result<i32> = Ok(42);
        assert!(ok.is_ok());

        let err: Result<i32> = Err(AttrSyncError::Cache("unwritable".into()));
        assert!(err.is_err());
    }
}
