//! Logging error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from opening a log sink.
#[derive(Debug, Error)]
pub enum LogError {
    /// The log file could not be opened for appending.
    #[error("failed to open log file {path}: {source}")]
    Open {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_error_display() {
        let err = LogError::Open {
            path: PathBuf::from("/nope/pump.log"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let text = err.to_string();
        assert!(text.contains("/nope/pump.log"));
        assert!(text.contains("not found"));
    }
}
