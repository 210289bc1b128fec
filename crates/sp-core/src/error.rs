//! Unified error type for segpump.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for the pump to report a failed task through its event channel
//! via [`Error::code`].

use crate::index::SegmentIndex;

/// Unified error type covering all failure modes in segpump.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A segment index resolved outside `[-1, len)` of the catalog.
    #[error("Segment index {index} out of range for catalog of {len} segments")]
    OutOfRange {
        /// The index that was resolved.
        index: SegmentIndex,
        /// Number of descriptors in the catalog.
        len: usize,
    },

    /// A range or manifest request failed at the transport level.
    #[error("Transport error: {message}")]
    Transport {
        /// Human-readable error description.
        message: String,
    },

    /// A fetch did not complete within the configured timeout.
    #[error("Fetch of segment {index} timed out after {after_ms}ms")]
    Timeout {
        /// The segment being fetched.
        index: SegmentIndex,
        /// The timeout that elapsed, in milliseconds.
        after_ms: u64,
    },

    /// The append sink rejected a buffer.
    #[error("Append of segment {index} rejected: {message}")]
    Append {
        /// The segment whose buffer was rejected.
        index: SegmentIndex,
        /// Reason reported by the sink.
        message: String,
    },

    /// The manifest document could not be parsed.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation is not valid in the pump's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Stable machine-readable code for this error, used in pump events.
    pub fn code(&self) -> &'static str {
        match self {
            Error::OutOfRange { .. } => "out_of_range",
            Error::Transport { .. } => "transport",
            Error::Timeout { .. } => "timeout",
            Error::Append { .. } => "append",
            Error::Manifest(_) => "manifest",
            Error::Validation(_) => "validation",
            Error::InvalidState(_) => "invalid_state",
            Error::Io { .. } => "io",
        }
    }

    /// Convenience constructor for [`Error::Transport`].
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Append`].
    pub fn append(index: SegmentIndex, message: impl Into<String>) -> Self {
        Error::Append {
            index,
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_display() {
        let err = Error::OutOfRange {
            index: SegmentIndex::new(7),
            len: 3,
        };
        assert_eq!(
            err.to_string(),
            "Segment index 7 out of range for catalog of 3 segments"
        );
        assert_eq!(err.code(), "out_of_range");
    }

    #[test]
    fn init_index_display() {
        let err = Error::OutOfRange {
            index: SegmentIndex::INIT,
            len: 0,
        };
        assert_eq!(
            err.to_string(),
            "Segment index init out of range for catalog of 0 segments"
        );
    }

    #[test]
    fn transport_display() {
        let err = Error::transport("connection refused");
        assert_eq!(err.to_string(), "Transport error: connection refused");
        assert_eq!(err.code(), "transport");
    }

    #[test]
    fn timeout_display() {
        let err = Error::Timeout {
            index: SegmentIndex::new(2),
            after_ms: 500,
        };
        assert_eq!(err.to_string(), "Fetch of segment 2 timed out after 500ms");
        assert_eq!(err.code(), "timeout");
    }

    #[test]
    fn append_display() {
        let err = Error::append(SegmentIndex::new(4), "buffer full");
        assert_eq!(err.to_string(), "Append of segment 4 rejected: buffer full");
        assert_eq!(err.code(), "append");
    }

    #[test]
    fn manifest_display() {
        let err = Error::Manifest("expected value at line 1".into());
        assert_eq!(err.to_string(), "Manifest error: expected value at line 1");
        assert_eq!(err.code(), "manifest");
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.code(), "io");
    }

    #[test]
    fn invalid_state_display() {
        let err = Error::InvalidState("already initialized".into());
        assert_eq!(err.to_string(), "Invalid state: already initialized");
        assert_eq!(err.code(), "invalid_state");
    }
}
