//! Decoder errors. Every variant is fatal to the connection it came from.

use thiserror::Error;

/// Framing failures.
#[derive(Debug, Error)]
pub enum WireError {
    /// A `MSG`/`HMSG` control line with too few fields.
    #[error("malformed {verb} header: {line}")]
    MalformedHeader {
        /// `MSG` or `HMSG`.
        verb: &'static str,
        /// The offending control line.
        line: String,
    },

    /// A length field that is not a non-negative integer.
    #[error("invalid {field} in {verb} header: {line}")]
    InvalidLength {
        /// `MSG` or `HMSG`.
        verb: &'static str,
        /// Which length field failed.
        field: &'static str,
        /// The offending control line.
        line: String,
    },

    /// An `HMSG` whose header section is longer than the whole payload.
    #[error("HMSG header length {header_len} exceeds total length {total_len}")]
    HeaderExceedsTotal {
        /// Declared header bytes.
        header_len: usize,
        /// Declared total bytes.
        total_len: usize,
    },

    /// A declared payload larger than the configured ceiling.
    #[error("payload of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge {
        /// Declared payload bytes.
        len: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// Required by [`tokio_util::codec::Decoder`]; raised only when the codec
    /// drives an I/O source directly.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias.
pub type Result<T, E = WireError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_line() {
        let err = WireError::InvalidLength {
            verb: "MSG",
            field: "length",
            line: "MSG a 1 x".into(),
        };
        assert_eq!(err.to_string(), "invalid length in MSG header: MSG a 1 x");

        let err = WireError::HeaderExceedsTotal {
            header_len: 9,
            total_len: 4,
        };
        assert!(err.to_string().contains("9"));
    }
}
