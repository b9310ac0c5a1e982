//! Error types for warc-framer

use std::io;
use thiserror::Error;

/// Result type for warc-framer operations
pub type Result<T> = std::result::Result<T, WarcError>;

/// Errors that can occur while reading or writing WARC files
#[derive(Debug, Error)]
pub enum WarcError {
    /// I/O error on the source or sink
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record framing is broken (malformed header, missing separator, truncated record)
    #[error("Framing error at offset {offset}: {reason}")]
    Framing {
        /// Offset into the decompressed stream where the problem was detected
        offset: u64,
        /// What went wrong
        reason: String,
    },

    /// Compressed input could not be decoded
    #[error("Invalid gzip data near compressed offset {offset}: {source}")]
    Decode {
        /// Approximate offset into the compressed stream
        offset: u64,
        /// Underlying decompression error
        #[source]
        source: io::Error,
    },

    /// API used out of order (no source path, session already open, ...)
    #[error("Usage error: {0}")]
    Usage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WarcError {
    pub(crate) fn framing(offset: u64, reason: impl Into<String>) -> Self {
        Self::Framing {
            offset,
            reason: reason.into(),
        }
    }

    /// Map an error returned by a source `Read` into the crate taxonomy.
    ///
    /// Decompression failures travel through `io::Read` wrapped in a
    /// [`GunzipFailure`]; they are unwrapped back into [`WarcError::Decode`].
    pub(crate) fn from_source(err: io::Error) -> Self {
        let is_gunzip = err
            .get_ref()
            .is_some_and(|inner| inner.is::<GunzipFailure>());
        if !is_gunzip {
            return Self::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<GunzipFailure>()) {
            Some(Ok(failure)) => {
                let GunzipFailure { offset, source } = *failure;
                Self::Decode { offset, source }
            }
            _ => Self::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "gzip decode failure",
            )),
        }
    }

    /// Whether this is a framing error
    #[must_use]
    pub fn is_framing(&self) -> bool {
        matches!(self, Self::Framing { .. })
    }
}

/// Decompression failure carried inside an `io::Error` by the gunzip reader
#[derive(Debug, Error)]
#[error("gzip member failed at compressed offset {offset}: {source}")]
pub(crate) struct GunzipFailure {
    pub(crate) offset: u64,
    #[source]
    pub(crate) source: io::Error,
}

impl From<GunzipFailure> for io::Error {
    fn from(failure: GunzipFailure) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_io_error_stays_io() {
        let err = WarcError::from_source(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, WarcError::Io(_)));
    }

    #[test]
    fn test_gunzip_failure_becomes_decode() {
        let failure = GunzipFailure {
            offset: 42,
            source: io::Error::new(io::ErrorKind::InvalidInput, "corrupt deflate stream"),
        };
        let err = WarcError::from_source(failure.into());
        match err {
            WarcError::Decode { offset, .. } => assert_eq!(offset, 42),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_framing_display() {
        let err = WarcError::framing(7, "truncated record");
        assert!(err.is_framing());
        assert_eq!(err.to_string(), "Framing error at offset 7: truncated record");
    }
}
