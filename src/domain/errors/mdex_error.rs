//! Pipeline error types.

use thiserror::Error;

/// Result alias used across the fetch, cache, and packaging pipeline.
pub type MdexResult<T> = Result<T, MdexError>;

/// Error variants surfaced by the pipeline.
///
/// Every variant is cheap to clone so the first failure of a concurrent
/// batch can be stored once and handed back to the caller.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum MdexError {
    #[error("upstream error: {status}")]
    Upstream { status: String },

    #[error("failed to decode response: {message}")]
    Decode { message: String },

    #[error("failed to store response in cache: {message}")]
    CacheWrite { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("image {index} failed: {source}")]
    PartialFetch {
        index: usize,
        #[source]
        source: Box<MdexError>,
    },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("invalid url: {message}")]
    InvalidUrl { message: String },

    #[error("archive error: {message}")]
    Archive { message: String },

    #[error("render error: {message}")]
    Render { message: String },

    #[error("io error: {message}")]
    Io { message: String },
}

impl MdexError {
    /// Creates an upstream error from an HTTP status line.
    #[must_use]
    pub fn upstream(status: impl Into<String>) -> Self {
        Self::Upstream {
            status: status.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a cache write error.
    #[must_use]
    pub fn cache_write(message: impl Into<String>) -> Self {
        Self::CacheWrite {
            message: message.into(),
        }
    }

    /// Wraps the failure of a single image in a batch.
    #[must_use]
    pub fn partial_fetch(index: usize, source: Self) -> Self {
        Self::PartialFetch {
            index,
            source: Box::new(source),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid url error.
    #[must_use]
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }

    /// Creates an archive error.
    #[must_use]
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Creates a render error.
    #[must_use]
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Returns whether the error is a cancellation, directly or inside a batch failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::PartialFetch { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Returns whether the error came from a non-200 upstream response.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        match self {
            Self::Upstream { .. } => true,
            Self::PartialFetch { source, .. } => source.is_upstream(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for MdexError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for MdexError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::archive(err.to_string())
    }
}

impl From<tera::Error> for MdexError {
    fn from(err: tera::Error) -> Self {
        let mut message = err.to_string();
        let mut cause = std::error::Error::source(&err);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }
        Self::render(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_fetch_display() {
        let err = MdexError::partial_fetch(2, MdexError::upstream("404 Not Found"));
        assert_eq!(err.to_string(), "image 2 failed: upstream error: 404 Not Found");
        assert!(err.is_upstream());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_classification() {
        assert!(MdexError::Cancelled.is_cancelled());
        assert!(MdexError::partial_fetch(0, MdexError::Cancelled).is_cancelled());
        assert!(!MdexError::decode("eof").is_cancelled());
    }

    #[test]
    fn test_template_error_keeps_cause() {
        let err = tera::Tera::one_off("{{ missing }}", &tera::Context::new(), false).unwrap_err();

        let err = MdexError::from(err);

        assert!(matches!(&err, MdexError::Render { message } if message.contains("missing")));
    }
}
