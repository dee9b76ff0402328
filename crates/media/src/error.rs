//! Media conversion errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    /// The backend does not offer this conversion at all
    #[error("{processor} does not support {operation}")]
    NotSupported {
        processor: String,
        operation: &'static str,
    },

    #[error("no processors available")]
    NoProcessors,

    #[error("{processor} failed: {message}")]
    Backend { processor: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every processor in a fallback chain failed; only the last failure is kept
    #[error("all {attempts} media processors failed, last error: {last}")]
    AllProcessorsFailed {
        attempts: usize,
        #[source]
        last: Box<MediaError>,
    },
}

impl MediaError {
    pub fn backend(processor: &str, message: impl ToString) -> Self {
        Self::Backend {
            processor: processor.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_supported(processor: &str, operation: &'static str) -> Self {
        Self::NotSupported {
            processor: processor.to_string(),
            operation,
        }
    }

    pub fn is_not_supported(&self) -> bool {
        match self {
            Self::NotSupported { .. } => true,
            Self::AllProcessorsFailed { last, .. } => last.is_not_supported(),
            _ => false,
        }
    }
}

impl From<MediaError> for knowledge_core::Error {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::NoProcessors => knowledge_core::Error::Config(err.to_string()),
            e if e.is_not_supported() => knowledge_core::Error::NotSupported(e.to_string()),
            e => knowledge_core::Error::external("media", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_failure_keeps_last_cause() {
        let err = MediaError::AllProcessorsFailed {
            attempts: 2,
            last: Box::new(MediaError::backend("local", "tesseract exited with 1")),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("local failed: tesseract exited with 1"));
        assert!(matches!(
            knowledge_core::Error::from(err),
            knowledge_core::Error::External { .. }
        ));
    }

    #[test]
    fn test_core_mapping() {
        assert!(matches!(
            knowledge_core::Error::from(MediaError::NoProcessors),
            knowledge_core::Error::Config(_)
        ));
        assert!(matches!(
            knowledge_core::Error::from(MediaError::not_supported("vision", "video_to_text")),
            knowledge_core::Error::NotSupported(_)
        ));
    }
}
