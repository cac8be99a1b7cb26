/*!
    Error types for the transcode pipeline.
*/

use thiserror::Error;

/**
    Error type shared by the pipeline stages and their collaborators.
*/
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file not found, device gone, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Codec error raised by a buffer queue operation
    #[error("codec error: {message}")]
    Codec { message: String },
    /// Codec, demuxer or muxer rejected its configuration
    #[error("configuration failed: {message}")]
    Configuration { message: String },
    /// Operation issued in a state that does not allow it
    #[error("illegal state: {message}")]
    IllegalState { message: String },
    /// Invalid data (malformed sample, oversized payload)
    #[error("invalid data: {message}")]
    InvalidData { message: String },
    /// Unsupported format (valid but not handled)
    #[error("unsupported format: {message}")]
    UnsupportedFormat { message: String },
    /// End of stream (not really an error, but part of control flow)
    #[error("end of stream")]
    Eof,
}

impl Error {
    /**
        Create a codec error with the given message.
    */
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /**
        Create a configuration error with the given message.
    */
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /**
        Create an illegal state error with the given message.
    */
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /**
        Create an invalid data error with the given message.
    */
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /**
        Create an unsupported format error with the given message.
    */
    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: message.into(),
        }
    }

    /**
        Returns true if this is an EOF error.
    */
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /**
        Returns true if this error was raised for an operation issued in the wrong state.

        Teardown logs and skips these.
    */
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. })
    }
}

/**
    Result type alias for the transcode pipeline.
*/
pub type Result<T> = std::result::Result<T, Error>;
