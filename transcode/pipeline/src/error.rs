/*!
    Error type returned by the pipeline driver.
*/

use std::path::PathBuf;

use thiserror::Error;

use transcode_sink::ContainerFormat;
use transcode_types::Error;

/**
    Why a transcode run failed.

    The `Display` output is the human-readable failure string reported to
    callers.
*/
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Configuration rejected before any collaborator was touched
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The source has no track with a video mime type
    #[error("no video track in source")]
    MissingVideoTrack,
    /// The source could not describe its tracks
    #[error("no input format: {0}")]
    MissingInputFormat(#[source] Error),
    #[error("failed to create decoder {name}: {source}")]
    CreateDecoder {
        name: String,
        #[source]
        source: Error,
    },
    #[error("failed to create encoder {name}: {source}")]
    CreateEncoder {
        name: String,
        #[source]
        source: Error,
    },
    /// A codec rejected its configuration
    #[error("failed to configure {codec}: {source}")]
    Configure {
        codec: String,
        #[source]
        source: Error,
    },
    #[error("start encoding failed: {0}")]
    StartEncoder(#[source] Error),
    #[error("failed to open output {}: {source}", path.display())]
    OpenSink {
        path: PathBuf,
        #[source]
        source: Error,
    },
    #[error("{container:?} container cannot carry {mime}")]
    UnsupportedContainer {
        container: ContainerFormat,
        mime: String,
    },
    /// A stage failed after the pipeline started running
    #[error("transcode aborted: {0}")]
    Runtime(#[source] Error),
    /// The transcoder's source was already consumed by an earlier run
    #[error("transcoder has already run")]
    AlreadyRun,
}

impl TranscodeError {
    /**
        Returns true for failures that happened before the pipeline started
        running, in which case no output was produced.
    */
    pub fn is_setup_failure(&self) -> bool {
        !matches!(self, Self::Runtime(_) | Self::AlreadyRun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_failure_string() {
        let error = TranscodeError::CreateEncoder {
            name: "c2.android.avc.encoder".into(),
            source: Error::unsupported_format("no such codec"),
        };
        assert_eq!(
            error.to_string(),
            "failed to create encoder c2.android.avc.encoder: unsupported format: no such codec"
        );
        assert_eq!(
            TranscodeError::UnsupportedContainer {
                container: ContainerFormat::WebM,
                mime: "video/avc".into(),
            }
            .to_string(),
            "WebM container cannot carry video/avc"
        );
    }

    #[test]
    fn setup_failures() {
        assert!(TranscodeError::MissingVideoTrack.is_setup_failure());
        assert!(TranscodeError::StartEncoder(Error::codec("boom")).is_setup_failure());
        assert!(!TranscodeError::Runtime(Error::codec("boom")).is_setup_failure());
        assert!(!TranscodeError::AlreadyRun.is_setup_failure());
    }
}
