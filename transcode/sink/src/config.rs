/*!
    Sink configuration types.
*/

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use transcode_types::CodecId;

/**
    Container format for output.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// MP4 container (most compatible).
    Mp4,
    /// WebM container (VP8/VP9/AV1).
    WebM,
    /// Matroska container (most flexible).
    Mkv,
    /// MPEG transport stream.
    MpegTs,
}

impl ContainerFormat {
    /**
        Default container for a codec: WebM for the VPx family, MP4 otherwise.
    */
    pub fn for_codec(codec: Option<CodecId>) -> Self {
        match codec {
            Some(codec) if codec.is_vpx() => Self::WebM,
            _ => Self::Mp4,
        }
    }

    /**
        Returns true if the container can carry the given codec.

        Unknown codecs are only accepted by Matroska.
    */
    pub fn supports(self, codec: Option<CodecId>) -> bool {
        let Some(codec) = codec else {
            return matches!(self, Self::Mkv);
        };
        match self {
            Self::Mp4 => !matches!(codec, CodecId::Vp8 | CodecId::Mpeg2Video),
            Self::WebM => matches!(codec, CodecId::Vp8 | CodecId::Vp9 | CodecId::Av1),
            Self::Mkv => true,
            Self::MpegTs => matches!(
                codec,
                CodecId::H264 | CodecId::H265 | CodecId::Mpeg2Video | CodecId::Mpeg4
            ),
        }
    }

    /**
        Get the typical file extension for this container.
    */
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::WebM => "webm",
            Self::Mkv => "mkv",
            Self::MpegTs => "ts",
        }
    }
}

/**
    Configuration for a media sink.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Output file path. The extension is fixed up to match the container.
    pub path: PathBuf,
    /// Container format to use (None = chosen from the encoder's codec).
    #[serde(default)]
    pub format: Option<ContainerFormat>,
}

impl SinkConfig {
    /**
        Create a new sink configuration.
    */
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
        }
    }

    /**
        Create configuration for MP4 output.
    */
    pub fn mp4(path: impl Into<PathBuf>) -> Self {
        Self::new(path).with_format(ContainerFormat::Mp4)
    }

    /**
        Create configuration for WebM output.
    */
    pub fn webm(path: impl Into<PathBuf>) -> Self {
        Self::new(path).with_format(ContainerFormat::WebM)
    }

    /**
        Set the container format.
    */
    pub fn with_format(mut self, format: ContainerFormat) -> Self {
        self.format = Some(format);
        self
    }

    /**
        Container used for the given codec.
    */
    pub fn container_for(&self, codec: Option<CodecId>) -> ContainerFormat {
        self.format
            .unwrap_or_else(|| ContainerFormat::for_codec(codec))
    }

    /**
        Output path with the container's extension.
    */
    pub fn resolved_path(&self, container: ContainerFormat) -> PathBuf {
        with_extension(&self.path, container.extension())
    }
}

fn with_extension(path: &Path, extension: &str) -> PathBuf {
    match path.extension() {
        Some(current) if current.eq_ignore_ascii_case(extension) => path.to_path_buf(),
        _ => path.with_extension(extension),
    }
}
