/*!
    Codec identification and the buffer-queue codec collaborator.
*/

use std::collections::BTreeMap;
use std::time::Duration;

use crate::{BufferInfo, InputSurface, MediaFormat, ParamValue, Result, Surface};

/**
    Codec identifiers.

    This is the subset of video codecs the pipeline knows how to place in a
    container. Anything else is still accepted by mime type, it just has no
    identifier.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// VP8
    Vp8,
    /// VP9
    Vp9,
    /// AV1
    Av1,
    /// MPEG-4 Part 2
    Mpeg4,
    /// MPEG-2 Video
    Mpeg2Video,
}

impl CodecId {
    /**
        Look up a codec by mime type, case-insensitively.
    */
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        Some(match mime.as_str() {
            "video/avc" | "video/h264" => Self::H264,
            "video/hevc" | "video/h265" => Self::H265,
            "video/x-vnd.on2.vp8" | "video/vp8" => Self::Vp8,
            "video/x-vnd.on2.vp9" | "video/vp9" => Self::Vp9,
            "video/av01" | "video/av1" => Self::Av1,
            "video/mp4v-es" => Self::Mpeg4,
            "video/mpeg2" => Self::Mpeg2Video,
            _ => return None,
        })
    }

    /**
        Canonical mime type of this codec.
    */
    pub const fn mime(self) -> &'static str {
        match self {
            Self::H264 => "video/avc",
            Self::H265 => "video/hevc",
            Self::Vp8 => "video/x-vnd.on2.vp8",
            Self::Vp9 => "video/x-vnd.on2.vp9",
            Self::Av1 => "video/av01",
            Self::Mpeg4 => "video/mp4v-es",
            Self::Mpeg2Video => "video/mpeg2",
        }
    }

    /**
        Returns true for the VP8/VP9 family.
    */
    pub const fn is_vpx(self) -> bool {
        matches!(self, Self::Vp8 | Self::Vp9)
    }
}

/**
    Metadata describing a codec instance.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodecInfo {
    /// Implementation name, e.g. `c2.android.avc.encoder`.
    pub name: String,
    /// Codec handled by the instance, if known.
    pub codec: Option<CodecId>,
    /// Hardware vendor, if the instance is vendor provided.
    pub vendor: Option<String>,
    pub hardware: bool,
}

impl CodecInfo {
    pub fn new(name: impl Into<String>, codec: Option<CodecId>) -> Self {
        Self {
            name: name.into(),
            codec,
            vendor: None,
            hardware: false,
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self.hardware = true;
        self
    }
}

/**
    How a codec is configured.
*/
#[derive(Clone, Debug)]
pub enum CodecMode {
    /**
        Decode compressed input buffers.

        When a surface is given, output buffers released with render requested
        post their image to it. Without one, rendering is a no-op.
    */
    Decode { surface: Option<Surface> },
    /// Encode frames submitted through the codec's input surface.
    Encode,
}

impl CodecMode {
    pub fn is_encode(&self) -> bool {
        matches!(self, Self::Encode)
    }
}

/**
    Result of polling a codec's output queue.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dequeued {
    /// Nothing available within the wait budget. Not an error.
    TryAgainLater,
    /// The output format changed; query it with [`Codec::output_format`].
    FormatChanged,
    /// A filled output buffer, owned by the caller until released.
    Buffer { index: usize, info: BufferInfo },
}

/**
    A set of tuning changes pushed into a running codec.
*/
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodecParameters {
    /// New target bitrate in bits per second.
    pub video_bitrate: Option<u32>,
    /// Ask the encoder to emit a sync frame as soon as possible.
    pub request_sync_frame: bool,
    pub extra: BTreeMap<String, ParamValue>,
}

impl CodecParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video_bitrate(mut self, bitrate: u32) -> Self {
        self.video_bitrate = Some(bitrate);
        self
    }

    pub fn with_sync_frame_request(mut self) -> Self {
        self.request_sync_frame = true;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.video_bitrate.is_none() && !self.request_sync_frame && self.extra.is_empty()
    }
}

/**
    Mid-stream control of a running codec.

    Split from [`Codec`] so stages can hand out a narrow handle to the codec
    they own without exposing its buffer queues.
*/
pub trait CodecControl {
    fn set_parameters(&mut self, params: &CodecParameters) -> Result<()>;
}

/**
    A buffer-queue codec (decoder or encoder).

    Input and output buffers are identified by index. A dequeued buffer is
    owned by the caller until it is queued (input) or released (output).
    All dequeue operations take a bounded wait and never block past it.
*/
pub trait Codec: CodecControl + Send {
    fn info(&self) -> &CodecInfo;

    fn configure(&mut self, format: &MediaFormat, mode: CodecMode) -> Result<()>;

    /**
        Create the surface an encoder consumes its input frames from.

        Only valid after configuring with [`CodecMode::Encode`] and before
        starting.
    */
    fn create_input_surface(&mut self) -> Result<Box<dyn InputSurface>>;

    /**
        Current output format. Valid once the codec has reported
        [`Dequeued::FormatChanged`] or emitted its codec config buffer.
    */
    fn output_format(&self) -> Result<MediaFormat>;

    fn start(&mut self) -> Result<()>;

    fn dequeue_input_buffer(&mut self, timeout: Duration) -> Result<Option<usize>>;

    fn input_buffer(&mut self, index: usize) -> Result<&mut [u8]>;

    fn queue_input_buffer(&mut self, index: usize, info: BufferInfo) -> Result<()>;

    fn dequeue_output_buffer(&mut self, timeout: Duration) -> Result<Dequeued>;

    fn output_buffer(&self, index: usize) -> Result<&[u8]>;

    /**
        Return an output buffer to the codec, optionally rendering its image
        to the configured surface first.
    */
    fn release_output_buffer(&mut self, index: usize, render: bool) -> Result<()>;

    /**
        Tell an input-surface encoder that no further frames will be submitted.
    */
    fn signal_end_of_input_stream(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn release(&mut self) -> Result<()>;
}

/**
    Codec capability collaborator: creates decoders and encoders.
*/
pub trait CodecProvider {
    fn create_decoder_by_name(&mut self, name: &str) -> Result<Box<dyn Codec>>;

    fn create_decoder_for(&mut self, mime: &str) -> Result<Box<dyn Codec>>;

    fn create_encoder_by_name(&mut self, name: &str) -> Result<Box<dyn Codec>>;

    fn create_encoder_for(&mut self, mime: &str) -> Result<Box<dyn Codec>>;
}
