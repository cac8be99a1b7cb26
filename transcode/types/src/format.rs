/*!
    Pixel formats and media format descriptors.
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CodecId, Rational};

/**
    Video pixel formats.

    This is the subset of layouts a rendering surface is expected to hand
    around. Frame data is always tightly packed, planes back to back.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp (most common video format)
    Yuv420p,
    /// Semi-planar YUV 4:2:0, 12bpp (common hardware decoder output)
    Nv12,
    /// Packed BGRA, 32bpp
    Bgra,
    /// Packed RGBA, 32bpp
    Rgba,
    /// Packed RGB, 24bpp
    Rgb24,
    /// Planar YUV 4:2:0, 10-bit samples stored in 16 bits
    Yuv420p10,
    /// Single luma plane, 8bpp
    Gray8,
}

/**
    Geometry of one plane of a frame.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Width in sample groups.
    pub width: u32,
    /// Height in rows.
    pub height: u32,
    /// Bytes per sample group (e.g. 2 for interleaved UV, 4 for RGBA).
    pub bytes_per_group: u32,
}

impl PlaneLayout {
    pub const fn row_bytes(&self) -> usize {
        self.width as usize * self.bytes_per_group as usize
    }

    pub const fn len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PixelFormat {
    /**
        Plane geometry for a frame of the given size.

        Chroma planes of subsampled formats round their dimensions up, so odd
        sizes still cover every luma sample.
    */
    pub fn planes(self, width: u32, height: u32) -> Vec<PlaneLayout> {
        let plane = |width, height, bytes_per_group| PlaneLayout {
            width,
            height,
            bytes_per_group,
        };
        let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
        match self {
            Self::Yuv420p => vec![plane(width, height, 1), plane(cw, ch, 1), plane(cw, ch, 1)],
            Self::Yuv420p10 => vec![plane(width, height, 2), plane(cw, ch, 2), plane(cw, ch, 2)],
            Self::Nv12 => vec![plane(width, height, 1), plane(cw, ch, 2)],
            Self::Bgra | Self::Rgba => vec![plane(width, height, 4)],
            Self::Rgb24 => vec![plane(width, height, 3)],
            Self::Gray8 => vec![plane(width, height, 1)],
        }
    }

    /**
        Total byte size of a tightly packed frame.
    */
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        self.planes(width, height).iter().map(PlaneLayout::len).sum()
    }

    pub const fn is_planar(self) -> bool {
        match self {
            Self::Yuv420p | Self::Yuv420p10 | Self::Nv12 => true,
            Self::Bgra | Self::Rgba | Self::Rgb24 | Self::Gray8 => false,
        }
    }
}

/**
    A named tuning value carried in a format or runtime parameter set.
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/**
    Colour signalling of a video track.

    Values are the integer codes used by the codec collaborators; the
    pipeline only copies them from the input track to the encoder.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorDescription {
    pub range: Option<i32>,
    pub transfer: Option<i32>,
    pub standard: Option<i32>,
}

impl ColorDescription {
    /**
        Fill fields that are unset here with the ones set in `other`.
    */
    pub fn fill_missing_from(&mut self, other: &ColorDescription) {
        self.range = self.range.or(other.range);
        self.transfer = self.transfer.or(other.transfer);
        self.standard = self.standard.or(other.standard);
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_none() && self.transfer.is_none() && self.standard.is_none()
    }
}

/**
    Format descriptor exchanged with codecs, demuxers and muxers.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct MediaFormat {
    /// Mime type, e.g. `video/avc`.
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<Rational>,
    /// Target bitrate in bits per second.
    pub bitrate: Option<u32>,
    /// Keyframe interval in seconds.
    pub keyframe_interval: Option<u32>,
    pub color: ColorDescription,
    /// Encoder consumes frames from an input surface instead of queued buffers.
    pub surface_input: bool,
    /// Arbitrary named tuning parameters.
    pub params: BTreeMap<String, ParamValue>,
}

impl MediaFormat {
    /**
        Create a video format with the given mime type and dimensions.
    */
    pub fn video(mime: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            mime: mime.into(),
            width,
            height,
            frame_rate: None,
            bitrate: None,
            keyframe_interval: None,
            color: ColorDescription::default(),
            surface_input: false,
            params: BTreeMap::new(),
        }
    }

    pub fn with_frame_rate(mut self, rate: impl Into<Rational>) -> Self {
        self.frame_rate = Some(rate.into());
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_keyframe_interval(mut self, seconds: u32) -> Self {
        self.keyframe_interval = Some(seconds);
        self
    }

    pub fn with_color(mut self, color: ColorDescription) -> Self {
        self.color = color;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /**
        Returns true for video mime types.
    */
    pub fn is_video(&self) -> bool {
        self.mime.to_ascii_lowercase().contains("video")
    }

    /**
        Codec identified by the mime type, if known.
    */
    pub fn codec_id(&self) -> Option<CodecId> {
        CodecId::from_mime(&self.mime)
    }
}
