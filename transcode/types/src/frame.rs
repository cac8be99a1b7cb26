/*!
    Decoded image type handed across the rendering surface.
*/

use crate::{Error, PixelFormat, Pts, Result};

/**
    A decoded video frame.

    Planes are stored tightly packed and back to back, in the order given by
    [`PixelFormat::planes`]. The pts is the raw decoder output timestamp;
    the corrected, encoder-facing timestamp is attached by the render bridge.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    /// Raw pixel data.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format of the data.
    pub format: PixelFormat,
    /// Presentation timestamp (None for frames without timing).
    pub pts: Option<Pts>,
}

impl VideoFrame {
    /**
        Create a new video frame, checking that the data covers every plane.
    */
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        pts: Option<Pts>,
    ) -> Result<Self> {
        let expected = format.frame_size(width, height);
        if data.len() < expected {
            return Err(Error::invalid_data(format!(
                "{width}x{height} {format:?} frame needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            pts,
        })
    }

    /**
        Create a frame filled with a single byte value.
    */
    pub fn filled(width: u32, height: u32, format: PixelFormat, value: u8, pts: Option<Pts>) -> Self {
        Self {
            data: vec![value; format.frame_size(width, height)],
            width,
            height,
            format,
            pts,
        }
    }

    /**
        Returns the byte slices of each plane.
    */
    pub fn planes(&self) -> Vec<&[u8]> {
        let mut offset = 0;
        self.format
            .planes(self.width, self.height)
            .iter()
            .map(|plane| {
                let end = (offset + plane.len()).min(self.data.len());
                let slice = &self.data[offset.min(end)..end];
                offset = end;
                slice
            })
            .collect()
    }

    pub fn with_pts(mut self, pts: Pts) -> Self {
        self.pts = Some(pts);
        self
    }
}
