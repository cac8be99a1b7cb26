/*!
    Nearest-neighbour frame scaling.
*/

use transcode_types::{Error, Result, VideoFrame};

/**
    Scales frames to a fixed output size, plane by plane.

    The pixel format is preserved. Sampling is nearest-neighbour, which keeps
    the blit exact when the sizes match and cheap when they don't.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scaler {
    width: u32,
    height: u32,
}

impl Scaler {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /**
        Scale a frame to the output size. The pts is carried over.
    */
    pub fn scale(&self, frame: &VideoFrame) -> Result<VideoFrame> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::configuration("scaler output size must be non-zero"));
        }
        if frame.width == self.width && frame.height == self.height {
            return Ok(frame.clone());
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(Error::invalid_data("cannot scale an empty frame"));
        }

        let src_planes = frame.format.planes(frame.width, frame.height);
        let dst_planes = frame.format.planes(self.width, self.height);
        let sources = frame.planes();
        let complete = sources
            .iter()
            .zip(&src_planes)
            .all(|(plane, layout)| plane.len() == layout.len());
        if sources.len() != src_planes.len() || !complete {
            return Err(Error::invalid_data("frame data does not match its format"));
        }

        let mut data = Vec::with_capacity(frame.format.frame_size(self.width, self.height));
        for ((src, src_layout), dst_layout) in sources.iter().zip(&src_planes).zip(&dst_planes) {
            let bytes = dst_layout.bytes_per_group as usize;
            let src_row = src_layout.row_bytes();
            for y in 0..dst_layout.height {
                let sy = nearest(y, dst_layout.height, src_layout.height);
                let row = &src[sy * src_row..(sy + 1) * src_row];
                for x in 0..dst_layout.width {
                    let sx = nearest(x, dst_layout.width, src_layout.width);
                    data.extend_from_slice(&row[sx * bytes..(sx + 1) * bytes]);
                }
            }
        }

        VideoFrame::new(data, self.width, self.height, frame.format, frame.pts)
    }
}

fn nearest(dst: u32, dst_len: u32, src_len: u32) -> usize {
    let src = (u64::from(dst) * u64::from(src_len)) / u64::from(dst_len.max(1));
    src.min(u64::from(src_len.saturating_sub(1))) as usize
}
