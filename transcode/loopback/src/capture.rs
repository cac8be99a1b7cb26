use std::sync::Arc;

use parking_lot::Mutex;

use transcode_types::{InputSurface, Pts, Result, VideoFrame};

/**
    Input surface that keeps every submitted frame.
*/
#[derive(Clone, Debug, Default)]
pub struct FrameCapture {
    frames: Arc<Mutex<Vec<VideoFrame>>>,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<VideoFrame> {
        self.frames.lock().clone()
    }

    /// Presentation times of the captured frames, in submit order.
    pub fn timestamps(&self) -> Vec<Option<Pts>> {
        self.frames.lock().iter().map(|frame| frame.pts).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InputSurface for FrameCapture {
    fn submit(&mut self, frame: VideoFrame) -> Result<()> {
        self.frames.lock().push(frame);
        Ok(())
    }
}
