use std::fmt;

use tracing::trace;

use transcode_types::{Error, InputSurface, Pts, Result, Surface, VideoFrame};

use crate::scale::Scaler;

enum Slot {
    Empty,
    Awaited(VideoFrame),
    Drawn(VideoFrame),
    Timed(VideoFrame, Pts),
}

impl Slot {
    fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Awaited(_) => "awaited",
            Self::Drawn(_) => "drawn",
            Self::Timed(..) => "timed",
        }
    }
}

/**
    Single-slot handoff from decoder output to encoder input.

    The decoder renders into the bridge's [`Surface`]; the bridge then moves
    one image at a time through await, draw, presentation time and swap, in
    that order. Each step fails with an illegal state error if called out of
    order, so at most one image is ever in flight.
*/
pub struct RenderBridge {
    surface: Surface,
    target: Box<dyn InputSurface>,
    scaler: Scaler,
    slot: Slot,
    committed: u64,
}

impl RenderBridge {
    /**
        Create a bridge committing frames of the given size to `target`.
    */
    pub fn new(target: Box<dyn InputSurface>, width: u32, height: u32) -> Self {
        Self {
            surface: Surface::new(),
            target,
            scaler: Scaler::new(width, height),
            slot: Slot::Empty,
            committed: 0,
        }
    }

    /**
        Handle to the surface the decoder should render into.
    */
    pub fn surface(&self) -> Surface {
        self.surface.clone()
    }

    /// Number of frames committed to the target so far.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    fn out_of_order(&self, operation: &str) -> Error {
        Error::illegal_state(format!(
            "{operation} called with {} render slot",
            self.slot.name()
        ))
    }

    /**
        Block until the decoder has rendered the next image.

        There is no timeout: call this only after releasing a decoder output
        buffer with render requested.
    */
    pub fn await_new_image(&mut self) -> Result<()> {
        if !matches!(self.slot, Slot::Empty) {
            return Err(self.out_of_order("await_new_image"));
        }
        let image = self.surface.wait_for_image();
        trace!(pts = ?image.pts, "image available");
        self.slot = Slot::Awaited(image);
        Ok(())
    }

    /**
        Draw the awaited image into the output representation.
    */
    pub fn draw_image(&mut self) -> Result<()> {
        let Slot::Awaited(image) = &self.slot else {
            return Err(self.out_of_order("draw_image"));
        };
        let drawn = self.scaler.scale(image)?;
        self.slot = Slot::Drawn(drawn);
        Ok(())
    }

    /**
        Attach the encoder-facing presentation time to the drawn image.
    */
    pub fn set_presentation_time(&mut self, pts: Pts) -> Result<()> {
        match std::mem::replace(&mut self.slot, Slot::Empty) {
            Slot::Drawn(frame) | Slot::Timed(frame, _) => {
                self.slot = Slot::Timed(frame, pts);
                Ok(())
            }
            other => {
                self.slot = other;
                Err(self.out_of_order("set_presentation_time"))
            }
        }
    }

    /**
        Commit the drawn image to the encoder and free the slot.
    */
    pub fn swap_buffers(&mut self) -> Result<()> {
        let (frame, pts) = match std::mem::replace(&mut self.slot, Slot::Empty) {
            Slot::Timed(frame, pts) => (frame, pts),
            other => {
                self.slot = other;
                return Err(self.out_of_order("swap_buffers"));
            }
        };
        self.target.submit(frame.with_pts(pts))?;
        self.committed += 1;
        trace!(?pts, "frame committed");
        Ok(())
    }
}

impl fmt::Debug for RenderBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBridge")
            .field("surface", &self.surface)
            .field("scaler", &self.scaler)
            .field("slot", &self.slot.name())
            .field("committed", &self.committed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use transcode_types::PixelFormat;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<VideoFrame>>>);

    impl InputSurface for Capture {
        fn submit(&mut self, frame: VideoFrame) -> Result<()> {
            self.0.lock().unwrap().push(frame);
            Ok(())
        }
    }

    fn image(pts: i64) -> VideoFrame {
        VideoFrame::filled(8, 8, PixelFormat::Yuv420p, 7, Some(Pts(pts)))
    }

    #[test]
    fn full_cycle_commits_with_corrected_pts() {
        let capture = Capture::default();
        let mut bridge = RenderBridge::new(Box::new(capture.clone()), 4, 4);
        bridge.surface().post(image(100));

        bridge.await_new_image().unwrap();
        bridge.draw_image().unwrap();
        bridge.set_presentation_time(Pts(5_000)).unwrap();
        bridge.swap_buffers().unwrap();

        let frames = capture.0.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pts, Some(Pts(5_000)));
        assert_eq!((frames[0].width, frames[0].height), (4, 4));
        assert_eq!(bridge.committed(), 1);
    }

    #[test]
    fn steps_out_of_order_are_rejected() {
        let mut bridge = RenderBridge::new(Box::new(Capture::default()), 8, 8);
        assert!(bridge.draw_image().unwrap_err().is_illegal_state());
        assert!(bridge.set_presentation_time(Pts(0)).unwrap_err().is_illegal_state());
        assert!(bridge.swap_buffers().unwrap_err().is_illegal_state());

        bridge.surface().post(image(0));
        bridge.await_new_image().unwrap();
        // a second await would need a second render
        assert!(bridge.await_new_image().unwrap_err().is_illegal_state());
        assert!(bridge.swap_buffers().unwrap_err().is_illegal_state());
    }

    #[test]
    fn slot_is_free_after_swap() {
        let capture = Capture::default();
        let mut bridge = RenderBridge::new(Box::new(capture.clone()), 8, 8);
        for pts in [0, 33_333, 66_666] {
            bridge.surface().post(image(pts));
            bridge.await_new_image().unwrap();
            bridge.draw_image().unwrap();
            bridge.set_presentation_time(Pts(pts)).unwrap();
            bridge.swap_buffers().unwrap();
        }
        let pts: Vec<_> = capture.0.lock().unwrap().iter().map(|f| f.pts).collect();
        assert_eq!(pts, vec![Some(Pts(0)), Some(Pts(33_333)), Some(Pts(66_666))]);
    }
}
