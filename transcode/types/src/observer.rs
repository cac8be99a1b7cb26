/*!
    Statistics observer collaborator.
*/

use crate::{BufferFlags, Pts};

/**
    Receives per-frame notifications from the pipeline stages.

    Purely observational: nothing an observer does influences control flow.
    Every method has an empty default so observers only implement the points
    they care about.
*/
pub trait FrameObserver {
    /// A compressed sample was queued to the decoder.
    fn decode_started(&mut self, pts: Pts, size: usize, flags: BufferFlags) {
        let _ = (pts, size, flags);
    }

    /// A decoded frame left the decoder.
    fn decode_finished(&mut self, pts: Pts) {
        let _ = pts;
    }

    /// A rendered frame was committed to the encoder input surface.
    fn encode_started(&mut self, pts: Pts) {
        let _ = pts;
    }

    /**
        An output buffer left the encoder.

        Called for codec config buffers as well as encoded frames. A format
        change carries no buffer and is not reported.
    */
    fn encode_finished(&mut self, pts: Pts, size: usize, key_frame: bool) {
        let _ = (pts, size, key_frame);
    }
}

/**
    Observer that ignores every notification.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl FrameObserver for NullObserver {}
