/*!
    Rendering handoff between the decoder and the encoder.
*/

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::{Result, VideoFrame};

#[derive(Default)]
struct Slot {
    frame: Option<VideoFrame>,
    posted: u64,
    overwritten: u64,
}

#[derive(Default)]
struct Inner {
    slot: Mutex<Slot>,
    available: Condvar,
}

/**
    Shared single-slot rendering surface.

    A decoder configured with this surface posts the image of every output
    buffer released with render requested. The slot holds at most one image;
    posting while an image is still pending overwrites it instead of queueing.

    Cloning is cheap and yields another handle to the same slot. The decoder
    may post from its own callback thread, so the handle is `Send + Sync`.
*/
#[derive(Clone, Default)]
pub struct Surface {
    inner: Arc<Inner>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Post a rendered image, replacing any image still pending.
    */
    pub fn post(&self, frame: VideoFrame) {
        let mut slot = self.inner.slot.lock();
        if slot.frame.replace(frame).is_some() {
            slot.overwritten += 1;
        }
        slot.posted += 1;
        self.inner.available.notify_all();
    }

    /**
        Block until an image is available and take it.

        There is no timeout; callers only wait after requesting a render.
    */
    pub fn wait_for_image(&self) -> VideoFrame {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(frame) = slot.frame.take() {
                return frame;
            }
            self.inner.available.wait(&mut slot);
        }
    }

    /**
        Take the pending image without waiting.
    */
    pub fn try_take(&self) -> Option<VideoFrame> {
        self.inner.slot.lock().frame.take()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.slot.lock().frame.is_some()
    }

    /**
        Number of images posted so far.
    */
    pub fn posted(&self) -> u64 {
        self.inner.slot.lock().posted
    }

    /**
        Number of images replaced before anyone took them.
    */
    pub fn overwritten(&self) -> u64 {
        self.inner.slot.lock().overwritten
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("Surface")
            .field("pending", &slot.frame.is_some())
            .field("posted", &slot.posted)
            .finish()
    }
}

// Verify Surface is Send + Sync
static_assertions::assert_impl_all!(Surface: Send, Sync, Clone);

/**
    Encoder-visible input surface.

    Committing a frame hands it to the encoder, which takes its presentation
    time from the frame's pts.
*/
pub trait InputSurface: Send {
    fn submit(&mut self, frame: VideoFrame) -> Result<()>;
}
