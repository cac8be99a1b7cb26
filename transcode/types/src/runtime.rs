/*!
    Mid-stream runtime parameter changes.
*/

use serde::{Deserialize, Serialize};

use crate::CodecParameters;

/**
    A value that takes effect at a given frame index.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameValue<T> {
    pub frame: u64,
    pub value: T,
}

impl<T> FrameValue<T> {
    pub const fn new(frame: u64, value: T) -> Self {
        Self { frame, value }
    }
}

/**
    Changes due at one frame index.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeUpdate {
    /// New codec bitrate in bits per second.
    pub bitrate: Option<u32>,
    /// Request a sync frame from the codec.
    pub request_sync: bool,
    /// Force the next frame to be dropped.
    pub drop: bool,
    /// New target frame rate in frames per second.
    pub framerate: Option<u32>,
}

impl RuntimeUpdate {
    pub fn is_empty(&self) -> bool {
        self.bitrate.is_none() && !self.request_sync && !self.drop && self.framerate.is_none()
    }

    /**
        The part of this update directed at the codec itself, if any.
    */
    pub fn to_codec_parameters(&self) -> Option<CodecParameters> {
        if self.bitrate.is_none() && !self.request_sync {
            return None;
        }
        let mut params = CodecParameters::new();
        params.video_bitrate = self.bitrate;
        params.request_sync_frame = self.request_sync;
        Some(params)
    }
}

/**
    Runtime parameter collaborator.

    Asked once per consumed frame, with that frame's index, before the
    corresponding queue operation.
*/
pub trait RuntimeParameters {
    fn update_for(&self, frame: u64) -> RuntimeUpdate;
}

/**
    A fixed schedule of runtime changes keyed by frame index.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RuntimeSchedule {
    pub video_bitrate: Vec<FrameValue<u32>>,
    pub request_sync: Vec<u64>,
    pub drop: Vec<u64>,
    pub dynamic_framerate: Vec<FrameValue<u32>>,
}

impl RuntimeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video_bitrate(mut self, frame: u64, bitrate: u32) -> Self {
        self.video_bitrate.push(FrameValue::new(frame, bitrate));
        self
    }

    pub fn with_request_sync(mut self, frame: u64) -> Self {
        self.request_sync.push(frame);
        self
    }

    pub fn with_drop(mut self, frame: u64) -> Self {
        self.drop.push(frame);
        self
    }

    pub fn with_dynamic_framerate(mut self, frame: u64, fps: u32) -> Self {
        self.dynamic_framerate.push(FrameValue::new(frame, fps));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.video_bitrate.is_empty()
            && self.request_sync.is_empty()
            && self.drop.is_empty()
            && self.dynamic_framerate.is_empty()
    }
}

fn last_at<T: Copy>(entries: &[FrameValue<T>], frame: u64) -> Option<T> {
    entries
        .iter()
        .filter(|entry| entry.frame == frame)
        .map(|entry| entry.value)
        .last()
}

impl RuntimeParameters for RuntimeSchedule {
    fn update_for(&self, frame: u64) -> RuntimeUpdate {
        RuntimeUpdate {
            bitrate: last_at(&self.video_bitrate, frame),
            request_sync: self.request_sync.contains(&frame),
            drop: self.drop.contains(&frame),
            framerate: last_at(&self.dynamic_framerate, frame),
        }
    }
}
