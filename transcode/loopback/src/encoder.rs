/*!
    Loopback encoder.
*/

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use transcode_types::{
    BufferFlags, BufferInfo, Codec, CodecControl, CodecInfo, CodecMode, CodecParameters,
    Dequeued, Error, InputSurface, MediaFormat, Pts, Result, VideoFrame,
};

use crate::state::CodecState;

/// Bytes of codec specific data emitted before the first frame.
pub const CODEC_CONFIG_PAYLOAD: [u8; 8] = [0, 0, 0, 1, 0x67, 0x42, 0, 0x1f];

/**
    How a [`LoopbackEncoder`] announces its output format.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatAnnouncement {
    /// Emit a codec config buffer before the first frame.
    #[default]
    CodecConfig,
    /// Report a format change before the first frame.
    FormatChanged,
}

/**
    What a [`LoopbackEncoder`] has been asked to do so far.
*/
#[derive(Clone, Debug, Default)]
pub struct EncoderLog {
    pub configured: Option<MediaFormat>,
    pub started: bool,
    /// Timestamps of frames submitted through the input surface.
    pub submitted: Vec<Pts>,
    pub end_of_input_signals: u32,
    pub parameters: Vec<CodecParameters>,
    pub sync_requests: u32,
    /// Current target bitrate.
    pub bitrate: Option<u32>,
    pub stopped: bool,
    pub released: bool,
}

/**
    Shared view of an [`EncoderLog`].
*/
#[derive(Clone, Debug, Default)]
pub struct EncoderJournal {
    log: Arc<Mutex<EncoderLog>>,
}

impl EncoderJournal {
    pub fn snapshot(&self) -> EncoderLog {
        self.log.lock().clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut EncoderLog) -> R) -> R {
        f(&mut self.log.lock())
    }
}

#[derive(Default)]
struct SurfaceQueue {
    frames: VecDeque<VideoFrame>,
    closed: bool,
}

/**
    Input surface of a [`LoopbackEncoder`].

    Rejects frames whose size differs from the configured one, and any frame
    after end of input was signalled.
*/
pub struct LoopbackInputSurface {
    queue: Arc<Mutex<SurfaceQueue>>,
    width: u32,
    height: u32,
    journal: EncoderJournal,
}

impl InputSurface for LoopbackInputSurface {
    fn submit(&mut self, frame: VideoFrame) -> Result<()> {
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(Error::invalid_data(format!(
                "surface is {}x{}, got a {}x{} frame",
                self.width, self.height, frame.width, frame.height
            )));
        }
        let Some(pts) = frame.pts else {
            return Err(Error::invalid_data("frame without presentation time"));
        };
        let mut queue = self.queue.lock();
        if queue.closed {
            return Err(Error::illegal_state("frame submitted after end of input"));
        }
        queue.frames.push_back(frame);
        self.journal.with(|log| log.submitted.push(pts));
        Ok(())
    }
}

/**
    An encoder that turns surface frames into small tagged payloads.

    Payloads start with the frame's first byte. Key frames are produced at
    the configured interval and whenever a sync frame was requested.
*/
pub struct LoopbackEncoder {
    info: CodecInfo,
    state: CodecState,
    format: Option<MediaFormat>,
    announcement: FormatAnnouncement,
    announced: bool,
    fail_configure: bool,
    fail_start: bool,
    queue: Arc<Mutex<SurfaceQueue>>,
    frames_encoded: u64,
    key_interval: u64,
    sync_pending: bool,
    eos_signalled: bool,
    eos_emitted: bool,
    outputs: HashMap<usize, Vec<u8>>,
    next_output: usize,
    journal: EncoderJournal,
}

impl LoopbackEncoder {
    pub fn new(info: CodecInfo) -> Self {
        Self {
            info,
            state: CodecState::Unconfigured,
            format: None,
            announcement: FormatAnnouncement::default(),
            announced: false,
            fail_configure: false,
            fail_start: false,
            queue: Arc::default(),
            frames_encoded: 0,
            key_interval: 1,
            sync_pending: false,
            eos_signalled: false,
            eos_emitted: false,
            outputs: HashMap::new(),
            next_output: 0,
            journal: EncoderJournal::default(),
        }
    }

    pub fn with_announcement(mut self, announcement: FormatAnnouncement) -> Self {
        self.announcement = announcement;
        self
    }

    /**
        Reject every configuration.
    */
    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    /**
        Fail to start after a successful configuration.
    */
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub(crate) fn with_journal(mut self, journal: EncoderJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> EncoderJournal {
        self.journal.clone()
    }

    fn emit(&mut self, data: Vec<u8>, pts: Pts, flags: BufferFlags) -> Dequeued {
        let index = self.next_output;
        self.next_output += 1;
        let info = BufferInfo::new(data.len(), pts, flags);
        self.outputs.insert(index, data);
        Dequeued::Buffer { index, info }
    }

    fn encode(&mut self, frame: VideoFrame) -> Dequeued {
        let key_frame = self.frames_encoded % self.key_interval == 0 || self.sync_pending;
        self.sync_pending = false;
        self.frames_encoded += 1;

        let fill = frame.data.first().copied().unwrap_or(0);
        let size = if key_frame { 32 } else { 12 };
        let mut data = vec![fill; size];
        data[1] = u8::from(key_frame);

        let flags = if key_frame {
            BufferFlags::KEY_FRAME
        } else {
            BufferFlags::NONE
        };
        let pts = frame.pts.unwrap_or_default();
        trace!(pts = pts.as_micros(), key_frame, "encoded frame");
        self.emit(data, pts, flags)
    }
}

impl CodecControl for LoopbackEncoder {
    fn set_parameters(&mut self, params: &CodecParameters) -> Result<()> {
        self.state.expect_running("set parameters")?;
        if params.request_sync_frame {
            self.sync_pending = true;
        }
        self.journal.with(|log| {
            if params.request_sync_frame {
                log.sync_requests += 1;
            }
            if let Some(bitrate) = params.video_bitrate {
                log.bitrate = Some(bitrate);
            }
            log.parameters.push(params.clone());
        });
        Ok(())
    }
}

impl Codec for LoopbackEncoder {
    fn info(&self) -> &CodecInfo {
        &self.info
    }

    fn configure(&mut self, format: &MediaFormat, mode: CodecMode) -> Result<()> {
        if self.state != CodecState::Unconfigured {
            return Err(Error::illegal_state("encoder already configured"));
        }
        if !mode.is_encode() {
            return Err(Error::configuration("encoder cannot be configured to decode"));
        }
        if self.fail_configure {
            return Err(Error::configuration(format!(
                "{} rejected {}",
                self.info.name, format.mime
            )));
        }
        if format.width == 0 || format.height == 0 {
            return Err(Error::configuration("encoder needs a frame size"));
        }
        let frame_rate = format.frame_rate.map(|rate| rate.rounded()).unwrap_or(30);
        let interval = u64::from(format.keyframe_interval.unwrap_or(1));
        self.key_interval = (u64::from(frame_rate) * interval).max(1);
        self.format = Some(format.clone());
        self.state = CodecState::Configured;
        self.journal.with(|log| {
            log.configured = Some(format.clone());
            log.bitrate = format.bitrate;
        });
        Ok(())
    }

    fn create_input_surface(&mut self) -> Result<Box<dyn InputSurface>> {
        let Some(format) = self.format.as_ref().filter(|_| self.state == CodecState::Configured)
        else {
            return Err(Error::illegal_state(
                "input surface requires a configured, unstarted encoder",
            ));
        };
        Ok(Box::new(LoopbackInputSurface {
            queue: self.queue.clone(),
            width: format.width,
            height: format.height,
            journal: self.journal.clone(),
        }))
    }

    fn output_format(&self) -> Result<MediaFormat> {
        let format = self
            .format
            .as_ref()
            .ok_or_else(|| Error::illegal_state("encoder not configured"))?;
        let mut output = format.clone();
        output.surface_input = false;
        Ok(output)
    }

    fn start(&mut self) -> Result<()> {
        if self.state != CodecState::Configured {
            return Err(Error::illegal_state("encoder not configured"));
        }
        if self.fail_start {
            return Err(Error::codec(format!("{} failed to start", self.info.name)));
        }
        self.state = CodecState::Running;
        self.journal.with(|log| log.started = true);
        Ok(())
    }

    fn dequeue_input_buffer(&mut self, _timeout: Duration) -> Result<Option<usize>> {
        Err(Error::illegal_state("encoder takes input from its surface"))
    }

    fn input_buffer(&mut self, _index: usize) -> Result<&mut [u8]> {
        Err(Error::illegal_state("encoder takes input from its surface"))
    }

    fn queue_input_buffer(&mut self, _index: usize, _info: BufferInfo) -> Result<()> {
        Err(Error::illegal_state("encoder takes input from its surface"))
    }

    fn dequeue_output_buffer(&mut self, _timeout: Duration) -> Result<Dequeued> {
        self.state.expect_running("dequeue output")?;
        if !self.announced {
            self.announced = true;
            return Ok(match self.announcement {
                FormatAnnouncement::CodecConfig => self.emit(
                    CODEC_CONFIG_PAYLOAD.to_vec(),
                    Pts::ZERO,
                    BufferFlags::CODEC_CONFIG,
                ),
                FormatAnnouncement::FormatChanged => Dequeued::FormatChanged,
            });
        }
        let frame = self.queue.lock().frames.pop_front();
        if let Some(frame) = frame {
            return Ok(self.encode(frame));
        }
        if self.eos_signalled && !self.eos_emitted {
            self.eos_emitted = true;
            return Ok(self.emit(Vec::new(), Pts::ZERO, BufferFlags::END_OF_STREAM));
        }
        Ok(Dequeued::TryAgainLater)
    }

    fn output_buffer(&self, index: usize) -> Result<&[u8]> {
        self.outputs
            .get(&index)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::illegal_state(format!("output buffer {index} is not dequeued")))
    }

    fn release_output_buffer(&mut self, index: usize, _render: bool) -> Result<()> {
        self.outputs
            .remove(&index)
            .map(|_| ())
            .ok_or_else(|| Error::illegal_state(format!("output buffer {index} is not dequeued")))
    }

    fn signal_end_of_input_stream(&mut self) -> Result<()> {
        self.state.expect_running("signal end of input")?;
        self.journal.with(|log| log.end_of_input_signals += 1);
        if self.eos_signalled {
            return Err(Error::illegal_state("end of input already signalled"));
        }
        self.eos_signalled = true;
        self.queue.lock().closed = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state.expect_running("stop")?;
        self.state = CodecState::Stopped;
        self.journal.with(|log| log.stopped = true);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.state == CodecState::Released {
            return Err(Error::illegal_state("encoder already released"));
        }
        self.state = CodecState::Released;
        self.outputs.clear();
        self.journal.with(|log| log.released = true);
        Ok(())
    }
}
