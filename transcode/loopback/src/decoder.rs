/*!
    Loopback decoder.
*/

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use transcode_types::{
    BufferFlags, BufferInfo, Codec, CodecControl, CodecId, CodecInfo, CodecMode, CodecParameters,
    Dequeued, Error, InputSurface, MediaFormat, PixelFormat, Pts, Result, Surface, VideoFrame,
};

use crate::state::CodecState;

const INPUT_BUFFERS: usize = 4;
const INPUT_CAPACITY: usize = 64 * 1024;

/**
    What a [`LoopbackDecoder`] has been asked to do so far.
*/
#[derive(Clone, Debug, Default)]
pub struct DecoderLog {
    pub configured: Option<MediaFormat>,
    pub started: bool,
    /// Timestamps of queued samples, in queue order.
    pub samples: Vec<Pts>,
    pub end_of_stream_queued: u32,
    pub rendered: u64,
    pub released_without_render: u64,
    pub parameters: Vec<CodecParameters>,
    pub stopped: bool,
    pub released: bool,
}

/**
    Shared view of a [`DecoderLog`], kept by tests after the decoder has
    been handed to the pipeline.
*/
#[derive(Clone, Debug, Default)]
pub struct DecoderJournal {
    log: Arc<Mutex<DecoderLog>>,
}

impl DecoderJournal {
    pub fn snapshot(&self) -> DecoderLog {
        self.log.lock().clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut DecoderLog) -> R) -> R {
        f(&mut self.log.lock())
    }
}

struct Output {
    frame: Option<VideoFrame>,
}

/**
    A decoder over [`crate::MemorySource`] payloads.

    Each queued sample becomes one decoded frame filled with the sample's
    first byte. Output is held back by the configured latency, so the first
    frames only come out once later samples have been queued, and all of
    them are flushed by the end-of-stream marker.
*/
pub struct LoopbackDecoder {
    info: CodecInfo,
    state: CodecState,
    surface: Option<Surface>,
    width: u32,
    height: u32,
    latency: usize,
    announce_format: bool,
    fail_configure: bool,
    inputs: Vec<Vec<u8>>,
    owned_inputs: Vec<bool>,
    free_inputs: VecDeque<usize>,
    pending: VecDeque<(Pts, u8)>,
    outputs: HashMap<usize, Output>,
    next_output: usize,
    eos_queued: bool,
    eos_emitted: bool,
    journal: DecoderJournal,
}

impl LoopbackDecoder {
    pub fn new() -> Self {
        Self {
            info: CodecInfo::new("loopback.avc.decoder", Some(CodecId::H264)),
            state: CodecState::Unconfigured,
            surface: None,
            width: 0,
            height: 0,
            latency: 0,
            announce_format: true,
            fail_configure: false,
            inputs: vec![vec![0; INPUT_CAPACITY]; INPUT_BUFFERS],
            owned_inputs: vec![false; INPUT_BUFFERS],
            free_inputs: (0..INPUT_BUFFERS).collect(),
            pending: VecDeque::new(),
            outputs: HashMap::new(),
            next_output: 0,
            eos_queued: false,
            eos_emitted: false,
            journal: DecoderJournal::default(),
        }
    }

    /**
        Hold back `frames` decoded frames until more input arrives.
    */
    pub fn with_latency(mut self, frames: usize) -> Self {
        self.latency = frames;
        self
    }

    /**
        Skip the format change the decoder reports before its first frame.
    */
    pub fn without_format_change(mut self) -> Self {
        self.announce_format = false;
        self
    }

    /**
        Reject every configuration.
    */
    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    pub fn with_info(mut self, info: CodecInfo) -> Self {
        self.info = info;
        self
    }

    pub(crate) fn with_journal(mut self, journal: DecoderJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> DecoderJournal {
        self.journal.clone()
    }

    fn take_input(&mut self, index: usize) -> Result<()> {
        match self.owned_inputs.get_mut(index) {
            Some(owned) if *owned => {
                *owned = false;
                self.free_inputs.push_back(index);
                Ok(())
            }
            _ => Err(Error::illegal_state(format!(
                "input buffer {index} is not dequeued"
            ))),
        }
    }

    fn emit(&mut self, frame: Option<VideoFrame>, info: BufferInfo) -> Dequeued {
        let index = self.next_output;
        self.next_output += 1;
        self.outputs.insert(index, Output { frame });
        Dequeued::Buffer { index, info }
    }
}

impl Default for LoopbackDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecControl for LoopbackDecoder {
    fn set_parameters(&mut self, params: &CodecParameters) -> Result<()> {
        self.state.expect_running("set parameters")?;
        self.journal.with(|log| log.parameters.push(params.clone()));
        Ok(())
    }
}

impl Codec for LoopbackDecoder {
    fn info(&self) -> &CodecInfo {
        &self.info
    }

    fn configure(&mut self, format: &MediaFormat, mode: CodecMode) -> Result<()> {
        if self.state != CodecState::Unconfigured {
            return Err(Error::illegal_state("decoder already configured"));
        }
        if self.fail_configure {
            return Err(Error::configuration(format!(
                "{} rejected {}",
                self.info.name, format.mime
            )));
        }
        let CodecMode::Decode { surface } = mode else {
            return Err(Error::configuration("decoder cannot be configured to encode"));
        };
        self.surface = surface;
        self.width = format.width;
        self.height = format.height;
        self.state = CodecState::Configured;
        self.journal.with(|log| log.configured = Some(format.clone()));
        Ok(())
    }

    fn create_input_surface(&mut self) -> Result<Box<dyn InputSurface>> {
        Err(Error::illegal_state("decoders have no input surface"))
    }

    fn output_format(&self) -> Result<MediaFormat> {
        if self.state == CodecState::Unconfigured {
            return Err(Error::illegal_state("decoder not configured"));
        }
        Ok(MediaFormat::video("video/raw", self.width, self.height))
    }

    fn start(&mut self) -> Result<()> {
        if self.state != CodecState::Configured {
            return Err(Error::illegal_state("decoder not configured"));
        }
        self.state = CodecState::Running;
        self.journal.with(|log| log.started = true);
        Ok(())
    }

    fn dequeue_input_buffer(&mut self, _timeout: Duration) -> Result<Option<usize>> {
        self.state.expect_running("dequeue input")?;
        if self.eos_queued {
            return Ok(None);
        }
        let index = self.free_inputs.pop_front();
        if let Some(index) = index {
            self.owned_inputs[index] = true;
        }
        Ok(index)
    }

    fn input_buffer(&mut self, index: usize) -> Result<&mut [u8]> {
        if !self.owned_inputs.get(index).copied().unwrap_or(false) {
            return Err(Error::illegal_state(format!(
                "input buffer {index} is not dequeued"
            )));
        }
        Ok(&mut self.inputs[index])
    }

    fn queue_input_buffer(&mut self, index: usize, info: BufferInfo) -> Result<()> {
        self.state.expect_running("queue input")?;
        if self.eos_queued {
            return Err(Error::illegal_state("input queued after end of stream"));
        }
        self.take_input(index)?;
        if info.is_end_of_stream() {
            trace!("end of stream queued");
            self.eos_queued = true;
            self.journal.with(|log| log.end_of_stream_queued += 1);
            return Ok(());
        }
        let fill = self.inputs[index].first().copied().unwrap_or(0);
        self.pending.push_back((info.pts, fill));
        self.journal.with(|log| log.samples.push(info.pts));
        Ok(())
    }

    fn dequeue_output_buffer(&mut self, _timeout: Duration) -> Result<Dequeued> {
        self.state.expect_running("dequeue output")?;
        if self.announce_format {
            self.announce_format = false;
            return Ok(Dequeued::FormatChanged);
        }
        if self.pending.len() > self.latency || (self.eos_queued && !self.pending.is_empty()) {
            if let Some((pts, fill)) = self.pending.pop_front() {
                let frame =
                    VideoFrame::filled(self.width, self.height, PixelFormat::Yuv420p, fill, Some(pts));
                let info = BufferInfo::new(frame.data.len(), pts, BufferFlags::NONE);
                return Ok(self.emit(Some(frame), info));
            }
        }
        if self.eos_queued && !self.eos_emitted {
            self.eos_emitted = true;
            return Ok(self.emit(None, BufferInfo::end_of_stream()));
        }
        Ok(Dequeued::TryAgainLater)
    }

    fn output_buffer(&self, index: usize) -> Result<&[u8]> {
        match self.outputs.get(&index) {
            Some(Output { frame: Some(frame) }) => Ok(&frame.data),
            Some(Output { frame: None }) => Ok(&[]),
            None => Err(Error::illegal_state(format!(
                "output buffer {index} is not dequeued"
            ))),
        }
    }

    fn release_output_buffer(&mut self, index: usize, render: bool) -> Result<()> {
        let output = self.outputs.remove(&index).ok_or_else(|| {
            Error::illegal_state(format!("output buffer {index} is not dequeued"))
        })?;
        match (render, output.frame, self.surface.as_ref()) {
            (true, Some(frame), Some(surface)) => {
                surface.post(frame);
                self.journal.with(|log| log.rendered += 1);
            }
            (true, _, _) => {}
            (false, _, _) => self.journal.with(|log| log.released_without_render += 1),
        }
        Ok(())
    }

    fn signal_end_of_input_stream(&mut self) -> Result<()> {
        Err(Error::illegal_state("decoders take an end of stream buffer"))
    }

    fn stop(&mut self) -> Result<()> {
        self.state.expect_running("stop")?;
        self.state = CodecState::Stopped;
        self.journal.with(|log| log.stopped = true);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.state == CodecState::Released {
            return Err(Error::illegal_state("decoder already released"));
        }
        self.state = CodecState::Released;
        self.outputs.clear();
        self.journal.with(|log| log.released = true);
        Ok(())
    }
}
