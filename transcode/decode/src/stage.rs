use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use transcode_render::RenderBridge;
use transcode_types::{
    BufferInfo, Clock, Codec, CodecControl, CodecMode, CodecParameters, Dequeued, Error,
    FrameObserver, FramePacer, MediaFormat, Pts, Rational, Result, RuntimeParameters,
    RuntimeSchedule, RuntimeUpdate, StagePoll,
};

use crate::config::DecodeConfig;
use crate::continuity::{OutputLoopDetector, PtsTracker};
use crate::cursor::{CursorStep, SourceCursor};
use crate::policy::{FrameDecision, FramePolicy};

/**
    What the decode stage needs from the rest of the pipeline during a poll.
*/
pub struct Downstream<'a> {
    /// Runtime control of the encoder, None when not encoding.
    pub encoder: Option<&'a mut dyn CodecControl>,
    pub observer: &'a mut dyn FrameObserver,
}

/**
    Outcome of one successful feed.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    /// A compressed sample was queued, then the cursor stepped.
    Sample { info: BufferInfo, step: CursorStep },
    /// No sample was under the cursor; the input buffer is kept for the next feed.
    Skipped { step: CursorStep },
    /// The end-of-stream marker was queued. Nothing is fed after this.
    EndOfStream,
}

/**
    What happened to one decoded output buffer.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Rendered to the encoder surface with the given corrected pts.
    Rendered { pts: Pts },
    /// Released without rendering.
    Dropped,
    /// Zero-size buffer, released without rendering.
    Empty,
}

/**
    One decoded output buffer consumed by the decode stage.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Input frame index of this buffer.
    pub index: u64,
    pub disposition: FrameDisposition,
    /// The decoder reported end of stream on this buffer.
    pub end_of_stream: bool,
}

/**
    Counters kept by the decode stage.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub samples_queued: u64,
    pub frames_decoded: u64,
    pub frames_rendered: u64,
    pub frames_skipped: u64,
    pub last_rendered_pts: Option<Pts>,
}

/**
    Decode stage.

    Owns the source cursor and the decoder buffer queues. Each poll does at
    most one bounded wait on one queue; the driver interleaves them.
*/
pub struct DecodeStage {
    decoder: Box<dyn Codec>,
    cursor: SourceCursor,
    policy: FramePolicy,
    pts: PtsTracker,
    output_loops: OutputLoopDetector,
    bridge: Option<RenderBridge>,
    pacer: Option<FramePacer>,
    realtime: bool,
    frame_rate: Rational,
    reference_frame_rate: Rational,
    poll_timeout: Duration,
    sync_request_period: Option<u64>,
    last_sync_request: Option<u64>,
    decoder_params: Box<dyn RuntimeParameters>,
    encoder_params: Box<dyn RuntimeParameters>,
    last_decoder_update: Option<u64>,
    held_input: Option<usize>,
    eos_pending: bool,
    input_done: bool,
    output_done: bool,
    stats: DecodeStats,
}

impl DecodeStage {
    /**
        Create a decode stage around an unconfigured decoder.

        Fails if the configured frame rates cannot produce a keep interval.
    */
    pub fn new(decoder: Box<dyn Codec>, cursor: SourceCursor, config: &DecodeConfig) -> Result<Self> {
        let policy = if config.encode {
            FramePolicy::from_rates(config.reference_frame_rate, config.frame_rate)?
        } else {
            FramePolicy::disabled()
        };
        Ok(Self {
            decoder,
            cursor,
            policy,
            pts: PtsTracker::new(),
            output_loops: OutputLoopDetector::new(),
            bridge: None,
            pacer: None,
            realtime: config.realtime,
            frame_rate: config.frame_rate,
            reference_frame_rate: config.reference_frame_rate,
            poll_timeout: config.poll_timeout,
            sync_request_period: config.sync_request_period,
            last_sync_request: None,
            decoder_params: Box::new(RuntimeSchedule::default()),
            encoder_params: Box::new(RuntimeSchedule::default()),
            last_decoder_update: None,
            held_input: None,
            eos_pending: false,
            input_done: false,
            output_done: false,
            stats: DecodeStats::default(),
        })
    }

    /**
        Render kept frames through the given bridge.
    */
    pub fn with_bridge(mut self, bridge: RenderBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /**
        Use the given clock for real-time pacing. Ignored unless the stage
        was configured for real-time delivery.
    */
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        if self.realtime {
            let frame_duration = self
                .frame_rate
                .frame_duration()
                .unwrap_or(Duration::ZERO);
            self.pacer = Some(FramePacer::new(clock, frame_duration));
        }
        self
    }

    /**
        Set the runtime parameter schedules applied to the decoder (per fed
        sample) and the encoder (per decoded frame).
    */
    pub fn with_runtime_parameters(
        mut self,
        decoder: Box<dyn RuntimeParameters>,
        encoder: Box<dyn RuntimeParameters>,
    ) -> Self {
        self.decoder_params = decoder;
        self.encoder_params = encoder;
        self
    }

    /**
        Configure the decoder for the input track and start it.
    */
    pub fn configure(&mut self, format: &MediaFormat) -> Result<()> {
        let surface = self.bridge.as_ref().map(RenderBridge::surface);
        debug!(
            decoder = %self.decoder.info().name,
            mime = %format.mime,
            width = format.width,
            height = format.height,
            "configuring decoder"
        );
        self.decoder
            .configure(format, CodecMode::Decode { surface })?;
        self.decoder.start()
    }

    pub fn decoder_name(&self) -> &str {
        &self.decoder.info().name
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn cursor(&self) -> &SourceCursor {
        &self.cursor
    }

    pub fn policy(&self) -> &FramePolicy {
        &self.policy
    }

    /// The end-of-stream marker has been queued.
    pub fn is_input_done(&self) -> bool {
        self.input_done
    }

    /// The decoder reported end of stream.
    pub fn is_finished(&self) -> bool {
        self.output_done
    }

    /**
        Feed one compressed sample to the decoder.

        Queue errors are logged and the tick is skipped; the feed is retried
        on the next poll.
    */
    pub fn feed_one_sample(&mut self, downstream: &mut Downstream<'_>) -> StagePoll<FeedEvent> {
        if self.input_done {
            return StagePoll::Idle;
        }
        match self.try_feed(downstream) {
            Ok(Some(event)) => StagePoll::Progress(event),
            Ok(None) => StagePoll::Idle,
            Err(e) => {
                warn!("failed to feed decoder: {e}");
                StagePoll::Idle
            }
        }
    }

    fn try_feed(&mut self, downstream: &mut Downstream<'_>) -> Result<Option<FeedEvent>> {
        let index = match self.held_input.take() {
            Some(index) => index,
            None => match self.decoder.dequeue_input_buffer(self.poll_timeout)? {
                Some(index) => index,
                None => return Ok(None),
            },
        };

        if self.eos_pending {
            return self.queue_end_of_stream(index).map(Some);
        }

        self.request_periodic_sync(downstream);

        let sample = match self.read_sample_into(index) {
            Ok(sample) => sample,
            Err(e) => {
                self.held_input = Some(index);
                return Err(e);
            }
        };

        if let Some(info) = sample {
            self.apply_decoder_update();
            downstream
                .observer
                .decode_started(info.pts, info.size, info.flags);
            if let Err(e) = self.decoder.queue_input_buffer(index, info) {
                self.held_input = Some(index);
                return Err(e);
            }
            self.stats.samples_queued += 1;
        } else {
            self.held_input = Some(index);
        }

        let step = self.cursor.advance()?;
        match step {
            CursorStep::Advanced => {}
            CursorStep::Restarted { loop_index } => {
                info!(
                    "loop ended, starting loop {loop_index} of {}",
                    self.cursor.loop_count().max(1)
                );
            }
            CursorStep::Exhausted => {
                info!(
                    samples = self.stats.samples_queued,
                    "source exhausted, ending decoder input"
                );
                match self.held_input.take() {
                    Some(index) => return self.queue_end_of_stream(index).map(Some),
                    None => self.eos_pending = true,
                }
            }
        }

        Ok(Some(match sample {
            Some(info) => FeedEvent::Sample { info, step },
            None => FeedEvent::Skipped { step },
        }))
    }

    fn read_sample_into(&mut self, index: usize) -> Result<Option<BufferInfo>> {
        let buf = self.decoder.input_buffer(index)?;
        self.cursor.read_sample(buf)
    }

    fn queue_end_of_stream(&mut self, index: usize) -> Result<FeedEvent> {
        if let Err(e) = self
            .decoder
            .queue_input_buffer(index, BufferInfo::end_of_stream())
        {
            self.held_input = Some(index);
            self.eos_pending = true;
            return Err(e);
        }
        self.eos_pending = false;
        self.input_done = true;
        debug!("queued end of stream marker");
        Ok(FeedEvent::EndOfStream)
    }

    fn request_periodic_sync(&mut self, downstream: &mut Downstream<'_>) {
        let Some(period) = self.sync_request_period else {
            return;
        };
        let frame = self.stats.frames_decoded;
        if frame == 0 || frame % period != 0 || self.last_sync_request == Some(frame) {
            return;
        }
        self.last_sync_request = Some(frame);
        if let Some(encoder) = downstream.encoder.as_deref_mut() {
            let params = CodecParameters::new().with_sync_frame_request();
            match encoder.set_parameters(&params) {
                Ok(()) => debug!(frame, "requested periodic sync frame"),
                Err(e) => warn!(frame, "failed to request sync frame: {e}"),
            }
        }
    }

    fn apply_decoder_update(&mut self) {
        let frame = self.stats.frames_decoded;
        if self.last_decoder_update == Some(frame) {
            return;
        }
        self.last_decoder_update = Some(frame);
        let update = self.decoder_params.update_for(frame);
        if update.is_empty() {
            return;
        }
        push_codec_parameters(frame, &update, Some(&mut *self.decoder), "decoder");
        self.apply_pipeline_update(frame, &update);
    }

    fn apply_pipeline_update(&mut self, frame: u64, update: &RuntimeUpdate) {
        if update.drop {
            debug!(frame, "dropping next frame");
            self.policy.force_drop_next();
        }
        if let Some(fps) = update.framerate {
            self.set_target_frame_rate(frame, fps);
        }
    }

    fn set_target_frame_rate(&mut self, frame: u64, fps: u32) {
        let Ok(fps) = i32::try_from(fps) else {
            warn!(frame, "ignoring out of range frame rate {fps}");
            return;
        };
        if fps <= 0 {
            warn!(frame, "ignoring frame rate {fps}");
            return;
        }
        let rate = Rational::new(fps, 1);
        let keep_interval = self.reference_frame_rate.to_f64() / rate.to_f64();
        if let Err(e) = self.policy.set_keep_interval(keep_interval) {
            warn!(frame, "ignoring frame rate {fps}: {e}");
            return;
        }
        self.frame_rate = rate;
        if let (Some(pacer), Some(duration)) = (self.pacer.as_mut(), rate.frame_duration()) {
            pacer.set_frame_duration(duration);
        }
        info!(frame, keep_interval, "target frame rate changed to {rate}");
    }

    /**
        Consume one decoded output buffer.

        Kept frames are rendered through the bridge before this returns, and
        paced to real time if requested. Queue errors here are fatal.
    */
    pub fn drain_one_output(&mut self, downstream: &mut Downstream<'_>) -> StagePoll<DecodedFrame> {
        if self.output_done {
            return StagePoll::Idle;
        }
        match self.try_drain(downstream) {
            Ok(Some(frame)) => StagePoll::Progress(frame),
            Ok(None) => StagePoll::Idle,
            Err(e) => StagePoll::Fatal(e),
        }
    }

    fn try_drain(&mut self, downstream: &mut Downstream<'_>) -> Result<Option<DecodedFrame>> {
        let (index, info) = match self.decoder.dequeue_output_buffer(self.poll_timeout)? {
            Dequeued::TryAgainLater => return Ok(None),
            Dequeued::FormatChanged => {
                match self.decoder.output_format() {
                    Ok(format) => debug!(
                        width = format.width,
                        height = format.height,
                        "decoder output format changed"
                    ),
                    Err(e) => debug!("decoder output format changed, unreadable: {e}"),
                }
                return Ok(None);
            }
            Dequeued::Buffer { index, info } => (index, info),
        };

        let frame_index = self.stats.frames_decoded;
        self.stats.frames_decoded += 1;

        let disposition = if info.size > 0 {
            self.consume_frame(index, info, frame_index, downstream)?
        } else {
            self.decoder.release_output_buffer(index, false)?;
            FrameDisposition::Empty
        };

        let end_of_stream = info.is_end_of_stream();
        if end_of_stream {
            self.output_done = true;
            info!(
                decoded = self.stats.frames_decoded,
                rendered = self.stats.frames_rendered,
                skipped = self.stats.frames_skipped,
                "decoder reached end of stream"
            );
        }

        Ok(Some(DecodedFrame {
            index: frame_index,
            disposition,
            end_of_stream,
        }))
    }

    fn consume_frame(
        &mut self,
        index: usize,
        info: BufferInfo,
        frame_index: u64,
        downstream: &mut Downstream<'_>,
    ) -> Result<FrameDisposition> {
        downstream.observer.decode_finished(info.pts);
        let loop_index = self.output_loops.observe(info.pts);
        self.pts.observe(info.pts, loop_index);

        let update = self.encoder_params.update_for(frame_index);
        if !update.is_empty() {
            push_codec_parameters(
                frame_index,
                &update,
                downstream.encoder.as_deref_mut(),
                "encoder",
            );
            self.apply_pipeline_update(frame_index, &update);
        }

        let keep = self.policy.decide(frame_index) == FrameDecision::Keep;
        let Some(bridge) = self.bridge.as_mut().filter(|_| keep) else {
            self.decoder.release_output_buffer(index, false)?;
            self.stats.frames_skipped += 1;
            return Ok(FrameDisposition::Dropped);
        };

        self.decoder.release_output_buffer(index, true)?;
        bridge.await_new_image()?;
        bridge.draw_image()?;
        let pts = self.pts.correct(info.pts, loop_index);
        bridge.set_presentation_time(pts)?;
        bridge.swap_buffers()?;

        if let Some(pacer) = self.pacer.as_mut() {
            pacer.wait();
        }

        downstream.observer.encode_started(pts);
        self.stats.frames_rendered += 1;
        self.stats.last_rendered_pts = Some(pts);
        Ok(FrameDisposition::Rendered { pts })
    }

    /**
        Stop and release the decoder. Failures are logged, never returned.
    */
    pub fn release(&mut self) {
        if let Err(e) = self.decoder.stop() {
            log_teardown("stop decoder", &e);
        }
        if let Err(e) = self.decoder.release() {
            log_teardown("release decoder", &e);
        }
    }
}

fn log_teardown(what: &str, e: &Error) {
    if e.is_illegal_state() {
        warn!("failed to {what}: {e}");
    } else {
        error!("failed to {what}: {e}");
    }
}

fn push_codec_parameters<C>(frame: u64, update: &RuntimeUpdate, codec: Option<&mut C>, role: &str)
where
    C: CodecControl + ?Sized,
{
    let Some(params) = update.to_codec_parameters() else {
        return;
    };
    match codec {
        Some(codec) => match codec.set_parameters(&params) {
            Ok(()) => debug!(frame, codec = role, ?params, "applied runtime parameters"),
            Err(e) => warn!(frame, codec = role, "failed to apply runtime parameters: {e}"),
        },
        None => debug!(frame, codec = role, "no codec to apply runtime parameters to"),
    }
}
