use std::time::Duration;

use tracing::{debug, error, info, warn};

use transcode_sink::MuxWriter;
use transcode_types::{
    BufferInfo, Codec, CodecControl, CodecInfo, CodecMode, CodecParameters, Dequeued,
    FrameObserver, InputSurface, MediaFormat, Pts, Result, StagePoll,
};

/**
    Outcome of one encoder output poll.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeEvent {
    /// The container-ready format was registered and the muxer started.
    FormatReady,
    /// A codec config buffer arrived after the format was already known.
    CodecConfig,
    /// An encoded payload was handed to the muxer.
    Forwarded {
        pts: Pts,
        size: usize,
        key_frame: bool,
    },
    /// The encoder has no more output.
    EndOfStream,
}

/**
    Counters kept by the encode stage.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub frames_forwarded: u64,
    pub key_frames: u64,
    pub bytes_forwarded: u64,
    pub last_pts: Option<Pts>,
}

/**
    Encode stage.

    Owns the encoder output queue and the mux writer. Input reaches the
    encoder through its input surface, never through queued buffers.
*/
pub struct EncodeStage {
    codec: Box<dyn Codec>,
    mux: MuxWriter,
    poll_timeout: Duration,
    eos_signalled: bool,
    finished: bool,
    stats: EncodeStats,
}

impl EncodeStage {
    pub fn new(codec: Box<dyn Codec>, mux: MuxWriter, poll_timeout: Duration) -> Self {
        Self {
            codec,
            mux,
            poll_timeout,
            eos_signalled: false,
            finished: false,
            stats: EncodeStats::default(),
        }
    }

    /**
        Replace the mux writer.

        The driver starts the encoder with a disabled writer and attaches
        the real one once the encoder is running, so a failed setup never
        leaves an opened container behind.
    */
    pub fn attach_writer(&mut self, mux: MuxWriter) {
        self.mux = mux;
    }

    pub fn info(&self) -> &CodecInfo {
        self.codec.info()
    }

    pub fn stats(&self) -> EncodeStats {
        self.stats
    }

    pub fn samples_muxed(&self) -> u64 {
        self.mux.samples_written()
    }

    /// The encoder reported end of stream.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /**
        Configure the encoder for surface input and return the surface to
        render into.
    */
    pub fn configure(&mut self, format: &MediaFormat) -> Result<Box<dyn InputSurface>> {
        debug!(
            encoder = %self.codec.info().name,
            mime = %format.mime,
            width = format.width,
            height = format.height,
            bitrate = ?format.bitrate,
            "configuring encoder"
        );
        self.codec.configure(format, CodecMode::Encode)?;
        self.codec.create_input_surface()
    }

    pub fn start(&mut self) -> Result<()> {
        self.codec.start()
    }

    /**
        Consume one encoder output buffer.
    */
    pub fn drain_one_output(&mut self, observer: &mut dyn FrameObserver) -> StagePoll<EncodeEvent> {
        if self.finished {
            return StagePoll::Idle;
        }
        match self.try_drain(observer) {
            Ok(Some(event)) => StagePoll::Progress(event),
            Ok(None) => StagePoll::Idle,
            Err(e) => StagePoll::Fatal(e),
        }
    }

    fn try_drain(&mut self, observer: &mut dyn FrameObserver) -> Result<Option<EncodeEvent>> {
        let (index, info) = match self.codec.dequeue_output_buffer(self.poll_timeout)? {
            Dequeued::TryAgainLater => return Ok(None),
            Dequeued::FormatChanged => {
                return Ok(self.register_output_format()?.then_some(EncodeEvent::FormatReady));
            }
            Dequeued::Buffer { index, info } => (index, info),
        };

        if info.is_codec_config() {
            observer.encode_finished(info.pts, info.size, info.is_key_frame());
            let registered = self.register_output_format()?;
            self.codec.release_output_buffer(index, false)?;
            return Ok(Some(if registered {
                EncodeEvent::FormatReady
            } else {
                EncodeEvent::CodecConfig
            }));
        }

        if info.is_end_of_stream() {
            self.codec.release_output_buffer(index, false)?;
            self.finished = true;
            info!(
                frames = self.stats.frames_forwarded,
                "encoder reached end of stream"
            );
            return Ok(Some(EncodeEvent::EndOfStream));
        }

        self.forward(index, info, observer).map(Some)
    }

    fn register_output_format(&mut self) -> Result<bool> {
        let format = self.codec.output_format()?;
        self.mux.register_format(&format)
    }

    fn forward(
        &mut self,
        index: usize,
        info: BufferInfo,
        observer: &mut dyn FrameObserver,
    ) -> Result<EncodeEvent> {
        let key_frame = info.is_key_frame();
        observer.encode_finished(info.pts, info.size, key_frame);

        let data = self.codec.output_buffer(index)?;
        let payload = &data[..info.size.min(data.len())];
        self.mux.write_sample(payload, &info)?;
        self.codec.release_output_buffer(index, false)?;

        self.stats.frames_forwarded += 1;
        self.stats.bytes_forwarded += info.size as u64;
        self.stats.last_pts = Some(info.pts);
        if key_frame {
            self.stats.key_frames += 1;
        }
        Ok(EncodeEvent::Forwarded {
            pts: info.pts,
            size: info.size,
            key_frame,
        })
    }

    /**
        Tell the encoder no further frames will arrive.

        Only the first call reaches the encoder; later calls return false.
    */
    pub fn signal_end_of_input(&mut self) -> Result<bool> {
        if self.eos_signalled {
            return Ok(false);
        }
        self.eos_signalled = true;
        self.codec.signal_end_of_input_stream()?;
        debug!("signalled end of input to encoder");
        Ok(true)
    }

    /**
        Stop and release the encoder, then finalize the muxer. Failures are
        logged, never returned.
    */
    pub fn release(&mut self) {
        if let Err(e) = self.codec.stop() {
            log_teardown("stop encoder", &e);
        }
        if let Err(e) = self.codec.release() {
            log_teardown("release encoder", &e);
        }
        self.mux.finish();
    }
}

fn log_teardown(what: &str, e: &transcode_types::Error) {
    if e.is_illegal_state() {
        warn!("failed to {what}: {e}");
    } else {
        error!("failed to {what}: {e}");
    }
}

impl CodecControl for EncodeStage {
    fn set_parameters(&mut self, params: &CodecParameters) -> Result<()> {
        self.codec.set_parameters(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcode_loopback::{
        EncoderJournal, FormatAnnouncement, LoopbackEncoder, MemorySink, SinkEvent,
    };
    use transcode_types::{BufferFlags, CodecId, NullObserver, PixelFormat, VideoFrame};

    struct Harness {
        stage: EncodeStage,
        surface: Box<dyn InputSurface>,
        journal: EncoderJournal,
        sink: MemorySink,
    }

    fn encoder() -> LoopbackEncoder {
        LoopbackEncoder::new(CodecInfo::new("loopback.avc.encoder", Some(CodecId::H264)))
    }

    fn format() -> MediaFormat {
        let mut format = MediaFormat::video("video/avc", 8, 8)
            .with_frame_rate(30)
            .with_keyframe_interval(10);
        format.surface_input = true;
        format
    }

    fn started(encoder: LoopbackEncoder, mux: MuxWriter, sink: MemorySink) -> Harness {
        let journal = encoder.journal();
        let mut stage = EncodeStage::new(Box::new(encoder), mux, Duration::ZERO);
        let surface = stage.configure(&format()).unwrap();
        stage.start().unwrap();
        Harness {
            stage,
            surface,
            journal,
            sink,
        }
    }

    fn with_sink(encoder: LoopbackEncoder) -> Harness {
        let sink = MemorySink::new();
        started(encoder, MuxWriter::new(Box::new(sink.clone())), sink)
    }

    fn frame(pts: i64) -> VideoFrame {
        VideoFrame::filled(8, 8, PixelFormat::Yuv420p, 3, Some(Pts(pts)))
    }

    fn drain(stage: &mut EncodeStage, observer: &mut dyn FrameObserver) -> Vec<EncodeEvent> {
        let mut events = Vec::new();
        loop {
            match stage.drain_one_output(observer) {
                StagePoll::Progress(event) => events.push(event),
                StagePoll::Idle => return events,
                StagePoll::Fatal(e) => panic!("encode failed: {e}"),
            }
        }
    }

    #[derive(Default)]
    struct Finished(Vec<(Pts, bool)>);

    impl FrameObserver for Finished {
        fn encode_finished(&mut self, pts: Pts, _size: usize, key_frame: bool) {
            self.0.push((pts, key_frame));
        }
    }

    #[test]
    fn codec_config_starts_muxer_before_samples() {
        let mut h = with_sink(encoder());
        for pts in [0, 33_333, 66_666] {
            h.surface.submit(frame(pts)).unwrap();
        }
        let mut observer = Finished::default();
        let events = drain(&mut h.stage, &mut observer);

        assert_eq!(events[0], EncodeEvent::FormatReady);
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[1],
            EncodeEvent::Forwarded {
                pts: Pts(0),
                key_frame: true,
                ..
            }
        ));
        // the codec config buffer is reported ahead of the frames
        assert_eq!(
            observer.0,
            vec![
                (Pts(0), false),
                (Pts(0), true),
                (Pts(33_333), false),
                (Pts(66_666), false)
            ]
        );

        let log = h.sink.events();
        assert!(matches!(log[0], SinkEvent::TrackAdded(_)));
        assert_eq!(log[1], SinkEvent::Started);
        assert_eq!(h.sink.samples().len(), 3);
        assert!(!h.sink.tracks()[0].surface_input);
        assert_eq!(h.stage.samples_muxed(), 3);

        let stats = h.stage.stats();
        assert_eq!(stats.frames_forwarded, 3);
        assert_eq!(stats.key_frames, 1);
        assert_eq!(stats.last_pts, Some(Pts(66_666)));
    }

    #[test]
    fn format_change_also_starts_muxer() {
        let mut h = with_sink(encoder().with_announcement(FormatAnnouncement::FormatChanged));
        h.surface.submit(frame(0)).unwrap();
        let events = drain(&mut h.stage, &mut NullObserver);
        assert_eq!(events[0], EncodeEvent::FormatReady);
        assert!(h.sink.is_started());
        assert_eq!(h.sink.samples().len(), 1);
    }

    #[test]
    fn format_change_is_not_reported_as_encoded() {
        let mut h = with_sink(encoder().with_announcement(FormatAnnouncement::FormatChanged));
        h.surface.submit(frame(0)).unwrap();
        let mut observer = Finished::default();
        drain(&mut h.stage, &mut observer);
        assert_eq!(observer.0, vec![(Pts(0), true)]);
    }

    #[test]
    fn writer_attached_after_start_receives_output() {
        let sink = MemorySink::new();
        let mut h = started(encoder(), MuxWriter::disabled(), sink.clone());
        h.stage.attach_writer(MuxWriter::new(Box::new(sink.clone())));
        h.surface.submit(frame(0)).unwrap();
        let events = drain(&mut h.stage, &mut NullObserver);

        assert_eq!(events[0], EncodeEvent::FormatReady);
        assert!(sink.is_started());
        assert_eq!(h.stage.samples_muxed(), 1);
        h.stage.release();
        assert_eq!(sink.events().last(), Some(&SinkEvent::Stopped));
    }

    #[test]
    fn end_of_input_is_signalled_once() {
        let mut h = with_sink(encoder());
        h.surface.submit(frame(0)).unwrap();
        assert!(h.stage.signal_end_of_input().unwrap());
        assert!(!h.stage.signal_end_of_input().unwrap());

        let events = drain(&mut h.stage, &mut NullObserver);
        assert_eq!(events.last(), Some(&EncodeEvent::EndOfStream));
        assert!(h.stage.is_finished());
        assert!(h.stage.drain_one_output(&mut NullObserver).is_idle());
        assert_eq!(h.journal.snapshot().end_of_input_signals, 1);
        // the end of stream buffer is not muxed
        assert_eq!(h.sink.samples().len(), 1);
    }

    #[test]
    fn release_stops_codec_then_muxer() {
        let mut h = with_sink(encoder());
        h.surface.submit(frame(0)).unwrap();
        drain(&mut h.stage, &mut NullObserver);
        h.stage.release();

        let log = h.journal.snapshot();
        assert!(log.stopped);
        assert!(log.released);
        assert_eq!(h.sink.events().last(), Some(&SinkEvent::Stopped));

        // a second release only logs
        h.stage.release();
        assert_eq!(
            h.sink
                .events()
                .iter()
                .filter(|event| **event == SinkEvent::Stopped)
                .count(),
            1
        );
    }

    #[test]
    fn disabled_writer_discards_output() {
        let sink = MemorySink::new();
        let mut h = started(encoder(), MuxWriter::disabled(), sink);
        h.surface.submit(frame(0)).unwrap();
        let events = drain(&mut h.stage, &mut NullObserver);
        assert_eq!(events.len(), 2);
        assert_eq!(h.stage.stats().frames_forwarded, 1);
        assert_eq!(h.stage.samples_muxed(), 0);
        assert!(h.sink.events().is_empty());
    }

    #[test]
    fn parameters_reach_the_codec() {
        let mut h = with_sink(encoder());
        h.surface.submit(frame(0)).unwrap();
        drain(&mut h.stage, &mut NullObserver);

        h.stage
            .set_parameters(
                &CodecParameters::new()
                    .with_video_bitrate(250_000)
                    .with_sync_frame_request(),
            )
            .unwrap();
        h.surface.submit(frame(33_333)).unwrap();
        let events = drain(&mut h.stage, &mut NullObserver);
        assert!(matches!(
            events[0],
            EncodeEvent::Forwarded {
                key_frame: true,
                ..
            }
        ));
        let log = h.journal.snapshot();
        assert_eq!(log.bitrate, Some(250_000));
        assert_eq!(log.sync_requests, 1);
        let flags: Vec<BufferFlags> = h.sink.samples().iter().map(|s| s.info.flags).collect();
        assert_eq!(flags, vec![BufferFlags::KEY_FRAME, BufferFlags::KEY_FRAME]);
    }

    #[test]
    fn start_failure_tears_down_quietly() {
        let sink = MemorySink::new();
        let mut stage = EncodeStage::new(
            Box::new(encoder().failing_start()),
            MuxWriter::new(Box::new(sink.clone())),
            Duration::ZERO,
        );
        stage.configure(&format()).unwrap();
        assert!(stage.start().is_err());
        stage.release();
        assert!(sink.events().is_empty());
    }
}
