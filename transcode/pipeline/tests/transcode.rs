use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use transcode_loopback::{FormatAnnouncement, LoopbackBackend, MemorySource, SinkEvent, frame_pts};
use transcode_pipeline::{
    ContainerFormat, EncoderSettings, FrameObserver, PipelineState, Rational, RuntimeSchedule,
    SinkConfig, TranscodeConfig, TranscodeError, TranscodeSummary, Transcoder,
};
use transcode_types::{BufferFlags, Pts};

fn source(frames: usize, fps: i32) -> MemorySource {
    MemorySource::synthetic(frames, Rational::new(fps, 1), 32, 32, 10)
}

fn config() -> TranscodeConfig {
    TranscodeConfig::new()
        .with_poll_timeout(Duration::ZERO)
        .with_output(SinkConfig::mp4("out.mp4"))
}

fn transcoder(config: TranscodeConfig, source: MemorySource, backend: &LoopbackBackend) -> Transcoder {
    Transcoder::new(config, Box::new(source), Box::new(backend.clone()))
        .with_sinks(Box::new(backend.clone()))
}

fn run(
    config: TranscodeConfig,
    source: MemorySource,
    backend: &LoopbackBackend,
) -> Result<TranscodeSummary, TranscodeError> {
    transcoder(config, source, backend).run()
}

fn muxed_pts(backend: &LoopbackBackend) -> Vec<i64> {
    backend
        .sink()
        .samples()
        .iter()
        .map(|sample| sample.info.pts.as_micros())
        .collect()
}

fn assert_non_decreasing(pts: &[i64]) {
    for pair in pts.windows(2) {
        assert!(pair[0] <= pair[1], "pts went backwards: {pts:?}");
    }
}

#[test]
fn matching_rates_keep_every_frame() {
    let backend = LoopbackBackend::new();
    let summary = run(config(), source(30, 30), &backend).unwrap();

    assert_eq!(summary.samples_queued, 30);
    assert_eq!(summary.frames_rendered, 30);
    assert_eq!(summary.frames_skipped, 0);
    assert_eq!(summary.frames_encoded, 30);
    assert_eq!(summary.samples_muxed, 30);
    assert_eq!(summary.loops_completed, 1);
    assert_eq!(summary.decoder, "loopback.avc.decoder");
    assert_eq!(summary.encoder.as_deref(), Some("loopback.avc.encoder"));

    let expected: Vec<i64> = (0..30).map(|n| frame_pts(n, 30.into()).as_micros()).collect();
    assert_eq!(muxed_pts(&backend), expected);
    assert!(backend.sink().samples()[0].info.is_key_frame());
}

#[test]
fn halving_the_rate_keeps_every_other_frame() {
    let backend = LoopbackBackend::new();
    let config = config().with_encoder(EncoderSettings::default().with_frame_rate(30));
    let summary = run(config, source(60, 60), &backend).unwrap();

    assert_eq!(summary.frames_rendered, 30);
    assert_eq!(summary.frames_skipped, 30);
    assert_eq!(summary.samples_muxed, 30);
    let pts = muxed_pts(&backend);
    assert_eq!(pts[0], frame_pts(1, 60.into()).as_micros());
    assert_eq!(pts[29], frame_pts(59, 60.into()).as_micros());
}

#[test]
fn reference_rate_override_changes_selection() {
    // 30 fps source treated as 60 fps input, encoded at 30
    let backend = LoopbackBackend::new();
    let config = config().with_reference_frame_rate(60);
    let summary = run(config, source(30, 30), &backend).unwrap();
    assert_eq!(summary.frames_rendered, 15);
}

#[test]
fn looping_twice_doubles_output_and_signals_once() {
    let backend = LoopbackBackend::new();
    let summary = run(config().with_loop_count(2), source(10, 30), &backend).unwrap();

    assert_eq!(summary.samples_queued, 20);
    assert_eq!(summary.samples_muxed, 20);
    assert_eq!(summary.loops_completed, 2);
    assert_eq!(backend.encoder_journal().snapshot().end_of_input_signals, 1);
    assert_eq!(backend.decoder_journal().snapshot().end_of_stream_queued, 1);

    let pts = muxed_pts(&backend);
    assert_non_decreasing(&pts);
    let end_of_first_loop = frame_pts(9, 30.into()).as_micros();
    assert!(pts[19] > end_of_first_loop);
}

#[test]
fn loop_count_zero_is_a_single_pass() {
    let once = LoopbackBackend::new();
    let zero = LoopbackBackend::new();
    let a = run(config().with_loop_count(1), source(12, 30), &once).unwrap();
    let b = run(config().with_loop_count(0), source(12, 30), &zero).unwrap();
    assert_eq!(a, b);
    assert_eq!(b.samples_muxed, 12);
}

#[test]
fn decoder_latency_keeps_timestamps_monotonic_across_loops() {
    let backend = LoopbackBackend::new().with_decoder_latency(3);
    let summary = run(config().with_loop_count(3), source(10, 30), &backend).unwrap();

    assert_eq!(summary.samples_muxed, 30);
    assert_eq!(summary.loops_completed, 3);
    assert_non_decreasing(&muxed_pts(&backend));
}

#[test]
fn uneven_keep_pattern_stays_monotonic_across_loops() {
    // 10 frames at 30 fps encoded at 20 fps keep a different pattern every loop
    let backend = LoopbackBackend::new();
    let config = config()
        .with_loop_count(3)
        .with_encoder(EncoderSettings::default().with_frame_rate(20));
    let summary = run(config, source(10, 30), &backend).unwrap();

    assert_eq!(summary.frames_rendered, 20);
    let pts = muxed_pts(&backend);
    assert_non_decreasing(&pts);
    let span = frame_pts(9, 30.into()).as_micros();
    assert!(pts.iter().all(|&p| p <= span * 3));
}

#[test]
fn any_keep_ratio_stays_monotonic_across_loops() {
    // encoder rates giving keep intervals of 1.5, 2.5, 3 and 7 on a 30 fps source
    let rates = [(20, 1), (12, 1), (10, 1), (30, 7)];
    for (num, den) in rates {
        for frames in [2, 4, 7, 10, 25] {
            for loops in 2..=5 {
                let backend = LoopbackBackend::new().with_decoder_latency(1);
                let config = config()
                    .with_loop_count(loops)
                    .with_encoder(EncoderSettings::default().with_frame_rate((num, den)));
                let summary = run(config, source(frames, 30), &backend).unwrap();

                assert_eq!(summary.samples_muxed, summary.frames_rendered);
                let pts = muxed_pts(&backend);
                for pair in pts.windows(2) {
                    assert!(
                        pair[0] <= pair[1],
                        "rate {num}/{den}, {frames} frames, {loops} loops: {pts:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn repeated_runs_produce_identical_summaries() {
    let first = LoopbackBackend::new();
    let second = LoopbackBackend::new();
    let config = config()
        .with_loop_count(2)
        .with_encoder(EncoderSettings::default().with_frame_rate(20));
    let a = run(config.clone(), source(25, 30), &first).unwrap();
    let b = run(config, source(25, 30), &second).unwrap();
    assert_eq!(a, b);
    assert_eq!(muxed_pts(&first), muxed_pts(&second));
}

#[test]
fn decode_only_renders_and_muxes_nothing() {
    let backend = LoopbackBackend::new();
    let config = TranscodeConfig::decode_only().with_poll_timeout(Duration::ZERO);
    let summary = run(config, source(20, 30), &backend).unwrap();

    assert_eq!(summary.samples_queued, 20);
    assert_eq!(summary.frames_rendered, 0);
    assert_eq!(summary.frames_encoded, 0);
    assert!(summary.encoder.is_none());

    let decoder = backend.decoder_journal().snapshot();
    assert_eq!(decoder.rendered, 0);
    assert!(decoder.released);
    assert_eq!(backend.created_codecs(), vec!["loopback.avc.decoder".to_string()]);
    assert!(backend.sink().events().is_empty());
}

#[test]
fn muxer_starts_before_any_sample() {
    for announcement in [FormatAnnouncement::CodecConfig, FormatAnnouncement::FormatChanged] {
        let backend = LoopbackBackend::new().with_announcement(announcement);
        run(config(), source(5, 30), &backend).unwrap();

        let events = backend.sink().events();
        assert!(matches!(
            &events[0],
            SinkEvent::Opened { container: ContainerFormat::Mp4, .. }
        ));
        assert!(matches!(events[1], SinkEvent::TrackAdded(_)));
        assert_eq!(events[2], SinkEvent::Started);
        assert_eq!(events.last(), Some(&SinkEvent::Stopped));
        let samples = events
            .iter()
            .filter(|event| matches!(event, SinkEvent::Sample(_)))
            .count();
        assert_eq!(samples, 5);
    }
}

#[test]
fn codecs_are_released_after_a_run() {
    let backend = LoopbackBackend::new();
    let mut transcoder = transcoder(config(), source(5, 30), &backend);
    assert_eq!(transcoder.state(), PipelineState::Init);
    transcoder.run().unwrap();
    assert_eq!(transcoder.state(), PipelineState::Stopped);

    let decoder = backend.decoder_journal().snapshot();
    let encoder = backend.encoder_journal().snapshot();
    assert!(decoder.stopped && decoder.released);
    assert!(encoder.stopped && encoder.released);
    assert!(backend.sink().is_stopped());
}

#[test]
fn transcoder_runs_only_once() {
    let backend = LoopbackBackend::new();
    let mut transcoder = transcoder(config(), source(3, 30), &backend);
    transcoder.run().unwrap();
    assert!(matches!(transcoder.run(), Err(TranscodeError::AlreadyRun)));
}

#[test]
fn encoder_configure_failure_fails_setup() {
    let backend = LoopbackBackend::new().failing_encoder_configure();
    let mut transcoder = transcoder(config(), source(10, 30), &backend);
    let err = transcoder.run().unwrap_err();

    assert!(matches!(err, TranscodeError::Configure { .. }));
    assert!(err.is_setup_failure());
    assert!(err.to_string().starts_with("failed to configure loopback.avc.encoder"));
    assert_eq!(transcoder.state(), PipelineState::Failed);

    // the output is only opened once the encoder runs
    assert!(backend.sink().opened().is_none());
    assert!(backend.sink().events().is_empty());
    assert!(backend.decoder_journal().snapshot().samples.is_empty());
    assert!(backend.decoder_journal().snapshot().released);
    assert!(backend.encoder_journal().snapshot().released);
}

#[test]
fn encoder_start_failure_fails_setup() {
    let backend = LoopbackBackend::new().failing_encoder_start();
    let err = run(config(), source(10, 30), &backend).unwrap_err();
    assert!(matches!(err, TranscodeError::StartEncoder(_)));
    assert!(err.to_string().starts_with("start encoding failed"));
    assert!(backend.decoder_journal().snapshot().samples.is_empty());
    assert!(backend.sink().events().is_empty());
}

#[test]
fn sink_open_failure_releases_running_codecs() {
    let backend = LoopbackBackend::new().failing_sink_open();
    let mut transcoder = transcoder(config(), source(10, 30), &backend);
    let err = transcoder.run().unwrap_err();

    assert!(matches!(err, TranscodeError::OpenSink { .. }));
    assert!(err.is_setup_failure());
    assert_eq!(transcoder.state(), PipelineState::Failed);
    assert!(backend.decoder_journal().snapshot().samples.is_empty());
    let encoder = backend.encoder_journal().snapshot();
    assert!(encoder.started && encoder.stopped && encoder.released);
    assert!(backend.decoder_journal().snapshot().released);
}

#[test]
fn decoder_configure_failure_fails_setup() {
    let backend = LoopbackBackend::new().failing_decoder_configure();
    let err = run(config(), source(10, 30), &backend).unwrap_err();
    assert!(matches!(err, TranscodeError::Configure { ref codec, .. } if codec == "loopback.avc.decoder"));
    assert!(backend.encoder_journal().snapshot().released);
    assert!(backend.sink().opened().is_none());
}

#[test]
fn missing_decoder_fails_setup() {
    let backend = LoopbackBackend::new().without_decoders();
    let err = run(config(), source(10, 30), &backend).unwrap_err();
    assert!(matches!(err, TranscodeError::CreateDecoder { .. }));
    assert!(backend.created_codecs().is_empty());
}

#[test]
fn source_without_video_track_fails_setup() {
    let backend = LoopbackBackend::new();
    let err = run(config(), MemorySource::empty(), &backend).unwrap_err();
    assert!(matches!(err, TranscodeError::MissingVideoTrack));
    assert!(backend.created_codecs().is_empty());
}

#[test]
fn container_must_carry_the_encoded_codec() {
    let backend = LoopbackBackend::new();
    let config = config().with_encoder(EncoderSettings::new("video/x-vnd.on2.vp8"));
    let err = run(config, source(10, 30), &backend).unwrap_err();
    assert!(matches!(
        err,
        TranscodeError::UnsupportedContainer { container: ContainerFormat::Mp4, .. }
    ));
    assert!(backend.sink().events().is_empty());
    assert!(backend.encoder_journal().snapshot().released);
}

#[test]
fn container_defaults_to_the_codec_family() {
    let backend = LoopbackBackend::new();
    let config = config()
        .with_encoder(EncoderSettings::new("video/x-vnd.on2.vp8"))
        .with_output(SinkConfig::new("out"));
    run(config, source(4, 30), &backend).unwrap();
    let (path, container) = backend.sink().opened().unwrap();
    assert_eq!(container, ContainerFormat::WebM);
    assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("webm"));
}

#[test]
fn invalid_config_touches_nothing() {
    let backend = LoopbackBackend::new();
    let config = config().with_encoder(EncoderSettings::default().with_frame_rate(0));
    let err = run(config, source(10, 30), &backend).unwrap_err();
    assert!(matches!(err, TranscodeError::InvalidConfig(_)));
    assert!(backend.created_codecs().is_empty());
}

#[test]
fn runtime_schedule_drops_and_retunes() {
    let backend = LoopbackBackend::new();
    let encoder = RuntimeSchedule::new()
        .with_drop(2)
        .with_video_bitrate(4, 400_000);
    let config = config().with_runtime(RuntimeSchedule::new(), encoder);
    let summary = run(config, source(10, 30), &backend).unwrap();

    assert_eq!(summary.frames_rendered, 9);
    assert_eq!(summary.frames_skipped, 1);
    assert!(!muxed_pts(&backend).contains(&frame_pts(2, 30.into()).as_micros()));
    assert_eq!(backend.encoder_journal().snapshot().bitrate, Some(400_000));
}

#[test]
fn qualcomm_vpx_encoders_get_periodic_sync_requests() {
    let settings = EncoderSettings::new("video/x-vnd.on2.vp8").with_keyframe_interval(1);
    let output = SinkConfig::webm("out.webm");

    let quirky = LoopbackBackend::new().with_encoder_vendor("qcom");
    run(
        config().with_encoder(settings.clone()).with_output(output.clone()),
        source(90, 30),
        &quirky,
    )
    .unwrap();
    assert_eq!(quirky.encoder_journal().snapshot().sync_requests, 2);

    let plain = LoopbackBackend::new();
    run(
        config().with_encoder(settings).with_output(output),
        source(90, 30),
        &plain,
    )
    .unwrap();
    assert_eq!(plain.encoder_journal().snapshot().sync_requests, 0);
}

#[test]
fn runs_from_json_config() {
    let config = TranscodeConfig::from_json_str(
        r#"{
            "description": "half rate, looped",
            "encoder": { "frame-rate": "15", "bitrate": 800000 },
            "loop-count": 2,
            "output": { "path": "clip.mp4" },
            "poll-timeout-us": 0
        }"#,
    )
    .unwrap();
    let backend = LoopbackBackend::new();
    let summary = run(config, source(30, 30), &backend).unwrap();
    assert_eq!(summary.frames_rendered, 30);
    assert_eq!(summary.loops_completed, 2);
    assert_non_decreasing(&muxed_pts(&backend));
}

#[derive(Clone, Default)]
struct Counts(Arc<Mutex<(u64, u64, u64)>>);

impl FrameObserver for Counts {
    fn decode_started(&mut self, _pts: Pts, _size: usize, _flags: BufferFlags) {
        self.0.lock().0 += 1;
    }

    fn encode_started(&mut self, _pts: Pts) {
        self.0.lock().1 += 1;
    }

    fn encode_finished(&mut self, _pts: Pts, _size: usize, _key_frame: bool) {
        self.0.lock().2 += 1;
    }
}

#[test]
fn observer_sees_every_stage() {
    let backend = LoopbackBackend::new();
    let counts = Counts::default();
    let config = config().with_encoder(EncoderSettings::default().with_frame_rate(15));
    let summary = transcoder(config, source(20, 30), &backend)
        .with_observer(Box::new(counts.clone()))
        .run()
        .unwrap();

    let (queued, rendered, encoded) = *counts.0.lock();
    assert_eq!(queued, summary.samples_queued);
    assert_eq!(rendered, summary.frames_rendered);
    // the codec config buffer is reported alongside the encoded frames
    assert_eq!(encoded, summary.frames_encoded + 1);
    assert_eq!(rendered, 10);
}
