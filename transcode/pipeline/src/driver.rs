/*!
    The pipeline driver.
*/

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use transcode_decode::{
    DecodeConfig, DecodeStage, Downstream, FeedEvent, SourceCursor, select_video_track,
};
use transcode_encode::{EncodeEvent, EncodeStage, KnownQuirks, SyncRequestPolicy, sync_request_period};
use transcode_render::RenderBridge;
use transcode_sink::{ContainerFormat, MuxWriter, SinkProvider};
use transcode_types::{
    Clock, Codec, CodecControl, CodecId, CodecProvider, Error, FrameObserver, MediaFormat, NullObserver,
    SampleSource, StagePoll, WallClock,
};

use crate::{TranscodeConfig, TranscodeError, TranscodeSummary};

const PROGRESS_INTERVAL: u64 = 100;

/**
    Lifecycle of a [`Transcoder`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Created, not yet run.
    Init,
    /// Creating and configuring collaborators.
    Configuring,
    /// Polling the stages.
    Running,
    /// Releasing codecs and the muxer.
    Draining,
    /// Done, successfully or after a runtime failure.
    Stopped,
    /// Setup failed; nothing was produced.
    Failed,
}

struct Stages {
    decode: DecodeStage,
    encode: Option<EncodeStage>,
}

impl Stages {
    fn release(&mut self) {
        if let Some(encode) = self.encode.as_mut() {
            encode.release();
        }
        self.decode.release();
    }

    fn summary(&self) -> TranscodeSummary {
        let mut summary = TranscodeSummary {
            decoder: self.decode.decoder_name().to_string(),
            loops_completed: self.decode.cursor().loops_completed(),
            ..Default::default()
        };
        summary.record_decode(&self.decode.stats());
        if let Some(encode) = self.encode.as_ref() {
            summary.encoder = Some(encode.info().name.clone());
            summary.record_encode(&encode.stats(), encode.samples_muxed());
        }
        summary
    }

    /// Frames counted for progress: forwarded when encoding, decoded otherwise.
    fn progress(&self) -> u64 {
        match self.encode.as_ref() {
            Some(encode) => encode.stats().frames_forwarded,
            None => self.decode.stats().frames_decoded,
        }
    }
}

/**
    Drives one transcode run over a source, a codec provider and an
    optional sink provider.

    Setup creates and configures every collaborator, in the order the codecs
    expect: decoder and encoder creation, encoder configuration and input
    surface, decoder configuration and start, encoder start. The output
    container is checked up front but only opened once the encoder runs.
    Any failure there releases what was acquired and fails the run before
    a single sample is fed.

    The run itself is a single-threaded loop. Each tick feeds one sample,
    drains one decoded frame and drains one encoded payload, every step
    bounded by the configured poll timeout.

    ```ignore
    let mut transcoder = Transcoder::new(config, Box::new(source), Box::new(codecs))
        .with_sinks(Box::new(files));
    match transcoder.run() {
        Ok(summary) => println!("{} frames encoded", summary.frames_encoded),
        Err(e) => eprintln!("{e}"),
    }
    ```
*/
pub struct Transcoder {
    config: TranscodeConfig,
    source: Option<Box<dyn SampleSource>>,
    codecs: Box<dyn CodecProvider>,
    sinks: Option<Box<dyn SinkProvider>>,
    observer: Box<dyn FrameObserver>,
    clock: Arc<dyn Clock>,
    sync_policy: Box<dyn SyncRequestPolicy>,
    state: PipelineState,
}

impl Transcoder {
    pub fn new(
        config: TranscodeConfig,
        source: Box<dyn SampleSource>,
        codecs: Box<dyn CodecProvider>,
    ) -> Self {
        Self {
            config,
            source: Some(source),
            codecs,
            sinks: None,
            observer: Box::new(NullObserver),
            clock: Arc::new(WallClock::new()),
            sync_policy: Box::new(KnownQuirks),
            state: PipelineState::Init,
        }
    }

    /**
        Open output files through `sinks`. Required when the config names an
        output.
    */
    pub fn with_sinks(mut self, sinks: Box<dyn SinkProvider>) -> Self {
        self.sinks = Some(sinks);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn FrameObserver>) -> Self {
        self.observer = observer;
        self
    }

    /**
        Clock used for real-time pacing.
    */
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /**
        Predicate deciding whether the encoder needs sync frames requested
        explicitly. Defaults to [`KnownQuirks`].
    */
    pub fn with_sync_policy(mut self, policy: Box<dyn SyncRequestPolicy>) -> Self {
        self.sync_policy = policy;
        self
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /**
        Run the transcode to completion.

        A transcoder runs once; later calls return [`TranscodeError::AlreadyRun`].
    */
    pub fn run(&mut self) -> Result<TranscodeSummary, TranscodeError> {
        let Some(source) = self.source.take() else {
            return Err(TranscodeError::AlreadyRun);
        };
        if !self.config.description.is_empty() {
            info!("transcode: {}", self.config.description);
        }

        let mut stages = match self.setup(source) {
            Ok(stages) => stages,
            Err(e) => {
                error!("transcode setup failed: {e}");
                self.transition(PipelineState::Failed);
                return Err(e);
            }
        };

        self.transition(PipelineState::Running);
        let outcome = self.pump(&mut stages);
        if let Err(e) = &outcome {
            error!("{e}");
        }

        self.transition(PipelineState::Draining);
        stages.release();
        self.transition(PipelineState::Stopped);

        let summary = stages.summary();
        info!(
            samples = summary.samples_queued,
            rendered = summary.frames_rendered,
            skipped = summary.frames_skipped,
            encoded = summary.frames_encoded,
            loops = summary.loops_completed,
            "done transcoding"
        );
        outcome.map(|()| summary)
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }

    fn setup(&mut self, mut source: Box<dyn SampleSource>) -> Result<Stages, TranscodeError> {
        self.config.validate()?;
        self.transition(PipelineState::Configuring);

        let (track, input) = select_video_track(source.as_mut()).map_err(|e| match e {
            Error::UnsupportedFormat { .. } => TranscodeError::MissingVideoTrack,
            e => TranscodeError::MissingInputFormat(e),
        })?;
        info!(
            track,
            mime = %input.mime,
            width = input.width,
            height = input.height,
            "selected video track"
        );

        let mut decoder = self.create_decoder(&input)?;
        let encoder = if self.config.encode {
            match self.create_encoder() {
                Ok(encoder) => Some(encoder),
                Err(e) => {
                    discard(decoder.as_mut(), "decoder");
                    return Err(e);
                }
            }
        } else {
            None
        };

        let (mut encode, output) = match encoder {
            Some(mut encoder) => match self.output_target(encoder.info().codec, &encoder.info().name) {
                Ok(output) => {
                    let stage = EncodeStage::new(encoder, MuxWriter::disabled(), self.config.poll_timeout());
                    (Some(stage), output)
                }
                Err(e) => {
                    discard(encoder.as_mut(), "encoder");
                    discard(decoder.as_mut(), "decoder");
                    return Err(e);
                }
            },
            None => (None, None),
        };

        let bridge = match encode.as_mut() {
            Some(stage) => match self.configure_encoder(stage, &input) {
                Ok(bridge) => Some(bridge),
                Err(e) => {
                    stage.release();
                    discard(decoder.as_mut(), "decoder");
                    return Err(e);
                }
            },
            None => None,
        };

        let decode = match self.decode_stage(decoder, source, &input, encode.as_ref()) {
            Ok(decode) => decode,
            Err(e) => {
                if let Some(stage) = encode.as_mut() {
                    stage.release();
                }
                return Err(e);
            }
        };
        let decode = match bridge {
            Some(bridge) => decode.with_bridge(bridge),
            None => decode,
        };

        let mut stages = Stages { decode, encode };
        if let Err(e) = self.start(&mut stages, &input) {
            stages.release();
            return Err(e);
        }
        if let Some((path, container)) = output {
            let writer = match self.open_writer(path, container) {
                Ok(writer) => writer,
                Err(e) => {
                    stages.release();
                    return Err(e);
                }
            };
            if let Some(encode) = stages.encode.as_mut() {
                encode.attach_writer(writer);
            }
        }
        Ok(stages)
    }

    fn create_decoder(&mut self, input: &MediaFormat) -> Result<Box<dyn Codec>, TranscodeError> {
        let result = match self.config.decoder.as_deref() {
            Some(name) => {
                debug!(name, "creating decoder by name");
                self.codecs.create_decoder_by_name(name)
            }
            None => {
                debug!(mime = %input.mime, "creating decoder by type");
                self.codecs.create_decoder_for(&input.mime)
            }
        };
        result.map_err(|source| TranscodeError::CreateDecoder {
            name: self
                .config
                .decoder
                .clone()
                .unwrap_or_else(|| input.mime.clone()),
            source,
        })
    }

    fn create_encoder(&mut self) -> Result<Box<dyn Codec>, TranscodeError> {
        let settings = &self.config.encoder;
        let result = match settings.codec.as_deref() {
            Some(name) => {
                debug!(name, "creating encoder by name");
                self.codecs.create_encoder_by_name(name)
            }
            None => {
                debug!(mime = %settings.mime, "creating encoder by type");
                self.codecs.create_encoder_for(&settings.mime)
            }
        };
        result.map_err(|source| TranscodeError::CreateEncoder {
            name: settings
                .codec
                .clone()
                .unwrap_or_else(|| settings.mime.clone()),
            source,
        })
    }

    /**
        Resolve where the encoded stream goes, if anywhere, and check that
        the container can carry it. Nothing is opened here.
    */
    fn output_target(
        &self,
        codec: Option<CodecId>,
        encoder_name: &str,
    ) -> Result<Option<(PathBuf, ContainerFormat)>, TranscodeError> {
        let Some(output) = self.config.output.as_ref() else {
            return Ok(None);
        };
        let codec = codec.or_else(|| CodecId::from_mime(&self.config.encoder.mime));
        let container = output.container_for(codec);
        if !container.supports(codec) {
            return Err(TranscodeError::UnsupportedContainer {
                container,
                mime: codec
                    .map(|codec| codec.mime().to_string())
                    .unwrap_or_else(|| encoder_name.to_string()),
            });
        }
        let path = output.resolved_path(container);
        if self.sinks.is_none() {
            return Err(TranscodeError::OpenSink {
                path,
                source: Error::configuration("no sink provider"),
            });
        }
        Ok(Some((path, container)))
    }

    /**
        Open the output once the encoder is running.
    */
    fn open_writer(
        &mut self,
        path: PathBuf,
        container: ContainerFormat,
    ) -> Result<MuxWriter, TranscodeError> {
        let Some(sinks) = self.sinks.as_mut() else {
            return Err(TranscodeError::OpenSink {
                path,
                source: Error::configuration("no sink provider"),
            });
        };
        info!(path = %path.display(), ?container, "opening output");
        let sink = sinks
            .open(&path, container)
            .map_err(|source| TranscodeError::OpenSink { path, source })?;
        Ok(MuxWriter::new(sink))
    }

    fn configure_encoder(
        &self,
        stage: &mut EncodeStage,
        input: &MediaFormat,
    ) -> Result<RenderBridge, TranscodeError> {
        let format = self.config.encoder.encoder_config(input).media_format(input);
        let surface = stage
            .configure(&format)
            .map_err(|source| TranscodeError::Configure {
                codec: stage.info().name.clone(),
                source,
            })?;
        Ok(RenderBridge::new(surface, format.width, format.height))
    }

    fn decode_stage(
        &self,
        decoder: Box<dyn Codec>,
        source: Box<dyn SampleSource>,
        input: &MediaFormat,
        encode: Option<&EncodeStage>,
    ) -> Result<DecodeStage, TranscodeError> {
        let settings = &self.config.encoder;
        let reference = self.config.reference_frame_rate_for(input);
        let sync_period = encode
            .filter(|stage| self.sync_policy.needs_periodic_sync_request(stage.info()))
            .and_then(|_| sync_request_period(settings.frame_rate, settings.keyframe_interval));
        if let Some(period) = sync_period {
            info!(period, "requesting sync frames explicitly");
        }

        let config = DecodeConfig {
            poll_timeout: self.config.poll_timeout(),
            loop_count: self.config.loop_count,
            reference_frame_rate: reference,
            frame_rate: settings.frame_rate,
            encode: self.config.encode,
            realtime: self.config.realtime,
            sync_request_period: sync_period,
        };
        let cursor = SourceCursor::new(source, self.config.loop_count);
        let stage = DecodeStage::new(decoder, cursor, &config)
            .map_err(|e| TranscodeError::InvalidConfig(e.to_string()))?;
        info!(
            reference = %reference,
            target = %settings.frame_rate,
            keep_interval = stage.policy().keep_interval(),
            "frame timing"
        );
        Ok(stage
            .with_clock(self.clock.clone())
            .with_runtime_parameters(
                Box::new(self.config.runtime.decoder.clone()),
                Box::new(self.config.runtime.encoder.clone()),
            ))
    }

    fn start(&self, stages: &mut Stages, input: &MediaFormat) -> Result<(), TranscodeError> {
        let mut format = input.clone();
        format.params.extend(self.config.decoder_params.clone());
        stages
            .decode
            .configure(&format)
            .map_err(|source| TranscodeError::Configure {
                codec: stages.decode.decoder_name().to_string(),
                source,
            })?;
        if let Some(encode) = stages.encode.as_mut() {
            encode.start().map_err(TranscodeError::StartEncoder)?;
        }
        Ok(())
    }

    fn pump(&mut self, stages: &mut Stages) -> Result<(), TranscodeError> {
        let mut last_progress = None;
        loop {
            let progress = stages.progress();
            if progress % PROGRESS_INTERVAL == 0 && last_progress != Some(progress) {
                last_progress = Some(progress);
                debug!(
                    frames = progress,
                    decoded = stages.decode.stats().frames_decoded,
                    current_loop = stages.decode.cursor().current_loop(),
                    loops = self.config.loop_count,
                    "progress"
                );
            }

            let Stages { decode, encode } = &mut *stages;
            let observer: &mut dyn FrameObserver = self.observer.as_mut();

            let mut downstream = Downstream {
                encoder: encode
                    .as_mut()
                    .map(|stage| stage as &mut dyn CodecControl),
                observer: &mut *observer,
            };
            if let StagePoll::Progress(FeedEvent::EndOfStream) = decode.feed_one_sample(&mut downstream) {
                debug!("decoder input complete");
            }
            let decoder_done = match decode.drain_one_output(&mut downstream) {
                StagePoll::Fatal(e) => return Err(TranscodeError::Runtime(e)),
                StagePoll::Progress(frame) => frame.end_of_stream,
                StagePoll::Idle => false,
            };

            let Some(encode) = encode.as_mut() else {
                if decode.is_finished() {
                    return Ok(());
                }
                continue;
            };

            if decoder_done {
                encode
                    .signal_end_of_input()
                    .map_err(TranscodeError::Runtime)?;
            }
            match encode.drain_one_output(observer) {
                StagePoll::Fatal(e) => return Err(TranscodeError::Runtime(e)),
                StagePoll::Progress(EncodeEvent::EndOfStream) => return Ok(()),
                StagePoll::Progress(_) | StagePoll::Idle => {}
            }
        }
    }
}

/**
    Release a codec that never made it into a stage.
*/
fn discard(codec: &mut dyn Codec, role: &str) {
    if let Err(e) = codec.release() {
        warn!("failed to release {role}: {e}");
    }
}
