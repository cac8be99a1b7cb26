/*!
    Loopback codec and sink provider.
*/

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use transcode_sink::{ContainerFormat, SinkProvider};
use transcode_types::{Codec, CodecId, CodecInfo, CodecProvider, Error, MuxSink, Result};

use crate::decoder::{DecoderJournal, LoopbackDecoder};
use crate::encoder::{EncoderJournal, FormatAnnouncement, LoopbackEncoder};
use crate::sink::MemorySink;

/**
    Creates loopback codecs and hands out a shared [`MemorySink`].

    Every codec created shares the backend's journals, so a test can hand the
    backend to the pipeline and inspect what happened afterwards.
*/
#[derive(Clone, Default)]
pub struct LoopbackBackend {
    decoder_latency: usize,
    encoder_vendor: Option<String>,
    announcement: FormatAnnouncement,
    no_decoders: bool,
    fail_decoder_configure: bool,
    fail_encoder_configure: bool,
    fail_encoder_start: bool,
    fail_sink_open: bool,
    decoder_journal: DecoderJournal,
    encoder_journal: EncoderJournal,
    sink: MemorySink,
    created: Arc<Mutex<Vec<String>>>,
}

fn short_name(codec: CodecId) -> &'static str {
    match codec {
        CodecId::H264 => "avc",
        CodecId::H265 => "hevc",
        CodecId::Vp8 => "vp8",
        CodecId::Vp9 => "vp9",
        CodecId::Av1 => "av1",
        CodecId::Mpeg4 => "mpeg4",
        _ => "mpeg2",
    }
}

fn codec_from_name(name: &str) -> Option<CodecId> {
    let name = name.to_ascii_lowercase();
    [
        ("hevc", CodecId::H265),
        ("avc", CodecId::H264),
        ("vp8", CodecId::Vp8),
        ("vp9", CodecId::Vp9),
        ("av1", CodecId::Av1),
        ("mpeg4", CodecId::Mpeg4),
        ("mpeg2", CodecId::Mpeg2Video),
    ]
    .into_iter()
    .find(|(needle, _)| name.contains(needle))
    .map(|(_, codec)| codec)
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decoder_latency(mut self, frames: usize) -> Self {
        self.decoder_latency = frames;
        self
    }

    /**
        Mark created encoders as vendor provided hardware codecs.
    */
    pub fn with_encoder_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.encoder_vendor = Some(vendor.into());
        self
    }

    pub fn with_announcement(mut self, announcement: FormatAnnouncement) -> Self {
        self.announcement = announcement;
        self
    }

    pub fn with_sink(mut self, sink: MemorySink) -> Self {
        self.sink = sink;
        self
    }

    /// Fail every decoder creation.
    pub fn without_decoders(mut self) -> Self {
        self.no_decoders = true;
        self
    }

    pub fn failing_decoder_configure(mut self) -> Self {
        self.fail_decoder_configure = true;
        self
    }

    pub fn failing_encoder_configure(mut self) -> Self {
        self.fail_encoder_configure = true;
        self
    }

    pub fn failing_encoder_start(mut self) -> Self {
        self.fail_encoder_start = true;
        self
    }

    /// Refuse to open output files.
    pub fn failing_sink_open(mut self) -> Self {
        self.fail_sink_open = true;
        self
    }

    pub fn decoder_journal(&self) -> DecoderJournal {
        self.decoder_journal.clone()
    }

    pub fn encoder_journal(&self) -> EncoderJournal {
        self.encoder_journal.clone()
    }

    pub fn sink(&self) -> MemorySink {
        self.sink.clone()
    }

    /// Names of the codecs created so far.
    pub fn created_codecs(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    fn decoder(&mut self, name: String, codec: Option<CodecId>) -> Result<Box<dyn Codec>> {
        if self.no_decoders {
            return Err(Error::unsupported_format(format!("no decoder named {name}")));
        }
        debug!(%name, "creating loopback decoder");
        self.created.lock().push(name.clone());
        let mut decoder = LoopbackDecoder::new()
            .with_info(CodecInfo::new(name, codec))
            .with_latency(self.decoder_latency)
            .with_journal(self.decoder_journal.clone());
        if self.fail_decoder_configure {
            decoder = decoder.failing_configure();
        }
        Ok(Box::new(decoder))
    }

    fn encoder(&mut self, name: String, codec: Option<CodecId>) -> Result<Box<dyn Codec>> {
        debug!(%name, "creating loopback encoder");
        self.created.lock().push(name.clone());
        let mut info = CodecInfo::new(name, codec);
        if let Some(vendor) = &self.encoder_vendor {
            info = info.with_vendor(vendor.clone());
        }
        let mut encoder = LoopbackEncoder::new(info)
            .with_announcement(self.announcement)
            .with_journal(self.encoder_journal.clone());
        if self.fail_encoder_configure {
            encoder = encoder.failing_configure();
        }
        if self.fail_encoder_start {
            encoder = encoder.failing_start();
        }
        Ok(Box::new(encoder))
    }
}

impl CodecProvider for LoopbackBackend {
    fn create_decoder_by_name(&mut self, name: &str) -> Result<Box<dyn Codec>> {
        self.decoder(name.to_string(), codec_from_name(name))
    }

    fn create_decoder_for(&mut self, mime: &str) -> Result<Box<dyn Codec>> {
        let codec = CodecId::from_mime(mime)
            .ok_or_else(|| Error::unsupported_format(format!("no decoder for {mime}")))?;
        self.decoder(format!("loopback.{}.decoder", short_name(codec)), Some(codec))
    }

    fn create_encoder_by_name(&mut self, name: &str) -> Result<Box<dyn Codec>> {
        self.encoder(name.to_string(), codec_from_name(name))
    }

    fn create_encoder_for(&mut self, mime: &str) -> Result<Box<dyn Codec>> {
        let codec = CodecId::from_mime(mime)
            .ok_or_else(|| Error::unsupported_format(format!("no encoder for {mime}")))?;
        self.encoder(format!("loopback.{}.encoder", short_name(codec)), Some(codec))
    }
}

impl SinkProvider for LoopbackBackend {
    fn open(&mut self, path: &Path, container: ContainerFormat) -> Result<Box<dyn MuxSink>> {
        if self.fail_sink_open {
            return Err(Error::configuration(format!("cannot open {}", path.display())));
        }
        self.sink.open(path, container)
    }
}
