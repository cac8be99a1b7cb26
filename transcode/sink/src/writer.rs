use tracing::{debug, error, info};

use transcode_types::{BufferInfo, Error, MediaFormat, MuxSink, Result, TrackId};

/**
    Ordering guard around a [`MuxSink`].

    The sink only ever sees, in order: one `add_track`, `start`, samples,
    and a single `stop`. Samples offered before the track format is known
    are refused. A disabled writer (no output file requested) accepts the
    same calls and discards the samples.
*/
pub struct MuxWriter {
    sink: Option<Box<dyn MuxSink>>,
    track: Option<TrackId>,
    format_known: bool,
    stopped: bool,
    samples_written: u64,
}

impl MuxWriter {
    pub fn new(sink: Box<dyn MuxSink>) -> Self {
        Self {
            sink: Some(sink),
            track: None,
            format_known: false,
            stopped: false,
            samples_written: 0,
        }
    }

    /**
        Writer that discards everything.
    */
    pub fn disabled() -> Self {
        Self {
            sink: None,
            track: None,
            format_known: false,
            stopped: false,
            samples_written: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// The track format has been registered.
    pub fn is_started(&self) -> bool {
        self.format_known
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /**
        Register the encoder's output format and start the sink.

        Returns false, without touching the sink, if a format was already
        registered.
    */
    pub fn register_format(&mut self, format: &MediaFormat) -> Result<bool> {
        if self.format_known {
            debug!(mime = %format.mime, "ignoring repeated output format");
            return Ok(false);
        }
        if let Some(sink) = self.sink.as_mut() {
            let track = sink.add_track(format)?;
            sink.start()?;
            self.track = Some(track);
            debug!(
                mime = %format.mime,
                width = format.width,
                height = format.height,
                "muxer started"
            );
        }
        self.format_known = true;
        Ok(true)
    }

    /**
        Append one encoded sample.
    */
    pub fn write_sample(&mut self, data: &[u8], info: &BufferInfo) -> Result<()> {
        if !self.format_known {
            return Err(Error::illegal_state(
                "sample written before the output format was known",
            ));
        }
        if self.stopped {
            return Err(Error::illegal_state("sample written after the muxer stopped"));
        }
        let (Some(sink), Some(track)) = (self.sink.as_mut(), self.track) else {
            return Ok(());
        };
        sink.write_sample(track, data, info)?;
        self.samples_written += 1;
        Ok(())
    }

    /**
        Stop the sink. Failures are logged; calling this twice is a no-op.
    */
    pub fn finish(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if self.track.is_none() {
            debug!("muxer never started, nothing to finalize");
            return;
        }
        match sink.stop() {
            Ok(()) => info!(samples = self.samples_written, "muxer stopped"),
            Err(e) => error!("failed to stop muxer: {e}"),
        }
    }
}
