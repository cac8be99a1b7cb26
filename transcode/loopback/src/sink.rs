/*!
    In-memory mux sink.
*/

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use transcode_sink::{ContainerFormat, SinkProvider};
use transcode_types::{BufferInfo, Error, MediaFormat, MuxSink, Result, TrackId};

/**
    One call made on a [`MemorySink`], in call order.
*/
#[derive(Clone, Debug, PartialEq)]
pub enum SinkEvent {
    Opened {
        path: PathBuf,
        container: ContainerFormat,
    },
    TrackAdded(MediaFormat),
    Started,
    Sample(BufferInfo),
    Stopped,
}

/**
    A sample written to a [`MemorySink`].
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenSample {
    pub track: TrackId,
    pub data: Vec<u8>,
    pub info: BufferInfo,
}

#[derive(Debug, Default)]
struct SinkLog {
    events: Vec<SinkEvent>,
    tracks: Vec<MediaFormat>,
    samples: Vec<WrittenSample>,
    started: bool,
    stopped: bool,
    fail_start: bool,
}

/**
    A mux sink that records everything written to it.

    Clones share the same record, so tests keep one clone while the pipeline
    owns another. Follows the usual muxer rules: tracks before start,
    samples between start and stop, stop only once.
*/
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    log: Arc<Mutex<SinkLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Make [`MuxSink::start`] fail.
    */
    pub fn failing_start(self) -> Self {
        self.log.lock().fail_start = true;
        self
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.log.lock().events.clone()
    }

    pub fn tracks(&self) -> Vec<MediaFormat> {
        self.log.lock().tracks.clone()
    }

    pub fn samples(&self) -> Vec<WrittenSample> {
        self.log.lock().samples.clone()
    }

    pub fn is_started(&self) -> bool {
        self.log.lock().started
    }

    pub fn is_stopped(&self) -> bool {
        self.log.lock().stopped
    }

    /// Path and container the sink was last opened with.
    pub fn opened(&self) -> Option<(PathBuf, ContainerFormat)> {
        self.log.lock().events.iter().rev().find_map(|event| match event {
            SinkEvent::Opened { path, container } => Some((path.clone(), *container)),
            _ => None,
        })
    }
}

impl MuxSink for MemorySink {
    fn add_track(&mut self, format: &MediaFormat) -> Result<TrackId> {
        let mut log = self.log.lock();
        if log.started {
            return Err(Error::illegal_state("tracks must be added before start"));
        }
        log.tracks.push(format.clone());
        log.events.push(SinkEvent::TrackAdded(format.clone()));
        Ok(TrackId(log.tracks.len() - 1))
    }

    fn start(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        if log.fail_start {
            return Err(Error::Io(std::io::Error::other("sink refused to start")));
        }
        if log.started || log.tracks.is_empty() {
            return Err(Error::illegal_state("cannot start muxer"));
        }
        log.started = true;
        log.events.push(SinkEvent::Started);
        Ok(())
    }

    fn write_sample(&mut self, track: TrackId, data: &[u8], info: &BufferInfo) -> Result<()> {
        let mut log = self.log.lock();
        if !log.started || log.stopped {
            return Err(Error::illegal_state("muxer is not started"));
        }
        if track.0 >= log.tracks.len() {
            return Err(Error::invalid_data(format!("unknown track {}", track.0)));
        }
        log.samples.push(WrittenSample {
            track,
            data: data.to_vec(),
            info: *info,
        });
        log.events.push(SinkEvent::Sample(*info));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        if !log.started || log.stopped {
            return Err(Error::illegal_state("muxer is not started"));
        }
        log.stopped = true;
        log.events.push(SinkEvent::Stopped);
        Ok(())
    }
}

impl SinkProvider for MemorySink {
    fn open(&mut self, path: &Path, container: ContainerFormat) -> Result<Box<dyn MuxSink>> {
        self.log.lock().events.push(SinkEvent::Opened {
            path: path.to_path_buf(),
            container,
        });
        Ok(Box::new(self.clone()))
    }
}
