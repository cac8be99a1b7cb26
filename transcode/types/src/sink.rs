/*!
    Container writer (muxer) collaborator.
*/

use crate::{BufferInfo, MediaFormat, Result};

/**
    Handle of a track added to a [`MuxSink`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackId(pub usize);

/**
    A container writer.

    Tracks must be added before [`MuxSink::start`]; samples may only be
    written between `start` and `stop`, in presentation order per track.
*/
pub trait MuxSink: Send {
    fn add_track(&mut self, format: &MediaFormat) -> Result<TrackId>;

    fn start(&mut self) -> Result<()>;

    fn write_sample(&mut self, track: TrackId, data: &[u8], info: &BufferInfo) -> Result<()>;

    /**
        Finalize the container and release the underlying resource.
    */
    fn stop(&mut self) -> Result<()>;
}
