/*!
    Compressed sample source (demuxer) collaborator.
*/

use crate::{BufferFlags, MediaFormat, Pts, Result};

/**
    Where a seek lands relative to the requested position.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SeekMode {
    /// Sync sample at or before the position.
    PreviousSync,
    /// Sync sample at or after the position.
    NextSync,
    /// Sync sample nearest to the position.
    #[default]
    ClosestSync,
}

/**
    A demuxer reading compressed samples from one selected track.

    The cursor starts at the first sample of the selected track. Each call to
    [`SampleSource::advance`] moves it to the next sample; once it returns
    false the cursor is at end of track until the next seek.
*/
pub trait SampleSource: Send {
    fn track_count(&self) -> usize;

    fn track_format(&self, track: usize) -> Result<MediaFormat>;

    fn select_track(&mut self, track: usize) -> Result<()>;

    /**
        Copy the sample under the cursor into `buf`.

        Returns the number of bytes written, or None at end of track.
    */
    fn read_sample_data(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Timestamp of the sample under the cursor, None at end of track.
    fn sample_time(&self) -> Option<Pts>;

    /// Size of the sample under the cursor, None at end of track.
    fn sample_size(&self) -> Option<usize>;

    fn sample_flags(&self) -> BufferFlags;

    /**
        Move to the next sample. Returns false when no sample follows.
    */
    fn advance(&mut self) -> bool;

    fn seek_to(&mut self, position: Pts, mode: SeekMode) -> Result<()>;
}
