/*!
    Source cursor and loop counter.
*/

use transcode_types::{BufferInfo, Error, MediaFormat, Pts, Result, SampleSource, SeekMode};

/**
    Pick the video track of a source.

    The last track whose mime type mentions `video` wins.
*/
pub fn select_video_track(source: &mut dyn SampleSource) -> Result<(usize, MediaFormat)> {
    let mut selected = None;
    for track in 0..source.track_count() {
        let format = source.track_format(track)?;
        if format.is_video() {
            selected = Some((track, format));
        }
    }
    let (track, format) =
        selected.ok_or_else(|| Error::unsupported_format("source has no video track"))?;
    source.select_track(track)?;
    Ok((track, format))
}

/**
    What happened to the cursor after stepping past a sample.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorStep {
    /// Moved to the next sample of the current loop.
    Advanced,
    /// Wrapped to the start of the source for another loop.
    Restarted { loop_index: u32 },
    /// The requested number of loops has been read.
    Exhausted,
}

/**
    Position within the compressed input track, plus the loop counter.

    The counter starts at 1 and is incremented every time the cursor runs off
    the end of the track. Once it exceeds the requested loop count the cursor
    is exhausted, so a loop count of 0 or 1 both read the source once.
*/
pub struct SourceCursor {
    source: Box<dyn SampleSource>,
    loop_count: u32,
    current_loop: u32,
    exhausted: bool,
}

impl SourceCursor {
    pub fn new(source: Box<dyn SampleSource>, loop_count: u32) -> Self {
        Self {
            source,
            loop_count,
            current_loop: 1,
            exhausted: false,
        }
    }

    pub fn current_loop(&self) -> u32 {
        self.current_loop
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /**
        Number of full passes over the source read so far.
    */
    pub fn loops_completed(&self) -> u32 {
        self.current_loop - 1
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /**
        Copy the sample under the cursor into `buf`.

        Returns the descriptor to queue it with, or None when the cursor sits
        at the end of the track (or is exhausted).
    */
    pub fn read_sample(&mut self, buf: &mut [u8]) -> Result<Option<BufferInfo>> {
        if self.exhausted {
            return Ok(None);
        }
        if let Some(size) = self.source.sample_size() {
            if size > buf.len() {
                return Err(Error::invalid_data(format!(
                    "sample of {size} bytes does not fit input buffer of {}",
                    buf.len()
                )));
            }
        }
        let Some(size) = self.source.read_sample_data(buf)? else {
            return Ok(None);
        };
        if size == 0 {
            return Ok(None);
        }
        let pts = self.source.sample_time().unwrap_or(Pts::ZERO);
        Ok(Some(BufferInfo::new(size, pts, self.source.sample_flags())))
    }

    /**
        Step past the current sample, wrapping to the start at end of track.
    */
    pub fn advance(&mut self) -> Result<CursorStep> {
        if self.exhausted {
            return Ok(CursorStep::Exhausted);
        }
        if self.source.advance() {
            return Ok(CursorStep::Advanced);
        }
        self.source.seek_to(Pts::ZERO, SeekMode::ClosestSync)?;
        self.current_loop += 1;
        if self.current_loop > self.loop_count {
            self.exhausted = true;
            Ok(CursorStep::Exhausted)
        } else {
            Ok(CursorStep::Restarted {
                loop_index: self.current_loop,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcode_loopback::MemorySource;

    fn source(frames: usize) -> Box<dyn SampleSource> {
        Box::new(MemorySource::synthetic(frames, 30.into(), 64, 48, 10))
    }

    fn passes(frames: usize, loop_count: u32) -> usize {
        let mut cursor = SourceCursor::new(source(frames), loop_count);
        let mut buf = vec![0u8; 1 << 16];
        let mut read = 0;
        loop {
            if cursor.read_sample(&mut buf).unwrap().is_some() {
                read += 1;
            }
            if cursor.advance().unwrap() == CursorStep::Exhausted {
                return read;
            }
        }
    }

    #[test]
    fn zero_and_one_loops_read_source_once() {
        assert_eq!(passes(10, 0), 10);
        assert_eq!(passes(10, 1), 10);
    }

    #[test]
    fn loop_count_sets_number_of_passes() {
        assert_eq!(passes(10, 2), 20);
        assert_eq!(passes(7, 3), 21);
    }

    #[test]
    fn restart_reports_new_loop() {
        let mut cursor = SourceCursor::new(source(2), 2);
        let mut buf = vec![0u8; 1 << 16];
        cursor.read_sample(&mut buf).unwrap();
        assert_eq!(cursor.advance().unwrap(), CursorStep::Advanced);
        cursor.read_sample(&mut buf).unwrap();
        assert_eq!(cursor.advance().unwrap(), CursorStep::Restarted { loop_index: 2 });
        let first = cursor.read_sample(&mut buf).unwrap().unwrap();
        assert_eq!(first.pts, Pts::ZERO);
        assert!(first.is_key_frame());
        assert_eq!(cursor.loops_completed(), 1);
    }

    #[test]
    fn exhausted_cursor_reads_nothing() {
        let mut cursor = SourceCursor::new(source(1), 1);
        let mut buf = vec![0u8; 1 << 16];
        assert!(cursor.read_sample(&mut buf).unwrap().is_some());
        assert_eq!(cursor.advance().unwrap(), CursorStep::Exhausted);
        assert!(cursor.is_exhausted());
        assert!(cursor.read_sample(&mut buf).unwrap().is_none());
        assert_eq!(cursor.advance().unwrap(), CursorStep::Exhausted);
        assert_eq!(cursor.loops_completed(), 1);
    }

    #[test]
    fn oversized_sample_is_an_error() {
        let mut cursor = SourceCursor::new(source(1), 1);
        let mut buf = vec![0u8; 4];
        assert!(matches!(
            cursor.read_sample(&mut buf),
            Err(Error::InvalidData { .. })
        ));
    }

    #[test]
    fn video_track_is_selected() {
        let mut source = MemorySource::synthetic(3, 30.into(), 64, 48, 10).with_extra_track(
            MediaFormat::video("audio/mp4a-latm", 0, 0),
        );
        let (track, format) = select_video_track(&mut source).unwrap();
        assert_eq!(track, 0);
        assert!(format.is_video());

        let mut audio_only = MemorySource::empty().with_extra_track(MediaFormat::video(
            "audio/opus",
            0,
            0,
        ));
        assert!(select_video_track(&mut audio_only).is_err());
    }
}
