/*!
    In-memory sample source.
*/

use transcode_types::{
    BufferFlags, ColorDescription, Error, MediaFormat, Pts, Rational, Result, SampleSource,
    SeekMode,
};

/**
    One compressed sample held by a [`MemorySource`].
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemorySample {
    pub data: Vec<u8>,
    pub pts: Pts,
    pub flags: BufferFlags,
}

struct Track {
    format: MediaFormat,
    samples: Vec<MemorySample>,
}

/**
    A demuxer over samples held in memory.
*/
pub struct MemorySource {
    tracks: Vec<Track>,
    selected: Option<usize>,
    position: usize,
    seeks: u32,
}

/**
    Payload of the `n`-th synthetic sample.

    The first byte is the luma value the loopback decoder fills the frame
    with; key frames are larger than the rest.
*/
pub fn synthetic_payload(n: usize, key_frame: bool) -> Vec<u8> {
    let size = if key_frame { 48 } else { 24 };
    let fill = (16 + n % 220) as u8;
    let mut data = vec![fill; size];
    data[1] = u8::from(key_frame);
    data
}

impl MemorySource {
    /**
        Source with a single track; the track is selected.
    */
    pub fn new(format: MediaFormat, samples: Vec<MemorySample>) -> Self {
        Self {
            tracks: vec![Track { format, samples }],
            selected: Some(0),
            position: 0,
            seeks: 0,
        }
    }

    /**
        Source without any track.
    */
    pub fn empty() -> Self {
        Self {
            tracks: Vec::new(),
            selected: None,
            position: 0,
            seeks: 0,
        }
    }

    /**
        Source with one `video/avc` track of `frames` samples at `rate`,
        a key frame every `gop` samples (only the first if `gop` is 0).
    */
    pub fn synthetic(frames: usize, rate: Rational, width: u32, height: u32, gop: usize) -> Self {
        let format = MediaFormat::video("video/avc", width, height).with_frame_rate(rate);
        let samples = (0..frames)
            .map(|n| {
                let key_frame = if gop == 0 { n == 0 } else { n % gop == 0 };
                let flags = if key_frame {
                    BufferFlags::KEY_FRAME
                } else {
                    BufferFlags::NONE
                };
                MemorySample {
                    data: synthetic_payload(n, key_frame),
                    pts: frame_pts(n, rate),
                    flags,
                }
            })
            .collect();
        Self::new(format, samples)
    }

    /**
        Append a track without samples.
    */
    pub fn with_extra_track(mut self, format: MediaFormat) -> Self {
        self.tracks.push(Track {
            format,
            samples: Vec::new(),
        });
        self
    }

    /**
        Set the colour signalling of the first track.
    */
    pub fn with_color(mut self, color: ColorDescription) -> Self {
        if let Some(track) = self.tracks.first_mut() {
            track.format.color = color;
        }
        self
    }

    /// Number of seeks performed so far.
    pub fn seeks(&self) -> u32 {
        self.seeks
    }

    fn samples(&self) -> &[MemorySample] {
        self.selected
            .and_then(|track| self.tracks.get(track))
            .map(|track| track.samples.as_slice())
            .unwrap_or(&[])
    }

    fn current(&self) -> Option<&MemorySample> {
        self.samples().get(self.position)
    }
}

/**
    Timestamp of the `n`-th frame at `rate`, in microseconds.
*/
pub fn frame_pts(n: usize, rate: Rational) -> Pts {
    if !rate.is_positive() {
        return Pts::ZERO;
    }
    let micros = n as i128 * 1_000_000 * i128::from(rate.den) / i128::from(rate.num);
    Pts(i64::try_from(micros).unwrap_or(i64::MAX))
}

impl SampleSource for MemorySource {
    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn track_format(&self, track: usize) -> Result<MediaFormat> {
        self.tracks
            .get(track)
            .map(|track| track.format.clone())
            .ok_or_else(|| Error::invalid_data(format!("no track {track}")))
    }

    fn select_track(&mut self, track: usize) -> Result<()> {
        if track >= self.tracks.len() {
            return Err(Error::invalid_data(format!("no track {track}")));
        }
        self.selected = Some(track);
        self.position = 0;
        Ok(())
    }

    fn read_sample_data(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        if self.selected.is_none() {
            return Err(Error::illegal_state("no track selected"));
        }
        let Some(sample) = self.current() else {
            return Ok(None);
        };
        let len = sample.data.len();
        if len > buf.len() {
            return Err(Error::invalid_data(format!(
                "sample of {len} bytes does not fit buffer of {}",
                buf.len()
            )));
        }
        buf[..len].copy_from_slice(&sample.data);
        Ok(Some(len))
    }

    fn sample_time(&self) -> Option<Pts> {
        self.current().map(|sample| sample.pts)
    }

    fn sample_size(&self) -> Option<usize> {
        self.current().map(|sample| sample.data.len())
    }

    fn sample_flags(&self) -> BufferFlags {
        self.current()
            .map(|sample| sample.flags)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> bool {
        let len = self.samples().len();
        if self.position < len {
            self.position += 1;
        }
        self.position < len
    }

    fn seek_to(&mut self, position: Pts, mode: SeekMode) -> Result<()> {
        if self.selected.is_none() {
            return Err(Error::illegal_state("no track selected"));
        }
        let samples = self.samples();
        let sync = |sample: &&MemorySample| sample.flags.contains(BufferFlags::KEY_FRAME);
        let before = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.pts <= position && sync(s))
            .map(|(i, _)| i)
            .last();
        let after = samples
            .iter()
            .enumerate()
            .find(|(_, s)| s.pts >= position && sync(s))
            .map(|(i, _)| i);
        let target = match mode {
            SeekMode::PreviousSync => before.or(after),
            SeekMode::NextSync => after.or(before),
            SeekMode::ClosestSync => match (before, after) {
                (Some(b), Some(a)) => {
                    let distance = |i: usize| (samples[i].pts.as_micros() - position.as_micros()).abs();
                    Some(if distance(a) < distance(b) { a } else { b })
                }
                (b, a) => b.or(a),
            },
        };
        self.position = target.unwrap_or(0);
        self.seeks += 1;
        Ok(())
    }
}
