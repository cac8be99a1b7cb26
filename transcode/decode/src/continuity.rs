/*!
    Presentation timestamp continuity across source loops.
*/

use transcode_types::Pts;

/**
    Corrects raw decoder timestamps so the encoder sees non-decreasing pts
    even though the source restarts from zero on every loop.

    Every decoded frame is passed to [`PtsTracker::observe`], dropped ones
    included, so the tracker knows the full span of one pass over the
    source. Only kept frames go through [`PtsTracker::correct`].
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PtsTracker {
    last: Pts,
}

impl PtsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Largest raw pts seen during the first loop.
    */
    pub fn last(&self) -> Pts {
        self.last
    }

    /**
        Record the raw pts of a decoded frame from loop `loop_index`,
        whether or not the frame is kept.
    */
    pub fn observe(&mut self, raw: Pts, loop_index: u32) {
        if loop_index <= 1 && raw > self.last {
            self.last = raw;
        }
    }

    /**
        Encoder-facing pts for a kept frame with raw pts `raw`, decoded during
        loop `loop_index` (starting at 1).

        Frames of the first loop keep their raw pts. Later frames are shifted
        to `(loop_index - 1) * last + raw`, so loop `k` covers
        `[(k - 1) * last, k * last]` whichever frames each loop keeps.
    */
    pub fn correct(&mut self, raw: Pts, loop_index: u32) -> Pts {
        self.observe(raw, loop_index);
        if loop_index <= 1 {
            return raw;
        }
        let loops_done = i64::from(loop_index - 1);
        self.last.saturating_mul(loops_done) + raw
    }
}

/**
    Tracks which source loop the frames leaving the decoder belong to.

    The source cursor wraps as soon as the last sample is fed, while a
    decoder with latency still emits frames of the previous loop. A backward
    jump of raw output pts marks the first frame of the next loop.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputLoopDetector {
    loop_index: u32,
    previous: Option<Pts>,
}

impl Default for OutputLoopDetector {
    fn default() -> Self {
        Self {
            loop_index: 1,
            previous: None,
        }
    }
}

impl OutputLoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loop_index(&self) -> u32 {
        self.loop_index
    }

    /**
        Record a raw output pts and return the loop it belongs to.
    */
    pub fn observe(&mut self, raw: Pts) -> u32 {
        if self.previous.is_some_and(|previous| raw < previous) {
            self.loop_index += 1;
        }
        self.previous = Some(raw);
        self.loop_index
    }
}
