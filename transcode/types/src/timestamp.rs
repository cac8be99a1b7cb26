/*!
    Presentation timestamps.
*/

use std::ops::{Add, Sub};
use std::time::Duration;

/**
    Presentation timestamp in microseconds.

    Every buffer crossing a queue boundary carries one of these. Container
    specific time bases are converted by the demuxer and muxer collaborators,
    so the pipeline itself only ever deals in microseconds.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pts(pub i64);

impl Pts {
    pub const ZERO: Pts = Pts(0);

    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    #[inline]
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /**
        Nanosecond value, as expected by presentation clocks of rendering targets.
    */
    #[inline]
    pub const fn as_nanos(self) -> i64 {
        self.0.saturating_mul(1000)
    }

    /**
        Convert to a Duration. Negative values are clamped to zero.
    */
    #[inline]
    pub fn to_duration(self) -> Duration {
        if self.0 <= 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.0 as u64)
    }

    #[inline]
    pub fn from_duration(duration: Duration) -> Self {
        Self(i64::try_from(duration.as_micros()).unwrap_or(i64::MAX))
    }

    /**
        Multiply by an integer factor, saturating instead of wrapping.
    */
    #[inline]
    pub const fn saturating_mul(self, factor: i64) -> Self {
        Self(self.0.saturating_mul(factor))
    }
}

impl Add for Pts {
    type Output = Pts;

    fn add(self, rhs: Pts) -> Pts {
        Pts(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Pts {
    type Output = Pts;

    fn sub(self, rhs: Pts) -> Pts {
        Pts(self.0.saturating_sub(rhs.0))
    }
}

impl From<i64> for Pts {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Pts> for i64 {
    fn from(pts: Pts) -> Self {
        pts.0
    }
}
