/*!
    Frame timing policy: which decoded frames reach the encoder.
*/

use transcode_types::{Error, Rational, Result};

/**
    Decision for one decoded frame.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameDecision {
    /// Render the frame to the encoder surface.
    Keep,
    /// Release the frame without rendering.
    Drop,
}

/**
    Returns true if the frame at `index` is the one kept for its bucket.

    Buckets are `keep_interval` input frames wide; the frame whose successor
    falls into the next bucket is kept, so exactly one frame per bucket is.
*/
pub fn keeps_frame(index: u64, keep_interval: f64) -> bool {
    let current = (index as f64 / keep_interval).floor();
    let next = ((index + 1) as f64 / keep_interval).floor();
    current != next
}

/**
    Stateful keep/drop policy.

    Wraps [`keeps_frame`] with a one-shot forced drop and a decode-only mode
    in which every frame is dropped.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct FramePolicy {
    keep_interval: f64,
    drop_next: bool,
    enabled: bool,
}

fn check_interval(keep_interval: f64) -> Result<f64> {
    if keep_interval.is_finite() && keep_interval > 0.0 {
        Ok(keep_interval)
    } else {
        Err(Error::configuration(format!(
            "keep interval must be positive, got {keep_interval}"
        )))
    }
}

impl FramePolicy {
    pub fn new(keep_interval: f64) -> Result<Self> {
        Ok(Self {
            keep_interval: check_interval(keep_interval)?,
            drop_next: false,
            enabled: true,
        })
    }

    /**
        Policy keeping frames at `target / reference` of the input rate.
    */
    pub fn from_rates(reference: Rational, target: Rational) -> Result<Self> {
        if !reference.is_positive() || !target.is_positive() {
            return Err(Error::configuration(format!(
                "frame rates must be positive, got {reference} and {target}"
            )));
        }
        Self::new(reference.to_f64() / target.to_f64())
    }

    /**
        Policy for decode-only runs: nothing is ever kept.
    */
    pub fn disabled() -> Self {
        Self {
            keep_interval: 1.0,
            drop_next: false,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn keep_interval(&self) -> f64 {
        self.keep_interval
    }

    pub fn set_keep_interval(&mut self, keep_interval: f64) -> Result<()> {
        self.keep_interval = check_interval(keep_interval)?;
        Ok(())
    }

    /**
        Force the next decision to drop, once.
    */
    pub fn force_drop_next(&mut self) {
        self.drop_next = true;
    }

    pub fn decide(&mut self, index: u64) -> FrameDecision {
        let forced = std::mem::take(&mut self.drop_next);
        if forced || !self.enabled || !keeps_frame(index, self.keep_interval) {
            FrameDecision::Drop
        } else {
            FrameDecision::Keep
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kept(policy: &mut FramePolicy, frames: u64) -> Vec<u64> {
        (0..frames)
            .filter(|&i| policy.decide(i) == FrameDecision::Keep)
            .collect()
    }

    #[test]
    fn same_rate_keeps_everything() {
        let mut policy = FramePolicy::from_rates(30.into(), 30.into()).unwrap();
        assert_eq!(kept(&mut policy, 30).len(), 30);
    }

    #[test]
    fn half_rate_alternates() {
        let mut policy = FramePolicy::from_rates(60.into(), 30.into()).unwrap();
        let kept = kept(&mut policy, 60);
        assert_eq!(kept.len(), 30);
        assert!(kept.iter().all(|i| i % 2 == 1));
    }

    #[test]
    fn one_frame_per_bucket() {
        for interval in [1.0, 1.5, 2.0, 2.5, 3.0, 7.25, 1001.0 / 1000.0] {
            let frames = 10_000u64;
            let kept = (0..frames).filter(|&i| keeps_frame(i, interval)).count() as f64;
            let expected = frames as f64 / interval;
            assert!(
                (kept - expected).abs() <= 1.0,
                "interval {interval}: kept {kept}, expected {expected}"
            );
        }
    }

    #[test]
    fn no_two_kept_frames_share_a_bucket() {
        let interval = 2.5;
        let buckets: Vec<u64> = (0..100)
            .filter(|&i| keeps_frame(i, interval))
            .map(|i| (i as f64 / interval).floor() as u64)
            .collect();
        let mut deduped = buckets.clone();
        deduped.dedup();
        assert_eq!(buckets, deduped);
    }

    #[test]
    fn forced_drop_applies_once() {
        let mut policy = FramePolicy::new(1.0).unwrap();
        policy.force_drop_next();
        assert_eq!(policy.decide(0), FrameDecision::Drop);
        assert_eq!(policy.decide(1), FrameDecision::Keep);
    }

    #[test]
    fn disabled_policy_drops_everything() {
        let mut policy = FramePolicy::disabled();
        assert!(kept(&mut policy, 50).is_empty());
    }

    #[test]
    fn invalid_intervals_are_rejected() {
        assert!(FramePolicy::new(0.0).is_err());
        assert!(FramePolicy::new(-2.0).is_err());
        assert!(FramePolicy::new(f64::NAN).is_err());
        assert!(FramePolicy::from_rates(30.into(), 0.into()).is_err());
        let mut policy = FramePolicy::new(1.0).unwrap();
        assert!(policy.set_keep_interval(f64::INFINITY).is_err());
        assert_eq!(policy.keep_interval(), 1.0);
    }
}
