/*!
    Codec specific workarounds.
*/

use transcode_types::{CodecInfo, Rational};

/**
    Decides whether an encoder needs sync frames requested explicitly at
    every keyframe interval, because it does not honour the configured
    interval on its own.

    Evaluated once, from codec metadata, when the pipeline is configured.
*/
pub trait SyncRequestPolicy {
    fn needs_periodic_sync_request(&self, info: &CodecInfo) -> bool;
}

/**
    The workarounds known to be needed on real hardware: VPx encoders from
    Qualcomm ignore the keyframe interval.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct KnownQuirks;

impl SyncRequestPolicy for KnownQuirks {
    fn needs_periodic_sync_request(&self, info: &CodecInfo) -> bool {
        let vpx = info.codec.is_some_and(|codec| codec.is_vpx());
        let qualcomm = info
            .vendor
            .as_deref()
            .is_some_and(|vendor| matches!(vendor.to_ascii_lowercase().as_str(), "qcom" | "qualcomm"));
        vpx && qualcomm
    }
}

/**
    Never request sync frames.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct NoQuirks;

impl SyncRequestPolicy for NoQuirks {
    fn needs_periodic_sync_request(&self, _info: &CodecInfo) -> bool {
        false
    }
}

impl SyncRequestPolicy for bool {
    fn needs_periodic_sync_request(&self, _info: &CodecInfo) -> bool {
        *self
    }
}

/**
    Number of decoded frames between explicit sync requests, or None if the
    keyframe interval is disabled.
*/
pub fn sync_request_period(frame_rate: Rational, keyframe_interval: u32) -> Option<u64> {
    let period = u64::from(frame_rate.rounded()) * u64::from(keyframe_interval);
    (period > 0).then_some(period)
}
