/*!
    Run summary.
*/

use serde::{Deserialize, Serialize};

use transcode_decode::DecodeStats;
use transcode_encode::EncodeStats;

/**
    Counters of a completed transcode run.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TranscodeSummary {
    pub decoder: String,
    /// None for decode-only runs.
    pub encoder: Option<String>,
    /// Compressed samples queued to the decoder.
    pub samples_queued: u64,
    /// Decoder output buffers consumed, the end of stream buffer included.
    pub frames_decoded: u64,
    /// Frames rendered to the encoder (kept).
    pub frames_rendered: u64,
    /// Frames released without rendering (dropped).
    pub frames_skipped: u64,
    /// Encoded payloads forwarded to the muxer.
    pub frames_encoded: u64,
    /// Samples actually written to the output file.
    pub samples_muxed: u64,
    pub loops_completed: u32,
    /// Corrected pts of the last kept frame, in microseconds.
    pub last_rendered_pts: Option<i64>,
    /// Pts of the last forwarded payload, in microseconds.
    pub last_encoded_pts: Option<i64>,
}

impl TranscodeSummary {
    pub(crate) fn record_decode(&mut self, stats: &DecodeStats) {
        self.samples_queued = stats.samples_queued;
        self.frames_decoded = stats.frames_decoded;
        self.frames_rendered = stats.frames_rendered;
        self.frames_skipped = stats.frames_skipped;
        self.last_rendered_pts = stats.last_rendered_pts.map(|pts| pts.as_micros());
    }

    pub(crate) fn record_encode(&mut self, stats: &EncodeStats, samples_muxed: u64) {
        self.frames_encoded = stats.frames_forwarded;
        self.samples_muxed = samples_muxed;
        self.last_encoded_pts = stats.last_pts.map(|pts| pts.as_micros());
    }
}
