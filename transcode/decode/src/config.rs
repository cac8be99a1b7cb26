/*!
    Decode stage configuration.
*/

use std::time::Duration;

use transcode_types::Rational;

/**
    Configuration for the decode stage.
*/
#[derive(Clone, Debug)]
pub struct DecodeConfig {
    /// Wait budget of every decoder queue poll.
    pub poll_timeout: Duration,
    /// Number of passes over the source (0 behaves like 1).
    pub loop_count: u32,
    /// Frame rate the keep interval is computed against.
    pub reference_frame_rate: Rational,
    /// Target encoder frame rate.
    pub frame_rate: Rational,
    /// Forward kept frames to the encoder. When false every frame is dropped.
    pub encode: bool,
    /// Pace rendered frames to real time at the target frame rate.
    pub realtime: bool,
    /// Ask the encoder for a sync frame every this many decoded frames.
    pub sync_request_period: Option<u64>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(10),
            loop_count: 1,
            reference_frame_rate: Rational::new(30, 1),
            frame_rate: Rational::new(30, 1),
            encode: true,
            realtime: false,
            sync_request_period: None,
        }
    }
}

impl DecodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Create a config for decode-only runs.
    */
    pub fn decode_only() -> Self {
        Self {
            encode: false,
            ..Self::default()
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_loop_count(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count;
        self
    }

    /**
        Set the reference (input) and target (encoder) frame rates.
    */
    pub fn with_rates(mut self, reference: impl Into<Rational>, target: impl Into<Rational>) -> Self {
        self.reference_frame_rate = reference.into();
        self.frame_rate = target.into();
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_sync_request_period(mut self, period: Option<u64>) -> Self {
        self.sync_request_period = period.filter(|&p| p > 0);
        self
    }
}
