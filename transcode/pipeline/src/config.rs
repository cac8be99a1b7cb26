/*!
    Transcode run configuration.
*/

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use transcode_encode::EncoderConfig;
use transcode_sink::SinkConfig;
use transcode_types::{ColorDescription, MediaFormat, ParamValue, Rational, RuntimeSchedule};

use crate::TranscodeError;

/**
    Encoder settings of a transcode run.
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EncoderSettings {
    /// Encoder implementation name. None = any encoder for `mime`.
    pub codec: Option<String>,
    /// Output mime type.
    pub mime: String,
    /// Output width. None = input width.
    pub width: Option<u32>,
    /// Output height. None = input height.
    pub height: Option<u32>,
    /// Target encoded frame rate.
    pub frame_rate: Rational,
    /// Bitrate in bits per second (None = encoder default).
    pub bitrate: Option<u32>,
    /// Keyframe interval in seconds.
    pub keyframe_interval: u32,
    pub color: ColorDescription,
    pub params: BTreeMap<String, ParamValue>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            codec: None,
            mime: "video/avc".to_string(),
            width: None,
            height: None,
            frame_rate: Rational::new(30, 1),
            bitrate: None,
            keyframe_interval: 10,
            color: ColorDescription::default(),
            params: BTreeMap::new(),
        }
    }
}

impl EncoderSettings {
    pub fn new(mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            ..Self::default()
        }
    }

    pub fn with_codec(mut self, name: impl Into<String>) -> Self {
        self.codec = Some(name.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_frame_rate(mut self, rate: impl Into<Rational>) -> Self {
        self.frame_rate = rate.into();
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_keyframe_interval(mut self, seconds: u32) -> Self {
        self.keyframe_interval = seconds;
        self
    }

    pub fn with_color(mut self, color: ColorDescription) -> Self {
        self.color = color;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /**
        Encoder config for frames decoded from `input`.
    */
    pub fn encoder_config(&self, input: &MediaFormat) -> EncoderConfig {
        let mut config = EncoderConfig::new(
            self.mime.clone(),
            self.width.unwrap_or(input.width),
            self.height.unwrap_or(input.height),
        )
        .with_frame_rate(self.frame_rate)
        .with_keyframe_interval(self.keyframe_interval)
        .with_color(self.color);
        config.bitrate = self.bitrate;
        config.params = self.params.clone();
        config
    }
}

/**
    Runtime parameter schedules for both codecs.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSchedules {
    /// Applied to the decoder as samples are fed.
    pub decoder: RuntimeSchedule,
    /// Applied to the encoder as decoded frames come out.
    pub encoder: RuntimeSchedule,
}

/**
    Configuration of one transcode run.
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TranscodeConfig {
    pub description: String,
    /// Encode kept frames. When false the run only decodes.
    pub encode: bool,
    /// Decoder implementation name. None = any decoder for the input mime.
    pub decoder: Option<String>,
    pub encoder: EncoderSettings,
    /// Rate the keep interval is computed against. None = input track rate, else 30.
    pub reference_frame_rate: Option<Rational>,
    /// Number of passes over the source (0 behaves like 1).
    pub loop_count: u32,
    /// Pace frames to real time at the encoder frame rate.
    pub realtime: bool,
    /// Write the encoded stream here. None = count frames only.
    pub output: Option<SinkConfig>,
    /// Named parameters merged into the decoder format.
    pub decoder_params: BTreeMap<String, ParamValue>,
    pub runtime: RuntimeSchedules,
    /// Wait budget of every queue poll, in microseconds.
    pub poll_timeout_us: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            encode: true,
            decoder: None,
            encoder: EncoderSettings::default(),
            reference_frame_rate: None,
            loop_count: 1,
            realtime: false,
            output: None,
            decoder_params: BTreeMap::new(),
            runtime: RuntimeSchedules::default(),
            poll_timeout_us: 10_000,
        }
    }
}

impl TranscodeConfig {
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

    /**
        Parse a config from JSON. Missing fields take their defaults.
    */
    pub fn from_json_str(json: &str) -> Result<Self, TranscodeError> {
        serde_json::from_str(json).map_err(|e| TranscodeError::InvalidConfig(e.to_string()))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_decoder(mut self, name: impl Into<String>) -> Self {
        self.decoder = Some(name.into());
        self
    }

    pub fn with_encoder(mut self, encoder: EncoderSettings) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_reference_frame_rate(mut self, rate: impl Into<Rational>) -> Self {
        self.reference_frame_rate = Some(rate.into());
        self
    }

    pub fn with_loop_count(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_output(mut self, output: SinkConfig) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_decoder_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.decoder_params.insert(key.into(), value.into());
        self
    }

    pub fn with_runtime(mut self, decoder: RuntimeSchedule, encoder: RuntimeSchedule) -> Self {
        self.runtime = RuntimeSchedules { decoder, encoder };
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_us = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_micros(self.poll_timeout_us)
    }

    /**
        Reference frame rate for an input track, falling back to the track's
        own rate and then to 30 fps.
    */
    pub fn reference_frame_rate_for(&self, input: &MediaFormat) -> Rational {
        self.reference_frame_rate
            .or(input.frame_rate.filter(|rate| rate.is_positive()))
            .unwrap_or(Rational::new(30, 1))
    }

    /**
        Check the settings that can be checked without a source.
    */
    pub fn validate(&self) -> Result<(), TranscodeError> {
        let invalid = |message: String| Err(TranscodeError::InvalidConfig(message));
        if let Some(rate) = self.reference_frame_rate {
            if !rate.is_positive() {
                return invalid(format!("reference frame rate must be positive, got {rate}"));
            }
        }
        if !self.encode {
            return Ok(());
        }
        let encoder = &self.encoder;
        if !encoder.frame_rate.is_positive() {
            return invalid(format!(
                "encoder frame rate must be positive, got {}",
                encoder.frame_rate
            ));
        }
        if encoder.width == Some(0) || encoder.height == Some(0) {
            return invalid("encoder width and height must be non-zero".to_string());
        }
        if encoder.mime.trim().is_empty() && encoder.codec.is_none() {
            return invalid("encoder needs a mime type or a codec name".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcode_sink::ContainerFormat;

    #[test]
    fn defaults() {
        let config = TranscodeConfig::new();
        assert!(config.encode);
        assert_eq!(config.loop_count, 1);
        assert_eq!(config.poll_timeout(), Duration::from_millis(10));
        assert_eq!(config.encoder.mime, "video/avc");
        assert_eq!(config.encoder.keyframe_interval, 10);
        assert!(config.validate().is_ok());
        assert!(!TranscodeConfig::decode_only().encode);
    }

    #[test]
    fn parse_from_json() {
        let config = TranscodeConfig::from_json_str(
            r#"{
                "description": "vp8 at half rate",
                "encoder": {
                    "mime": "video/x-vnd.on2.vp8",
                    "frame-rate": "15",
                    "bitrate": 500000,
                    "params": { "bitrate-mode": 2 }
                },
                "reference-frame-rate": "30000/1001",
                "loop-count": 2,
                "output": { "path": "out", "format": "webm" },
                "decoder-params": { "low-latency": 1 },
                "runtime": {
                    "encoder": { "video-bitrate": [{ "frame": 30, "value": 250000 }], "drop": [5] }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.encoder.frame_rate, Rational::new(15, 1));
        assert_eq!(config.encoder.bitrate, Some(500_000));
        assert_eq!(config.encoder.params["bitrate-mode"], ParamValue::Int(2));
        assert_eq!(config.reference_frame_rate, Some(Rational::new(30000, 1001)));
        assert_eq!(config.loop_count, 2);
        assert_eq!(config.output.unwrap().format, Some(ContainerFormat::WebM));
        assert_eq!(config.decoder_params["low-latency"], ParamValue::Int(1));
        assert_eq!(config.runtime.encoder.drop, vec![5]);
        assert_eq!(config.runtime.encoder.video_bitrate[0].value, 250_000);
        assert!(config.runtime.decoder.is_empty());
        assert!(config.encode);
    }

    #[test]
    fn malformed_json_is_invalid_config() {
        let result = TranscodeConfig::from_json_str(r#"{ "loop-count": "many" }"#);
        assert!(matches!(result, Err(TranscodeError::InvalidConfig(_))));
    }

    #[test]
    fn validation() {
        let zero_rate = TranscodeConfig::new().with_encoder(EncoderSettings::default().with_frame_rate(0));
        assert!(zero_rate.validate().is_err());

        let zero_size = TranscodeConfig::new().with_encoder(EncoderSettings::default().with_size(0, 720));
        assert!(zero_size.validate().is_err());

        let negative_reference = TranscodeConfig::decode_only().with_reference_frame_rate((-30, 1));
        assert!(negative_reference.validate().is_err());

        // encoder settings are irrelevant without encoding
        let decode_only = TranscodeConfig::decode_only().with_encoder(EncoderSettings::default().with_frame_rate(0));
        assert!(decode_only.validate().is_ok());
    }

    #[test]
    fn reference_rate_falls_back_to_input() {
        let input = MediaFormat::video("video/avc", 64, 48).with_frame_rate(60);
        assert_eq!(TranscodeConfig::new().reference_frame_rate_for(&input), Rational::new(60, 1));
        assert_eq!(
            TranscodeConfig::new()
                .with_reference_frame_rate(25)
                .reference_frame_rate_for(&input),
            Rational::new(25, 1)
        );
        let no_rate = MediaFormat::video("video/avc", 64, 48);
        assert_eq!(TranscodeConfig::new().reference_frame_rate_for(&no_rate), Rational::new(30, 1));
    }

    #[test]
    fn encoder_config_defaults_to_input_size() {
        let input = MediaFormat::video("video/avc", 640, 360);
        let config = EncoderSettings::new("video/hevc")
            .with_bitrate(1_000_000)
            .encoder_config(&input);
        assert_eq!((config.width, config.height), (640, 360));
        assert_eq!(config.bitrate, Some(1_000_000));

        let scaled = EncoderSettings::default().with_size(320, 180).encoder_config(&input);
        assert_eq!((scaled.width, scaled.height), (320, 180));
    }
}
