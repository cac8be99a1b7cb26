/*!
    Encoder configuration types.
*/

use std::collections::BTreeMap;

use transcode_types::{ColorDescription, MediaFormat, ParamValue, Rational};

/**
    Configuration the encoder format is built from.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    /// Output mime type, e.g. `video/avc`.
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    /// Target bitrate in bits per second (None = encoder default).
    pub bitrate: Option<u32>,
    /// Keyframe interval in seconds.
    pub keyframe_interval: u32,
    /// Explicit colour signalling. Unset fields are copied from the input.
    pub color: ColorDescription,
    /// Named tuning parameters passed through to the encoder.
    pub params: BTreeMap<String, ParamValue>,
}

impl EncoderConfig {
    /**
        Create a config with default settings (30 fps, keyframe every 10s).
    */
    pub fn new(mime: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            mime: mime.into(),
            width,
            height,
            frame_rate: Rational::new(30, 1),
            bitrate: None,
            keyframe_interval: 10,
            color: ColorDescription::default(),
            params: BTreeMap::new(),
        }
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
        Build the encoder format for frames decoded from `input`.

        Colour range, transfer and standard present on the input track are
        carried over unless set explicitly here.
    */
    pub fn media_format(&self, input: &MediaFormat) -> MediaFormat {
        let mut color = self.color;
        color.fill_missing_from(&input.color);

        let mut format = MediaFormat::video(self.mime.clone(), self.width, self.height)
            .with_frame_rate(self.frame_rate)
            .with_keyframe_interval(self.keyframe_interval)
            .with_color(color);
        format.bitrate = self.bitrate;
        format.surface_input = true;
        format.params = self.params.clone();
        format
    }
}
