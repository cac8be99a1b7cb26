/*!
    Frame-accurate transcode pipeline.

    A [`Transcoder`] reads compressed video samples from a source, decodes
    them, keeps the frames matching the target frame rate and renders them
    into an encoder whose output is muxed into a container. The source may
    be looped; timestamps handed to the encoder stay monotonic across loops.

    # Collaborators

    The transcoder never touches a real codec, demuxer or muxer directly:

    - [`SampleSource`] - Compressed samples and track formats
    - [`CodecProvider`] - Creates decoders and encoders by name or mime type
    - [`SinkProvider`] - Opens the output container
    - [`FrameObserver`] - Optional statistics notifications

    # Example

    ```ignore
    let config = TranscodeConfig::new()
        .with_encoder(EncoderSettings::new("video/avc").with_bitrate(2_000_000))
        .with_loop_count(2)
        .with_output(SinkConfig::mp4("out.mp4"));

    let summary = Transcoder::new(config, Box::new(source), Box::new(codecs))
        .with_sinks(Box::new(files))
        .run()?;
    ```

    # Configuration

    [`TranscodeConfig`] is serde-enabled and can be read from JSON with
    [`TranscodeConfig::from_json_str`]. Invalid configurations are rejected
    before any collaborator is created.
*/

mod config;
mod driver;
mod error;
mod summary;

pub use transcode_sink::{ContainerFormat, SinkConfig, SinkProvider};
pub use transcode_types::{
    CodecProvider, FrameObserver, Rational, RuntimeSchedule, SampleSource,
};

pub use config::{EncoderSettings, RuntimeSchedules, TranscodeConfig};
pub use driver::{PipelineState, Transcoder};
pub use error::TranscodeError;
pub use summary::TranscodeSummary;
