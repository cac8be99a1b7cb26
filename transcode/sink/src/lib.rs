/*!
    Container selection and ordered muxing for the transcode pipeline.

    The encoder's output is handed to a [`MuxSink`] collaborator through a
    [`MuxWriter`], which guarantees the sink never sees a sample before its
    track is added and started. Sinks are opened through a [`SinkProvider`].

    # Container Formats

    - **MP4**: H.264, H.265, AV1, MPEG-4 Part 2
    - **WebM**: VP8, VP9, AV1
    - **MKV**: any codec
    - **MPEG-TS**: H.264, H.265, MPEG-2, MPEG-4 Part 2

    Without an explicit format, [`ContainerFormat::for_codec`] picks WebM for
    VP8/VP9 and MP4 for everything else:

    ```ignore
    let config = SinkConfig::new("out.mp4");
    let container = config.container_for(Some(CodecId::Vp9)); // WebM
    let sink = provider.open(&config.resolved_path(container), container)?;
    let mut writer = MuxWriter::new(sink);
    ```
*/

use std::path::Path;

pub use transcode_types::{BufferInfo, CodecId, Error, MediaFormat, MuxSink, Result, TrackId};

mod config;
mod writer;

pub use config::{ContainerFormat, SinkConfig};
pub use writer::MuxWriter;

/**
    Mux sink collaborator factory.
*/
pub trait SinkProvider {
    fn open(&mut self, path: &Path, container: ContainerFormat) -> Result<Box<dyn MuxSink>>;
}
