/*!
    In-memory collaborators for the transcode pipeline.

    Everything here runs without codec hardware or files, and keeps a shared
    record of what the pipeline asked of it:

    - [`MemorySource`] - Demuxer over synthetic samples
    - [`LoopbackDecoder`] - Turns each sample into a frame filled with its first byte
    - [`LoopbackEncoder`] - Turns surface frames back into small payloads
    - [`MemorySink`] - Muxer that records tracks and samples
    - [`LoopbackBackend`] - Codec and sink provider wiring the above together
    - [`FrameCapture`] - Input surface keeping every submitted frame

    Backends for real codecs implement the same collaborator traits.
*/

mod backend;
mod capture;
mod decoder;
mod encoder;
mod sink;
mod source;
mod state;

pub use backend::LoopbackBackend;
pub use capture::FrameCapture;
pub use decoder::{DecoderLog, DecoderJournal, LoopbackDecoder};
pub use encoder::{
    CODEC_CONFIG_PAYLOAD, EncoderLog, EncoderJournal, FormatAnnouncement, LoopbackEncoder,
    LoopbackInputSurface,
};
pub use sink::{MemorySink, SinkEvent, WrittenSample};
pub use source::{MemorySample, MemorySource, frame_pts, synthetic_payload};
