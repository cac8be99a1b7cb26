/*!
    Encode stage of the transcode pipeline.

    The encoder is configured for surface input: frames reach it through the
    [`InputSurface`] returned by [`EncodeStage::configure`], committed by the
    render bridge. This crate only drains the encoder's output queue and
    hands payloads to the muxer.

    # Output Classification

    Each drained buffer is one of:

    - **Codec config**: carries the container-ready format. The first one
      (or the first format-changed poll) registers the track and starts the
      muxer; nothing is forwarded.
    - **End of stream**: the encoder is done.
    - **Payload**: written to the muxer with its timestamp and key flag.

    # Sync Frame Workaround

    Some hardware encoders ignore the configured keyframe interval. A
    [`SyncRequestPolicy`] decides once, from codec metadata, whether sync
    frames must be requested explicitly every
    [`sync_request_period`] decoded frames.
*/

mod config;
mod quirks;
mod stage;

pub use transcode_sink::MuxWriter;
pub use transcode_types::{Error, InputSurface, Result, StagePoll};

pub use config::EncoderConfig;
pub use quirks::{KnownQuirks, NoQuirks, SyncRequestPolicy, sync_request_period};
pub use stage::{EncodeEvent, EncodeStage, EncodeStats};
