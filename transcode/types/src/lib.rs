/*!
    Shared types for the transcode pipeline.

    This crate defines the types that cross crate boundaries, together with
    the traits describing the external collaborators the pipeline drives
    (codecs, demuxer, muxer, observers).
    It has no dependency on any codec implementation, so the stage crates and
    alternative backends can depend on it without pulling one in.

    # Timing

    - [`Pts`] - Presentation timestamps in microseconds
    - [`Rational`] - Frame rates such as 30000/1001
    - [`Clock`], [`WallClock`] and [`FramePacer`] - Real-time delivery pacing

    # Buffers and Frames

    - [`BufferInfo`] and [`BufferFlags`] - Buffer descriptors returned by queue polls
    - [`VideoFrame`] and [`PixelFormat`] - Decoded images
    - [`MediaFormat`] - Format descriptor handed to codecs and muxers

    # Collaborators

    - [`Codec`], [`CodecControl`] and [`CodecProvider`] - Buffer-queue codecs
    - [`SampleSource`] - Compressed sample demuxer
    - [`MuxSink`] - Container writer
    - [`FrameObserver`] - Statistics notifications
    - [`RuntimeParameters`] and [`RuntimeSchedule`] - Mid-stream tuning changes

    # Pipeline Control

    - [`Surface`] and [`InputSurface`] - Rendering handoff between decoder and encoder
    - [`StagePoll`] - Result of one bounded poll of a pipeline stage
    - [`Error`] and [`Result`] - Common error types
*/

mod buffer;
mod clock;
mod codec;
mod error;
mod format;
mod frame;
mod observer;
mod rational;
mod runtime;
mod signal;
mod sink;
mod source;
mod surface;
mod timestamp;

pub use buffer::{BufferFlags, BufferInfo};
pub use clock::{Clock, FramePacer, WallClock};
pub use codec::{
    Codec, CodecControl, CodecId, CodecInfo, CodecMode, CodecParameters, CodecProvider, Dequeued,
};
pub use error::{Error, Result};
pub use format::{ColorDescription, MediaFormat, ParamValue, PixelFormat, PlaneLayout};
pub use frame::VideoFrame;
pub use observer::{FrameObserver, NullObserver};
pub use rational::Rational;
pub use runtime::{FrameValue, RuntimeParameters, RuntimeSchedule, RuntimeUpdate};
pub use signal::StagePoll;
pub use sink::{MuxSink, TrackId};
pub use source::{SampleSource, SeekMode};
pub use surface::{InputSurface, Surface};
pub use timestamp::Pts;
