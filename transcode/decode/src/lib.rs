/*!
    Decode stage of the transcode pipeline.

    This crate feeds compressed samples from a [`SampleSource`] into a
    buffer-queue decoder and decides, per decoded frame, whether the frame
    reaches the encoder. Kept frames are rendered through a
    [`RenderBridge`] with a timestamp that stays monotonic across source
    loops.

    # Frame Selection

    The [`FramePolicy`] keeps one frame per bucket of `reference / target`
    input frames, so a 60 fps source encoded at 30 fps keeps every other
    frame:

    ```ignore
    let mut policy = FramePolicy::from_rates(60.into(), 30.into())?;
    assert_eq!(policy.decide(0), FrameDecision::Drop);
    assert_eq!(policy.decide(1), FrameDecision::Keep);
    ```

    # Looping

    The [`SourceCursor`] wraps to the start of the source when it runs off
    the end, until the requested number of passes has been read. The
    [`PtsTracker`] shifts timestamps of later passes so the encoder never
    sees time go backwards.

    # Polling

    [`DecodeStage::feed_one_sample`] and [`DecodeStage::drain_one_output`]
    each do one bounded wait on one decoder queue and report a
    [`StagePoll`]. The pipeline driver interleaves them with the encoder.
*/

mod config;
mod continuity;
mod cursor;
mod policy;
mod stage;

pub use transcode_render::RenderBridge;
pub use transcode_types::{Error, Result, SampleSource, StagePoll};

pub use config::DecodeConfig;
pub use continuity::{OutputLoopDetector, PtsTracker};
pub use cursor::{CursorStep, SourceCursor, select_video_track};
pub use policy::{FrameDecision, FramePolicy, keeps_frame};
pub use stage::{DecodeStage, DecodeStats, DecodedFrame, Downstream, FeedEvent, FrameDisposition};
