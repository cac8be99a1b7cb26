/*!
    Stage poll results.
*/

use crate::Error;

/**
    Outcome of one bounded poll of a pipeline stage.

    Stages never block past their wait budget; the driver dispatches on this
    result once per tick.
*/
#[derive(Debug)]
pub enum StagePoll<E> {
    /// Nothing happened this tick. Try again next tick.
    Idle,
    /// The stage made progress and reports what it did.
    Progress(E),
    /// The stage cannot continue.
    Fatal(Error),
}

impl<E> StagePoll<E> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /**
        Returns the progress event, if any.
    */
    pub fn progress(self) -> Option<E> {
        match self {
            Self::Progress(event) => Some(event),
            Self::Idle | Self::Fatal(_) => None,
        }
    }

    pub fn map<F, T>(self, f: F) -> StagePoll<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            Self::Idle => StagePoll::Idle,
            Self::Progress(event) => StagePoll::Progress(f(event)),
            Self::Fatal(error) => StagePoll::Fatal(error),
        }
    }
}

impl<E> From<Error> for StagePoll<E> {
    fn from(error: Error) -> Self {
        Self::Fatal(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keeps_variant() {
        let poll: StagePoll<u32> = StagePoll::Progress(2);
        assert_eq!(poll.map(|n| n * 2).progress(), Some(4));

        let poll: StagePoll<u32> = StagePoll::Idle;
        assert!(poll.map(|n| n * 2).is_idle());

        let poll: StagePoll<u32> = Error::codec("gone").into();
        assert!(poll.map(|n| n * 2).is_fatal());
    }
}
