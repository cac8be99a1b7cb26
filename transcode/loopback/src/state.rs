use transcode_types::{Error, Result};

/// Lifecycle of a loopback codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CodecState {
    Unconfigured,
    Configured,
    Running,
    Stopped,
    Released,
}

impl CodecState {
    pub(crate) fn expect_running(self, what: &str) -> Result<()> {
        if self == Self::Running {
            Ok(())
        } else {
            Err(Error::illegal_state(format!("cannot {what} while {self:?}")))
        }
    }
}
