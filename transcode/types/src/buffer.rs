/*!
    Buffer descriptors returned by codec queue polls.
*/

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::Pts;

/**
    Flags attached to a queued or dequeued buffer.

    Values match the ones used by common hardware codec APIs so collaborators
    can pass them through unchanged. Sample flags reported by a demuxer use
    the same bits (`KEY_FRAME` doubles as the sync sample flag).
*/
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BufferFlags(u32);

impl BufferFlags {
    pub const NONE: BufferFlags = BufferFlags(0);
    /// Self-contained unit, decodable without prior state.
    pub const KEY_FRAME: BufferFlags = BufferFlags(1);
    /// Codec specific data, not media payload.
    pub const CODEC_CONFIG: BufferFlags = BufferFlags(2);
    /// No further buffers follow.
    pub const END_OF_STREAM: BufferFlags = BufferFlags(4);

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: BufferFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BufferFlags {
    type Output = BufferFlags;

    fn bitor(self, rhs: BufferFlags) -> BufferFlags {
        BufferFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for BufferFlags {
    fn bitor_assign(&mut self, rhs: BufferFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for BufferFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::KEY_FRAME) {
            names.push("KEY_FRAME");
        }
        if self.contains(Self::CODEC_CONFIG) {
            names.push("CODEC_CONFIG");
        }
        if self.contains(Self::END_OF_STREAM) {
            names.push("END_OF_STREAM");
        }
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

/**
    Descriptor of one buffer handed across a queue boundary.

    The buffer index itself is returned separately by the poll; this carries
    what the buffer holds. Whoever last dequeued a buffer owns it until it
    is queued or released again.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferInfo {
    /// Number of valid payload bytes.
    pub size: usize,
    /// Presentation timestamp of the payload.
    pub pts: Pts,
    /// Buffer flags.
    pub flags: BufferFlags,
}

impl BufferInfo {
    pub fn new(size: usize, pts: Pts, flags: BufferFlags) -> Self {
        Self { size, pts, flags }
    }

    /**
        Descriptor of a zero-size terminal marker.
    */
    pub fn end_of_stream() -> Self {
        Self {
            size: 0,
            pts: Pts::ZERO,
            flags: BufferFlags::END_OF_STREAM,
        }
    }

    pub fn is_key_frame(&self) -> bool {
        self.flags.contains(BufferFlags::KEY_FRAME)
    }

    pub fn is_codec_config(&self) -> bool {
        self.flags.contains(BufferFlags::CODEC_CONFIG)
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(BufferFlags::END_OF_STREAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let flags = BufferFlags::KEY_FRAME | BufferFlags::END_OF_STREAM;
        assert!(flags.contains(BufferFlags::KEY_FRAME));
        assert!(flags.contains(BufferFlags::END_OF_STREAM));
        assert!(!flags.contains(BufferFlags::CODEC_CONFIG));
        assert_eq!(flags.bits(), 5);
        assert!(BufferFlags::NONE.is_empty());
    }

    #[test]
    fn flags_debug_lists_names() {
        assert_eq!(format!("{:?}", BufferFlags::NONE), "NONE");
        assert_eq!(
            format!("{:?}", BufferFlags::KEY_FRAME | BufferFlags::CODEC_CONFIG),
            "KEY_FRAME | CODEC_CONFIG"
        );
    }

    #[test]
    fn end_of_stream_marker_is_empty() {
        let info = BufferInfo::end_of_stream();
        assert_eq!(info.size, 0);
        assert!(info.is_end_of_stream());
        assert!(!info.is_key_frame());
    }
}
