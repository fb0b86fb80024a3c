#![forbid(unsafe_code)]

//! Stream identity.

/// Number of elementary-stream kinds the controller can host.
///
/// Fixed at initialization; per-kind tables are plain arrays indexed by
/// [`StreamKind::index`].
pub const STREAM_COUNT: usize = 2;

/// Kind of an elementary stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Audio,
    Video,
}

impl StreamKind {
    /// All stream kinds, in index order.
    pub const ALL: [StreamKind; STREAM_COUNT] = [StreamKind::Audio, StreamKind::Video];

    /// Stable index for per-kind tables.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            StreamKind::Audio => 0,
            StreamKind::Video => 1,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Audio => write!(f, "audio"),
            StreamKind::Video => write!(f, "video"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_distinct_and_in_range() {
        for kind in StreamKind::ALL {
            assert!(kind.index() < STREAM_COUNT);
        }
        assert_ne!(StreamKind::Audio.index(), StreamKind::Video.index());
    }

    #[test]
    fn all_covers_every_kind() {
        assert_eq!(StreamKind::ALL.len(), STREAM_COUNT);
    }
}
