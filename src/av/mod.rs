use std::fmt;

/// Codec carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    /// H.264 / AVC video
    H264,
    /// H.265 / HEVC video
    H265,
    /// AAC audio
    AAC,
    /// Opus audio
    OPUS,
}

impl CodecType {
    /// Media kind this codec belongs to.
    pub fn kind(&self) -> MediaKind {
        match self {
            CodecType::H264 | CodecType::H265 => MediaKind::Video,
            CodecType::AAC | CodecType::OPUS => MediaKind::Audio,
        }
    }
}

/// The two track kinds a session multiplexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl MediaKind {
    /// Both kinds, audio first.
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];

    pub(crate) fn index(self) -> usize {
        match self {
            MediaKind::Audio => 0,
            MediaKind::Video => 1,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

mod format;
mod packet;
pub use format::*;
pub use packet::*;
