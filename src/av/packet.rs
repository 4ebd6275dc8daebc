use super::MediaKind;
use bytes::Bytes;
use std::time::Duration;

/// A timestamped buffer of media data handed in by the capture source.
///
/// The router borrows the sample for the duration of a single call and
/// never keeps it afterwards.
#[derive(Debug, Clone)]
pub struct MediaSample {
    /// Encoded or raw payload
    pub data: Bytes,
    /// Track the sample belongs to
    pub kind: MediaKind,
    /// Presentation timestamp on the capture clock
    pub pts: Duration,
    /// Decode timestamp, when it differs from `pts`
    pub dts: Option<Duration>,
    /// Whether the sample can be decoded on its own
    pub is_key: bool,
    /// Sample duration if known
    pub duration: Option<Duration>,
}

impl MediaSample {
    /// Creates a sample of `kind` presented at `pts`.
    pub fn new(kind: MediaKind, pts: Duration, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            kind,
            pts,
            dts: None,
            is_key: false,
            duration: None,
        }
    }

    /// Shorthand for an audio sample.
    pub fn audio(pts: Duration, data: impl Into<Bytes>) -> Self {
        Self::new(MediaKind::Audio, pts, data)
    }

    /// Shorthand for a video sample.
    pub fn video(pts: Duration, data: impl Into<Bytes>) -> Self {
        Self::new(MediaKind::Video, pts, data)
    }

    /// Sets the decode timestamp.
    pub fn with_dts(mut self, dts: Duration) -> Self {
        self.dts = Some(dts);
        self
    }

    /// Marks the sample as a sync sample.
    pub fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    /// Sets the sample duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
