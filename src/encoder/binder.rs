use super::track::default_video_bitrate;
use crate::av::{FormatDescription, MediaKind, VideoOrientation};
use crate::config::SessionConfig;
use crate::error::Result;
use log::{info, warn};

/// What happened to a format binding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The description is now the active format for its kind.
    Bound,
    /// A format was already bound for this kind; the request was dropped.
    Ignored,
}

/// A format description together with the encoding parameters decided for it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFormat {
    /// Format as received from the capture source
    pub description: FormatDescription,
    /// Bitrate the track is encoded at
    pub bits_per_second: u32,
    /// Only set for video
    pub orientation: Option<VideoOrientation>,
}

/// Holds at most one format description per track kind for a session.
#[derive(Debug, Clone)]
pub struct FormatBinder {
    formats: [Option<BoundFormat>; 2],
    audio_bitrate: u32,
    video_bitrate: Option<u32>,
    video_orientation: VideoOrientation,
}

impl FormatBinder {
    /// Creates an empty binder using the bitrate defaults of `config`.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            formats: [None, None],
            audio_bitrate: config.audio_bitrate,
            video_bitrate: config.video_bitrate,
            video_orientation: config.video_orientation,
        }
    }

    /// Validates and stores `description` for `kind`.
    ///
    /// Capture sources may announce the same format more than once, so a
    /// second binding for a kind is ignored with a warning rather than failing.
    pub fn bind(
        &mut self,
        kind: MediaKind,
        description: FormatDescription,
        bits_per_second: Option<u32>,
        orientation: Option<VideoOrientation>,
    ) -> Result<BindOutcome> {
        description.validate(kind)?;

        if let Some(existing) = &self.formats[kind.index()] {
            if existing.description != description {
                warn!(
                    "Ignoring new {} format {:?}, already bound to {:?}",
                    kind, description, existing.description
                );
            } else {
                warn!("Ignoring duplicate {} format binding", kind);
            }
            return Ok(BindOutcome::Ignored);
        }

        let bits_per_second = bits_per_second.unwrap_or_else(|| self.default_bitrate(&description));
        let orientation = match kind {
            MediaKind::Video => Some(orientation.unwrap_or(self.video_orientation)),
            MediaKind::Audio => None,
        };
        info!("Bound {} format at {} bps", kind, bits_per_second);

        self.formats[kind.index()] = Some(BoundFormat {
            description,
            bits_per_second,
            orientation,
        });
        Ok(BindOutcome::Bound)
    }

    fn default_bitrate(&self, description: &FormatDescription) -> u32 {
        match description {
            FormatDescription::Audio(_) => self.audio_bitrate,
            FormatDescription::Video(v) => self
                .video_bitrate
                .unwrap_or_else(|| default_video_bitrate(v.width, v.height)),
        }
    }

    /// Format bound for `kind`, if any.
    pub fn get(&self, kind: MediaKind) -> Option<&BoundFormat> {
        self.formats[kind.index()].as_ref()
    }

    /// Releases the format bound for `kind` so a later bind is accepted.
    pub fn unbind(&mut self, kind: MediaKind) -> Option<BoundFormat> {
        self.formats[kind.index()].take()
    }

    /// Whether a format is bound for `kind`.
    pub fn is_bound(&self, kind: MediaKind) -> bool {
        self.get(kind).is_some()
    }

    /// Bound formats, audio first.
    pub fn iter(&self) -> impl Iterator<Item = (MediaKind, &BoundFormat)> + '_ {
        MediaKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|f| (kind, f)))
    }
}
