use crate::av::{CodecType, FormatDescription, MediaKind, VideoOrientation};
use crate::error::{CaptureError, Result};
use crate::format::{ContainerWriter, TrackId};
use log::{debug, info};

const SMALL_FRAME_PIXELS: u64 = 640 * 480;
const SMALL_FRAME_BITS_PER_PIXEL: f64 = 4.05;
const LARGE_FRAME_BITS_PER_PIXEL: f64 = 11.4;

/// Encoder settings for an audio input.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    /// Output codec
    pub codec: CodecType,
    /// Samples per second
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Target bitrate
    pub bits_per_second: u32,
    /// Input is fed from a live source and must not stall it
    pub real_time: bool,
}

/// Encoder settings for a video input.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSettings {
    /// Output codec
    pub codec: CodecType,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Target bitrate
    pub bits_per_second: u32,
    /// Frames between forced keyframes
    pub max_keyframe_interval: u32,
    /// Clockwise rotation applied by players, in degrees
    pub rotation_degrees: u32,
    /// Input is fed from a live source and must not stall it
    pub real_time: bool,
}

/// Settings handed to [`ContainerWriter::add_track`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrackSettings {
    /// Audio track settings
    Audio(AudioSettings),
    /// Video track settings
    Video(VideoSettings),
}

impl TrackSettings {
    /// Kind of track these settings describe.
    pub fn kind(&self) -> MediaKind {
        match self {
            TrackSettings::Audio(_) => MediaKind::Audio,
            TrackSettings::Video(_) => MediaKind::Video,
        }
    }

    /// Target bitrate of the track.
    pub fn bits_per_second(&self) -> u32 {
        match self {
            TrackSettings::Audio(a) => a.bits_per_second,
            TrackSettings::Video(v) => v.bits_per_second,
        }
    }
}

/// Parameters that are not part of the format description itself.
#[derive(Debug, Clone, Copy)]
pub struct TrackOptions {
    /// Target bitrate
    pub bits_per_second: u32,
    /// Frames between forced keyframes
    pub max_keyframe_interval: u32,
    /// Orientation the video is encoded in
    pub reference_orientation: VideoOrientation,
    /// Orientation the device reported
    pub video_orientation: VideoOrientation,
}

/// A track attached to one writer.
#[derive(Debug, Clone)]
pub struct EncoderTrack {
    kind: MediaKind,
    id: TrackId,
    settings: TrackSettings,
    description: FormatDescription,
}

impl EncoderTrack {
    /// Kind of the track.
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Writer handle for the track.
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Settings the writer was given.
    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    /// Format the track was built from.
    pub fn description(&self) -> &FormatDescription {
        &self.description
    }
}

/// Bitrate for a video frame size when none is configured.
pub fn default_video_bitrate(width: u32, height: u32) -> u32 {
    let pixels = width as u64 * height as u64;
    let bits_per_pixel = if pixels < SMALL_FRAME_PIXELS {
        SMALL_FRAME_BITS_PER_PIXEL
    } else {
        LARGE_FRAME_BITS_PER_PIXEL
    };
    (pixels as f64 * bits_per_pixel).min(u32::MAX as f64) as u32
}

/// Builds encoder settings for `description`.
pub fn build_settings(description: &FormatDescription, options: &TrackOptions) -> TrackSettings {
    match description {
        FormatDescription::Audio(audio) => TrackSettings::Audio(AudioSettings {
            codec: audio.codec,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            bits_per_second: options.bits_per_second,
            real_time: true,
        }),
        FormatDescription::Video(video) => TrackSettings::Video(VideoSettings {
            codec: video.codec,
            width: video.width,
            height: video.height,
            bits_per_second: options.bits_per_second,
            max_keyframe_interval: options.max_keyframe_interval,
            rotation_degrees: options
                .video_orientation
                .rotation_from(options.reference_orientation),
            real_time: true,
        }),
    }
}

/// Attaches a track for `description` to `writer`.
///
/// Fails if `writer_started` is set or `existing` already holds a track of
/// this kind. Nothing is recorded unless the writer accepted the input.
pub fn setup_track(
    kind: MediaKind,
    writer: &dyn ContainerWriter,
    description: &FormatDescription,
    options: &TrackOptions,
    writer_started: bool,
    existing: &TrackSet,
) -> Result<EncoderTrack> {
    description.validate(kind)?;
    if writer_started {
        return Err(CaptureError::Setup(format!(
            "cannot add {} track after writing started",
            kind
        )));
    }
    if existing.get(kind).is_some() {
        return Err(CaptureError::Setup(format!("{} track already attached", kind)));
    }

    let settings = build_settings(description, options);
    debug!("Adding {} track: {:?}", kind, settings);
    let id = writer.add_track(kind, &settings).map_err(|e| match e {
        CaptureError::Setup(msg) => CaptureError::Setup(msg),
        other => CaptureError::Setup(format!("writer refused {} track: {}", kind, other)),
    })?;
    info!(
        "{} track {:?} attached at {} bps",
        kind,
        id,
        settings.bits_per_second()
    );

    Ok(EncoderTrack {
        kind,
        id,
        settings,
        description: description.clone(),
    })
}

/// The tracks attached to the active writer, at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct TrackSet {
    tracks: [Option<EncoderTrack>; 2],
}

impl TrackSet {
    /// Track attached for `kind`, if any.
    pub fn get(&self, kind: MediaKind) -> Option<&EncoderTrack> {
        self.tracks[kind.index()].as_ref()
    }

    /// Adds `track`, replacing any track of the same kind.
    pub fn insert(&mut self, track: EncoderTrack) {
        let slot = track.kind.index();
        self.tracks[slot] = Some(track);
    }

    /// Forgets every track.
    pub fn clear(&mut self) {
        self.tracks = [None, None];
    }

    /// Number of attached tracks.
    pub fn len(&self) -> usize {
        self.tracks.iter().flatten().count()
    }

    /// Whether no track is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
