//! # Encoder tracks
//!
//! Everything between a format description arriving from the capture source
//! and a writer input that accepts samples:
//!
//! - [`FormatBinder`] keeps one description per kind and decides its bitrate
//! - [`setup_track`] turns a bound format into writer settings and attaches it
//! - [`ReadinessTracker`] derives the "multiplexing may begin" gate

/// Format description binding and bitrate policy
pub mod binder;

/// Readiness flags for audio and video
pub mod readiness;

/// Track settings and writer attachment
pub mod track;

pub use binder::{BindOutcome, BoundFormat, FormatBinder};
pub use readiness::ReadinessTracker;
pub use track::{
    build_settings, default_video_bitrate, setup_track, AudioSettings, EncoderTrack,
    TrackOptions, TrackSet, TrackSettings, VideoSettings,
};
