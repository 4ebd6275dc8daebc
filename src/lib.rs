#![doc(html_root_url = "https://docs.rs/avsession/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # avsession - Live capture encoding sessions
//!
//! `avsession` drives a live audio/video capture into container files. A
//! capture source announces its stream formats and pushes timestamped
//! samples; the session sets up one encoder track per media kind, waits
//! until every required track is ready, forwards samples to the active
//! writer, and rolls over to a new numbered file at a fixed interval.
//!
//! ## Features
//!
//! ### Session
//! - Readiness gate across the audio and video tracks
//! - Lock-light sample routing from any capture thread
//! - Timed segment rollover (`capture_0.mp4`, `capture_1.mp4`, ...)
//! - Exactly one terminal callback per session
//!
//! ### Output
//! - Pluggable [`format::ContainerWriter`] backends
//! - Growth notifications for incremental upload of the file being written
//! - Finalize watchdog
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use avsession::av::{CodecType, FormatDescription, MediaKind, MediaSample, PixelFormat};
//! use avsession::format::MemoryWriterFactory;
//! use avsession::report::ChannelObserver;
//! use avsession::{Session, SessionConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (observer, mut notifications) = ChannelObserver::new();
//!     let session = Session::new(
//!         SessionConfig::new().with_fragment_interval(Duration::from_secs(60)),
//!         Arc::new(MemoryWriterFactory::new()),
//!         Arc::new(observer),
//!     )?;
//!
//!     session.start("file:///var/capture/clip.mp4", None)?;
//!     session.on_format_available(
//!         MediaKind::Video,
//!         FormatDescription::video(CodecType::H264, 1920, 1080, PixelFormat::Nv12),
//!     )?;
//!     session.on_format_available(
//!         MediaKind::Audio,
//!         FormatDescription::audio(CodecType::AAC, 48000, 2),
//!     )?;
//!
//!     session.on_sample(&MediaSample::video(Duration::ZERO, vec![0u8; 4096]));
//!     session.stop();
//!
//!     while let Some(notification) = notifications.recv().await {
//!         println!("{:?}", notification);
//!         if notification.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: media kinds, codecs, format descriptions and samples
//! - `encoder`: format binding, track setup and readiness
//! - `session`: the session state machine, sample router and rollover
//! - `format`: the container writer seam and an in-memory writer
//! - `watch`: output file growth polling
//! - `report`: observer callbacks
//! - `config`: process-wide defaults and per-session configuration
//! - `error`: error types and the crate `Result`

/// Audio/Video base types
pub mod av;

/// Process and session configuration
pub mod config;

/// Encoder track setup and readiness
pub mod encoder;

/// Error types and utilities
pub mod error;

/// Container writer interface and implementations
pub mod format;

/// Session callbacks
pub mod report;

/// Capture encoding session
pub mod session;

/// Output file watching
pub mod watch;

pub use config::SessionConfig;
pub use error::{CaptureError, ErrorKind, Result};
pub use report::{SessionNotification, SessionObserver};
pub use session::{RouteOutcome, Session, SessionState};
