//! # Container writer boundary
//!
//! The session never encodes or muxes by itself. It drives an opaque
//! [`ContainerWriter`], one per output segment, obtained from a
//! [`WriterFactory`]:
//!
//! 1. `add_track` once per bound format, before the writer is started
//! 2. `start_session` at the timestamp of the first routed sample
//! 3. `append` for every forwarded sample
//! 4. `finalize` exactly once, or `cancel` if the session never started
//!
//! Appends come straight from capture threads, so they are synchronous and
//! take `&self`. Finalization may take a while and is awaited on the
//! session's runtime.

use crate::av::{MediaKind, MediaSample};
use crate::encoder::TrackSettings;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Recording writer used by tests and dry runs.
pub mod memory;

pub use memory::{MemoryWriter, MemoryWriterFactory};

/// Handle a writer hands back for an attached track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u32);

/// A muxing sink bound to exactly one output file.
#[async_trait]
pub trait ContainerWriter: Send + Sync {
    /// Attaches a new input track. Only valid before `start_session`.
    fn add_track(&self, kind: MediaKind, settings: &TrackSettings) -> Result<TrackId>;

    /// Starts the media timeline at `at`.
    fn start_session(&self, at: Duration) -> Result<()>;

    /// Appends one sample to `track`.
    ///
    /// Returning [`CaptureError::WriterFatal`](crate::CaptureError::WriterFatal)
    /// ends the session; any other error only drops this sample.
    fn append(&self, track: TrackId, sample: &MediaSample) -> Result<()>;

    /// Flushes and closes the output file.
    async fn finalize(&self) -> Result<()>;

    /// Abandons the output without finalizing it.
    fn cancel(&self) {}
}

/// Opens a fresh writer for every segment.
pub trait WriterFactory: Send + Sync {
    /// Creates the writer for segment `file_number` at `path`.
    fn create_writer(&self, path: &Path, file_number: u32) -> Result<Arc<dyn ContainerWriter>>;
}
