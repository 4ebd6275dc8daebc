//! In-memory [`ContainerWriter`] that records every call it receives.
//!
//! Useful for exercising sessions without a real muxer. Faults can be
//! injected through [`FaultPlan`] to simulate encoder stalls, refused
//! tracks, and finalize failures.

use super::{ContainerWriter, TrackId, WriterFactory};
use crate::av::{MediaKind, MediaSample};
use crate::encoder::TrackSettings;
use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Faults shared by a factory and every writer it creates.
#[derive(Debug, Default)]
pub struct FaultPlan {
    reject_appends: AtomicU32,
    fatal_appends: AtomicBool,
    refuse_tracks: AtomicBool,
    fail_start: AtomicBool,
    fail_finalize: AtomicBool,
    finalize_io_error: AtomicBool,
    stall_finalize: AtomicBool,
    fail_create: AtomicBool,
}

impl FaultPlan {
    /// Rejects the next `count` appends as transient failures.
    pub fn reject_appends(&self, count: u32) {
        self.reject_appends.store(count, Ordering::SeqCst);
    }

    /// Makes every append fail unrecoverably.
    pub fn fatal_appends(&self, enable: bool) {
        self.fatal_appends.store(enable, Ordering::SeqCst);
    }

    /// Makes `add_track` fail.
    pub fn refuse_tracks(&self, enable: bool) {
        self.refuse_tracks.store(enable, Ordering::SeqCst);
    }

    /// Makes `start_session` fail.
    pub fn fail_start(&self, enable: bool) {
        self.fail_start.store(enable, Ordering::SeqCst);
    }

    /// Makes `finalize` fail with a fatal error.
    pub fn fail_finalize(&self, enable: bool) {
        self.fail_finalize.store(enable, Ordering::SeqCst);
    }

    /// Makes `finalize` fail with an I/O error instead of a writer error.
    pub fn finalize_io_error(&self, enable: bool) {
        self.finalize_io_error.store(enable, Ordering::SeqCst);
    }

    /// Makes `finalize` never complete.
    pub fn stall_finalize(&self, enable: bool) {
        self.stall_finalize.store(enable, Ordering::SeqCst);
    }

    /// Makes the factory refuse to create writers.
    pub fn fail_create(&self, enable: bool) {
        self.fail_create.store(enable, Ordering::SeqCst);
    }

    fn take_rejection(&self) -> bool {
        self.reject_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// A sample as seen by the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendedSample {
    /// Track the sample went to
    pub track: TrackId,
    /// Kind of the sample
    pub kind: MediaKind,
    /// Presentation timestamp
    pub pts: Duration,
    /// Payload size in bytes
    pub len: usize,
}

#[derive(Debug, Default)]
struct WriterLog {
    tracks: Vec<(TrackId, MediaKind, TrackSettings)>,
    started_at: Option<Duration>,
    start_calls: u32,
    appended: Vec<AppendedSample>,
    finalize_calls: u32,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct OpenCounter {
    open: AtomicUsize,
    max_open: AtomicUsize,
}

/// Writer that keeps everything in memory, optionally mirroring payloads to disk.
#[derive(Debug)]
pub struct MemoryWriter {
    path: PathBuf,
    file_number: u32,
    log: Mutex<WriterLog>,
    file: Mutex<Option<File>>,
    faults: Arc<FaultPlan>,
    counter: Arc<OpenCounter>,
    closed: AtomicBool,
}

impl MemoryWriter {
    /// Output path of the writer.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Segment number the writer was created for.
    pub fn file_number(&self) -> u32 {
        self.file_number
    }

    /// Tracks attached so far.
    pub fn tracks(&self) -> Vec<(TrackId, MediaKind, TrackSettings)> {
        self.log.lock().tracks.clone()
    }

    /// Timestamp the writer session started at.
    pub fn started_at(&self) -> Option<Duration> {
        self.log.lock().started_at
    }

    /// Number of `start_session` calls.
    pub fn start_calls(&self) -> u32 {
        self.log.lock().start_calls
    }

    /// Every accepted sample in order.
    pub fn appended(&self) -> Vec<AppendedSample> {
        self.log.lock().appended.clone()
    }

    /// Timestamps appended for one kind, in append order.
    pub fn appended_pts(&self, kind: MediaKind) -> Vec<Duration> {
        self.log
            .lock()
            .appended
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.pts)
            .collect()
    }

    /// Number of `finalize` calls.
    pub fn finalize_calls(&self) -> u32 {
        self.log.lock().finalize_calls
    }

    /// Whether `cancel` was called.
    pub fn is_cancelled(&self) -> bool {
        self.log.lock().cancelled
    }

    /// Whether the writer was finalized or cancelled.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counter.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ContainerWriter for MemoryWriter {
    fn add_track(&self, kind: MediaKind, settings: &TrackSettings) -> Result<TrackId> {
        if self.faults.refuse_tracks.load(Ordering::SeqCst) {
            return Err(CaptureError::Setup(format!("{} track refused", kind)));
        }
        let mut log = self.log.lock();
        if log.started_at.is_some() {
            return Err(CaptureError::Setup("writer already started".into()));
        }
        if log.tracks.iter().any(|(_, k, _)| *k == kind) {
            return Err(CaptureError::Setup(format!("writer already has a {} track", kind)));
        }
        let id = TrackId(log.tracks.len() as u32 + 1);
        log.tracks.push((id, kind, settings.clone()));
        Ok(id)
    }

    fn start_session(&self, at: Duration) -> Result<()> {
        if self.faults.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::WriterFatal("start refused".into()));
        }
        let mut log = self.log.lock();
        log.start_calls += 1;
        if log.started_at.is_some() {
            return Err(CaptureError::WriterFatal("session already started".into()));
        }
        log.started_at = Some(at);
        Ok(())
    }

    fn append(&self, track: TrackId, sample: &MediaSample) -> Result<()> {
        if self.faults.fatal_appends.load(Ordering::SeqCst) {
            return Err(CaptureError::WriterFatal("encoder failed".into()));
        }
        if self.faults.take_rejection() {
            return Err(CaptureError::Ingestion("encoder not ready for more data".into()));
        }
        if self.is_closed() {
            return Err(CaptureError::Ingestion("writer is closed".into()));
        }

        let mut log = self.log.lock();
        if log.started_at.is_none() {
            return Err(CaptureError::Ingestion("writer session not started".into()));
        }
        if !log.tracks.iter().any(|(id, _, _)| *id == track) {
            return Err(CaptureError::Ingestion(format!("unknown track {:?}", track)));
        }
        if let Some(file) = self.file.lock().as_mut() {
            file.write_all(&sample.data)?;
        }
        log.appended.push(AppendedSample {
            track,
            kind: sample.kind,
            pts: sample.pts,
            len: sample.len(),
        });
        Ok(())
    }

    async fn finalize(&self) -> Result<()> {
        self.log.lock().finalize_calls += 1;
        if self.faults.stall_finalize.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.faults.fail_finalize.load(Ordering::SeqCst) {
            return Err(CaptureError::WriterFatal("could not write trailer".into()));
        }
        if self.faults.finalize_io_error.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full").into());
        }
        if let Some(mut file) = self.file.lock().take() {
            file.flush()?;
        }
        debug!("Finalized segment {} at {}", self.file_number, self.path.display());
        self.close();
        Ok(())
    }

    fn cancel(&self) {
        self.log.lock().cancelled = true;
        self.file.lock().take();
        self.close();
    }
}

/// Factory for [`MemoryWriter`]s that keeps every writer it hands out.
#[derive(Debug, Default)]
pub struct MemoryWriterFactory {
    writers: Mutex<Vec<Arc<MemoryWriter>>>,
    faults: Arc<FaultPlan>,
    counter: Arc<OpenCounter>,
    file_backed: bool,
}

impl MemoryWriterFactory {
    /// Creates a factory whose writers only record calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also writes every appended payload to the segment path.
    pub fn file_backed() -> Self {
        Self {
            file_backed: true,
            ..Self::default()
        }
    }

    /// Faults shared by every writer of this factory.
    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// Writer created for segment `file_number`, if any.
    pub fn writer(&self, file_number: u32) -> Option<Arc<MemoryWriter>> {
        self.writers
            .lock()
            .iter()
            .find(|w| w.file_number == file_number)
            .cloned()
    }

    /// Every writer created so far.
    pub fn writers(&self) -> Vec<Arc<MemoryWriter>> {
        self.writers.lock().clone()
    }

    /// Highest number of writers that were open at the same time.
    pub fn max_concurrently_open(&self) -> usize {
        self.counter.max_open.load(Ordering::SeqCst)
    }
}

impl WriterFactory for MemoryWriterFactory {
    fn create_writer(&self, path: &Path, file_number: u32) -> Result<Arc<dyn ContainerWriter>> {
        if self.faults.fail_create.load(Ordering::SeqCst) {
            return Err(CaptureError::WriterFatal(format!(
                "cannot open {}",
                path.display()
            )));
        }
        let file = if self.file_backed {
            Some(File::create(path)?)
        } else {
            None
        };

        let open = self.counter.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counter.max_open.fetch_max(open, Ordering::SeqCst);

        let writer = Arc::new(MemoryWriter {
            path: path.to_owned(),
            file_number,
            log: Mutex::new(WriterLog::default()),
            file: Mutex::new(file),
            faults: self.faults.clone(),
            counter: self.counter.clone(),
            closed: AtomicBool::new(false),
        });
        self.writers.lock().push(writer.clone());
        Ok(writer)
    }
}
