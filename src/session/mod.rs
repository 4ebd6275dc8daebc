//! # Capture encoding session
//!
//! A [`Session`] sits between a capture source and a container writer:
//!
//! ```text
//! capture ── on_format_available ──► FormatBinder ──► setup_track ──► ReadinessTracker
//!         └─ on_sample ────────────► router ── append ──► ContainerWriter (segment N)
//!                                                         │ finalize
//!                                          rollover ◄─────┘ segment N+1
//! ```
//!
//! State, readiness flags, and the active writer are guarded by one lock.
//! Asynchronous completions (finalize, fragment timers, writer failures)
//! are sent as [`SessionEvent`]s to a single task that applies them under
//! that same lock, so every transition is serialized.

use crate::av::{FormatDescription, MediaKind, MediaSample, VideoOrientation};
use crate::config::SessionConfig;
use crate::encoder::{BindOutcome, BoundFormat, FormatBinder, ReadinessTracker, TrackSet};
use crate::error::{CaptureError, Result};
use crate::format::WriterFactory;
use crate::report::{Reporter, SessionNotification, SessionObserver};
use crate::watch::{FileWatcher, LengthSample, LengthSink};
use log::{debug, warn};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

mod lifecycle;
mod router;
mod segment;

pub use router::{DropReason, RouteOutcome, StatsSnapshot};
pub use segment::{SegmentDescriptor, SegmentNaming};

use router::IngestionStats;
use segment::ActiveSegment;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, `start` not called yet
    Idle,
    /// A writer is open but not every required track is ready, or the
    /// first sample has not arrived
    AwaitingTracks,
    /// Samples are being forwarded
    Writing,
    /// The current segment is being finalized
    Finishing,
    /// Terminal
    Closed,
}

/// Completion signals fed back into the session's event task.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    FragmentElapsed {
        file_number: u32,
    },
    Finalized {
        file_number: u32,
        path: PathBuf,
        result: Result<()>,
    },
    WriterFailed {
        detail: String,
    },
    FileLength(LengthSample),
}

pub(crate) struct Inner {
    state: SessionState,
    binder: FormatBinder,
    readiness: ReadinessTracker,
    tracks: TrackSet,
    naming: Option<SegmentNaming>,
    fragment_interval: Option<Duration>,
    segment: Option<Arc<ActiveSegment>>,
    /// File number of the segment whose finalize is in flight
    finishing: Option<u32>,
    stop_requested: bool,
    watcher: Option<FileWatcher>,
    outbox: Vec<SessionNotification>,
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    config: SessionConfig,
    factory: Arc<dyn WriterFactory>,
    reporter: Reporter,
    stats: IngestionStats,
    events: mpsc::UnboundedSender<SessionEvent>,
    runtime: Handle,
}

impl Shared {
    /// Runs `f` under the session lock, then delivers whatever it queued.
    fn with_inner<R>(&self, f: impl FnOnce(&Shared, &mut Inner) -> R) -> R {
        let (result, outbox) = {
            let mut inner = self.inner.lock();
            let result = f(self, &mut *inner);
            (result, std::mem::take(&mut inner.outbox))
        };
        self.reporter.dispatch(outbox);
        result
    }

    fn send_event(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            warn!("Session event loop is gone");
        }
    }

    fn handle_event(&self, event: SessionEvent) {
        debug!("Session event: {:?}", event);
        self.with_inner(|s, inner| match event {
            SessionEvent::FragmentElapsed { file_number } => {
                s.on_fragment_elapsed(inner, file_number)
            }
            SessionEvent::Finalized {
                file_number,
                path,
                result,
            } => s.on_finalized(inner, file_number, path, result),
            SessionEvent::WriterFailed { detail } => {
                s.fail(inner, CaptureError::WriterFatal(detail))
            }
            SessionEvent::FileLength(sample) => {
                let growth = inner.watcher.as_mut().and_then(|w| w.observe(&sample));
                inner.outbox.extend(growth);
            }
        });
    }

    fn bind(
        &self,
        kind: MediaKind,
        description: FormatDescription,
        bits_per_second: Option<u32>,
        orientation: Option<VideoOrientation>,
    ) -> Result<BindOutcome> {
        self.with_inner(|s, inner| {
            if inner.state == SessionState::Closed {
                return Err(CaptureError::Configuration(format!(
                    "cannot bind {} format to a closed session",
                    kind
                )));
            }
            let outcome = inner
                .binder
                .bind(kind, description, bits_per_second, orientation)?;
            if outcome == BindOutcome::Ignored {
                return Ok(outcome);
            }

            // Without a writer the format is attached when the next segment opens
            let Some(segment) = inner.segment.clone() else {
                return Ok(outcome);
            };
            let format = inner
                .binder
                .get(kind)
                .cloned()
                .ok_or_else(|| CaptureError::Configuration(format!("{} format lost", kind)))?;
            if let Err(e) = s.attach_track(inner, &segment, kind, &format) {
                if segment.is_started() {
                    // Attached when the next segment opens
                    warn!("{} format bound but not attached: {}", kind, e);
                } else {
                    warn!("{} track refused, format released for a retry: {}", kind, e);
                    inner.binder.unbind(kind);
                }
                return Err(e);
            }
            Ok(outcome)
        })
    }
}

async fn drive_events(shared: Weak<Shared>, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle_event(event);
    }
}

/// A live capture encoding session.
///
/// Cheap to clone; clones share the same session, so capture threads and
/// the controlling thread can each hold one.
///
/// # Example
///
/// ```rust,no_run
/// use avsession::av::{CodecType, FormatDescription, MediaSample, PixelFormat};
/// use avsession::config::SessionConfig;
/// use avsession::format::MemoryWriterFactory;
/// use avsession::report::NullObserver;
/// use avsession::session::Session;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = SessionConfig::new().with_fragment_interval(Duration::from_secs(60));
///     let factory = Arc::new(MemoryWriterFactory::new());
///     let session = Session::new(config, factory, Arc::new(NullObserver))?;
///
///     session.start("file:///tmp/capture.mp4", None)?;
///     session.bind_video_format(
///         FormatDescription::video(CodecType::H264, 1280, 720, PixelFormat::Nv12),
///         None,
///         None,
///     )?;
///     session.bind_audio_format(FormatDescription::audio(CodecType::AAC, 44100, 2), None)?;
///
///     session.on_sample(&MediaSample::video(Duration::ZERO, vec![0u8; 1024]));
///     session.stop();
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Creates an idle session on the current tokio runtime.
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn WriterFactory>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            CaptureError::Configuration("a session must be created inside a tokio runtime".into())
        })?;
        Self::with_handle(config, factory, observer, runtime)
    }

    /// Creates an idle session that spawns its tasks onto `runtime`.
    pub fn with_handle(
        config: SessionConfig,
        factory: Arc<dyn WriterFactory>,
        observer: Arc<dyn SessionObserver>,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = config.watch_output_file.then(|| {
            let events = tx.clone();
            let sink: LengthSink = Arc::new(move |sample| {
                let _ = events.send(SessionEvent::FileLength(sample));
            });
            FileWatcher::with_handle(sink, config.watch_poll_interval, runtime.clone())
        });
        let inner = Inner {
            state: SessionState::Idle,
            binder: FormatBinder::new(&config),
            readiness: ReadinessTracker::new(config.required_tracks),
            tracks: TrackSet::default(),
            naming: None,
            fragment_interval: config.fragment_interval,
            segment: None,
            finishing: None,
            stop_requested: false,
            watcher,
            outbox: Vec::new(),
        };
        let shared = Arc::new(Shared {
            inner: Mutex::new(inner),
            config,
            factory,
            reporter: Reporter::new(observer),
            stats: IngestionStats::default(),
            events: tx,
            runtime: runtime.clone(),
        });

        runtime.spawn(drive_events(Arc::downgrade(&shared), rx));
        Ok(Self { shared })
    }

    /// Opens segment 0 at `destination` (a `file:` URL or absolute path).
    ///
    /// `fragment_interval` overrides the configured interval.
    pub fn start(&self, destination: &str, fragment_interval: Option<Duration>) -> Result<()> {
        self.shared
            .with_inner(|s, inner| s.start(inner, destination, fragment_interval))
    }

    /// Inbound format announcement from the capture source, using configured defaults.
    pub fn on_format_available(
        &self,
        kind: MediaKind,
        description: FormatDescription,
    ) -> Result<BindOutcome> {
        self.shared.bind(kind, description, None, None)
    }

    /// Binds the audio format; `bits_per_second` defaults to the configured bitrate.
    pub fn bind_audio_format(
        &self,
        description: FormatDescription,
        bits_per_second: Option<u32>,
    ) -> Result<BindOutcome> {
        self.shared
            .bind(MediaKind::Audio, description, bits_per_second, None)
    }

    /// Binds the video format; bitrate and orientation default to configuration.
    pub fn bind_video_format(
        &self,
        description: FormatDescription,
        bits_per_second: Option<u32>,
        orientation: Option<VideoOrientation>,
    ) -> Result<BindOutcome> {
        self.shared
            .bind(MediaKind::Video, description, bits_per_second, orientation)
    }

    /// Routes one sample. Never blocks on finalization and never fails the session
    /// because of a single rejected sample.
    pub fn on_sample(&self, sample: &MediaSample) -> RouteOutcome {
        self.shared.route(sample)
    }

    /// Finalizes the current segment and continues in a new file.
    ///
    /// Returns `false` when no segment is being written.
    pub fn rotate(&self) -> bool {
        self.shared.with_inner(|s, inner| {
            if inner.state != SessionState::Writing {
                debug!("Rotate ignored while {:?}", inner.state);
                return false;
            }
            s.begin_finalize(inner);
            true
        })
    }

    /// Ends the session. Safe to call any number of times from any thread.
    pub fn stop(&self) {
        self.shared.with_inner(|s, inner| s.stop(inner));
    }

    /// Escalates an asynchronous writer failure; the session closes with an error.
    pub fn report_writer_failure(&self, detail: impl Into<String>) {
        self.shared.send_event(SessionEvent::WriterFailed {
            detail: detail.into(),
        });
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    /// Whether `kind` has a track on the active writer.
    pub fn is_ready(&self, kind: MediaKind) -> bool {
        self.shared.inner.lock().readiness.is_ready(kind)
    }

    /// Whether every required kind is ready.
    pub fn all_required_ready(&self) -> bool {
        self.shared.inner.lock().readiness.all_required_ready()
    }

    /// Format bound for `kind`, if any.
    pub fn bound_format(&self, kind: MediaKind) -> Option<BoundFormat> {
        self.shared.inner.lock().binder.get(kind).cloned()
    }

    /// The segment currently open for writing, if any.
    pub fn segment(&self) -> Option<SegmentDescriptor> {
        let inner = self.shared.inner.lock();
        let offset = inner.watcher.as_ref().map(|w| w.offset()).unwrap_or(0);
        inner.segment.as_ref().map(|s| s.descriptor(offset))
    }

    /// Router counters so far.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Configuration the session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }
}
