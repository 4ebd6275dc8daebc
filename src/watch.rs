use crate::error::{CaptureError, Result};
use crate::report::SessionNotification;
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One poll result: the watched file was `length` bytes long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthSample {
    /// Watch the sample belongs to; samples from an earlier watch are ignored
    pub generation: u64,
    /// File that was polled
    pub path: PathBuf,
    /// File length at poll time
    pub length: u64,
}

/// Receives length samples from the poll task.
pub type LengthSink = Arc<dyn Fn(LengthSample) + Send + Sync>;

struct ActiveWatch {
    generation: u64,
    path: PathBuf,
    offset: u64,
    task: JoinHandle<()>,
}

/// Polls the active output file and turns its growth into notifications.
///
/// The poll task only samples the file length and hands it to the sink. The
/// owner feeds samples back through [`FileWatcher::observe`], so the reported
/// offset only advances where the owner serializes it. A file that is
/// momentarily missing (e.g. during rollover) is skipped silently.
pub struct FileWatcher {
    sink: LengthSink,
    poll_interval: Duration,
    runtime: Handle,
    generation: u64,
    active: Option<ActiveWatch>,
}

impl FileWatcher {
    /// Creates a watcher that spawns onto the current tokio runtime.
    pub fn new(sink: LengthSink, poll_interval: Duration) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            CaptureError::Configuration("file watcher requires a tokio runtime".into())
        })?;
        Ok(Self::with_handle(sink, poll_interval, runtime))
    }

    /// Creates a watcher that spawns its poll tasks onto `runtime`.
    pub fn with_handle(sink: LengthSink, poll_interval: Duration, runtime: Handle) -> Self {
        Self {
            sink,
            poll_interval,
            runtime,
            generation: 0,
            active: None,
        }
    }

    /// Starts watching `path` from offset zero, replacing any previous watch.
    pub fn enable(&mut self, path: impl Into<PathBuf>) {
        self.disable();

        let path = path.into();
        self.generation += 1;
        debug!("Watching {}", path.display());

        let task = self.runtime.spawn(poll_file(
            self.generation,
            path.clone(),
            self.poll_interval,
            self.sink.clone(),
        ));
        self.active = Some(ActiveWatch {
            generation: self.generation,
            path,
            offset: 0,
            task,
        });
    }

    /// Applies a length sample, returning the growth it reveals.
    ///
    /// Samples from a disabled or replaced watch return `None`.
    pub fn observe(&mut self, sample: &LengthSample) -> Option<SessionNotification> {
        let watch = self.active.as_mut()?;
        if watch.generation != sample.generation {
            return None;
        }
        if sample.length < watch.offset {
            debug!(
                "{} shrank to {} bytes, rewinding",
                watch.path.display(),
                sample.length
            );
            watch.offset = sample.length;
            return None;
        }
        if sample.length == watch.offset {
            return None;
        }
        let offset = watch.offset;
        watch.offset = sample.length;
        Some(SessionNotification::SegmentGrowth {
            path: watch.path.clone(),
            offset,
            length: sample.length - offset,
        })
    }

    /// Stops watching. Returns the last offset that was reported.
    pub fn disable(&mut self) -> Option<u64> {
        self.active.take().map(|watch| {
            watch.task.abort();
            debug!("Stopped watching {}", watch.path.display());
            watch.offset
        })
    }

    /// Stops watching and returns the bytes written since the last reported offset.
    ///
    /// Used when a segment completes so the trailer written by finalize is
    /// reported before the completion notification. Stats the file
    /// synchronously, once; callers may hold a lock across it.
    pub fn disable_with_tail(&mut self) -> Option<SessionNotification> {
        let watch = self.active.take()?;
        watch.task.abort();

        let len = match std::fs::metadata(&watch.path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("cannot stat {}: {}", watch.path.display(), e);
                }
                return None;
            }
        };
        (len > watch.offset).then(|| SessionNotification::SegmentGrowth {
            offset: watch.offset,
            length: len - watch.offset,
            path: watch.path,
        })
    }

    /// Whether a file is being watched.
    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// The watched file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.active.as_ref().map(|w| w.path.as_path())
    }

    /// Bytes of the watched file reported so far.
    pub fn offset(&self) -> u64 {
        self.active.as_ref().map(|w| w.offset).unwrap_or(0)
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.disable();
    }
}

async fn poll_file(generation: u64, path: PathBuf, poll_interval: Duration, sink: LengthSink) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_sent = None;
    loop {
        ticker.tick().await;
        match current_length(&path).await {
            Ok(Some(length)) if last_sent != Some(length) => {
                last_sent = Some(length);
                sink(LengthSample {
                    generation,
                    path: path.clone(),
                    length,
                });
            }
            Ok(_) => {}
            Err(e) => warn!("{}", e),
        }
    }
}

/// Length of `path`, or `None` if it does not exist right now.
pub(crate) async fn current_length(path: &Path) -> Result<Option<u64>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CaptureError::FileWatch(format!(
            "cannot stat {}: {}",
            path.display(),
            e
        ))),
    }
}
