use crate::error::ErrorKind;
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Callbacks raised by a session towards its owner and the upload side.
///
/// Every method has an empty default so observers implement only what they
/// need. Callbacks are never invoked while the session's lock is held, so
/// they may call back into the session.
pub trait SessionObserver: Send + Sync {
    /// New bytes appeared in the active output file: `length` bytes starting at `offset`.
    fn on_segment_growth(&self, _path: &Path, _offset: u64, _length: u64) {}

    /// A segment was finalized and is complete on disk.
    fn on_segment_complete(&self, _path: &Path, _file_number: u32) {}

    /// The session failed. Terminal.
    fn on_error(&self, _kind: ErrorKind, _detail: &str) {}

    /// The session ended normally. Terminal.
    fn on_finished(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Owned form of a [`SessionObserver`] callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotification {
    /// New bytes were written to the active file
    SegmentGrowth {
        /// File that grew
        path: PathBuf,
        /// Where the new bytes begin
        offset: u64,
        /// Number of new bytes
        length: u64,
    },
    /// A segment was finalized
    SegmentComplete {
        /// Finalized file
        path: PathBuf,
        /// Segment number of the file
        file_number: u32,
    },
    /// The session failed and closed
    Error {
        /// Category of the failure
        kind: ErrorKind,
        /// Human readable description
        detail: String,
    },
    /// The session stopped cleanly
    Finished,
}

impl SessionNotification {
    /// Whether this is one of the two terminal callbacks.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionNotification::Error { .. } | SessionNotification::Finished
        )
    }

    fn deliver(&self, observer: &dyn SessionObserver) {
        match self {
            SessionNotification::SegmentGrowth {
                path,
                offset,
                length,
            } => observer.on_segment_growth(path, *offset, *length),
            SessionNotification::SegmentComplete { path, file_number } => {
                observer.on_segment_complete(path, *file_number)
            }
            SessionNotification::Error { kind, detail } => observer.on_error(*kind, detail),
            SessionNotification::Finished => observer.on_finished(),
        }
    }
}

/// Forwards every callback onto an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionNotification>,
}

impl ChannelObserver {
    /// Creates the observer together with the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, notification: SessionNotification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_segment_growth(&self, path: &Path, offset: u64, length: u64) {
        self.send(SessionNotification::SegmentGrowth {
            path: path.to_owned(),
            offset,
            length,
        });
    }

    fn on_segment_complete(&self, path: &Path, file_number: u32) {
        self.send(SessionNotification::SegmentComplete {
            path: path.to_owned(),
            file_number,
        });
    }

    fn on_error(&self, kind: ErrorKind, detail: &str) {
        self.send(SessionNotification::Error {
            kind,
            detail: detail.to_string(),
        });
    }

    fn on_finished(&self) {
        self.send(SessionNotification::Finished);
    }
}

/// Delivers queued notifications and guarantees a single terminal callback.
#[derive(Clone)]
pub(crate) struct Reporter {
    observer: Arc<dyn SessionObserver>,
    terminal_sent: Arc<AtomicBool>,
}

impl Reporter {
    pub(crate) fn new(observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            observer,
            terminal_sent: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn dispatch(&self, notifications: Vec<SessionNotification>) {
        for notification in notifications {
            // Nothing follows the terminal callback
            if self.terminal_sent.load(Ordering::SeqCst)
                || (notification.is_terminal() && self.terminal_sent.swap(true, Ordering::SeqCst))
            {
                debug!("Suppressing {:?} after terminal notification", notification);
                continue;
            }
            match &notification {
                SessionNotification::Error { kind, detail } => {
                    error!("Session failed ({:?}): {}", kind, detail)
                }
                SessionNotification::Finished => info!("Session finished"),
                _ => {}
            }
            notification.deliver(self.observer.as_ref());
        }
    }
}
