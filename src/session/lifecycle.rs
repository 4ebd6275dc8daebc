//! Segment lifecycle: opening writers, finalizing them, rolling over, and
//! shutting the session down.
//!
//! Every function here runs with the session lock held. Anything slow
//! (finalize, timers) is spawned onto the runtime and reports back through
//! [`SessionEvent`]s.

use super::segment::{ActiveSegment, SegmentNaming};
use super::{Inner, SessionEvent, SessionState, Shared};
use crate::av::MediaKind;
use crate::encoder::{setup_track, BoundFormat, TrackOptions};
use crate::error::{CaptureError, ErrorKind, Result};
use crate::report::SessionNotification;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

impl Shared {
    pub(crate) fn start(
        &self,
        inner: &mut Inner,
        destination: &str,
        fragment_interval: Option<Duration>,
    ) -> Result<()> {
        if inner.state != SessionState::Idle {
            return Err(CaptureError::Configuration(format!(
                "cannot start a session that is {:?}",
                inner.state
            )));
        }
        if fragment_interval == Some(Duration::ZERO) {
            return Err(CaptureError::Configuration(
                "fragment interval must be non-zero".into(),
            ));
        }

        inner.naming = Some(SegmentNaming::parse(destination)?);
        inner.fragment_interval = fragment_interval.or(self.config.fragment_interval);
        info!(
            "Starting capture session at {} (fragment interval {:?})",
            destination, inner.fragment_interval
        );

        if let Err(e) = self.open_segment(inner, 0) {
            let e = writer_fatal("could not open segment 0", e);
            self.fail_with(inner, e.kind(), e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Creates the writer for `file_number` and re-attaches every bound format.
    pub(crate) fn open_segment(&self, inner: &mut Inner, file_number: u32) -> Result<()> {
        let path = inner
            .naming
            .as_ref()
            .map(|naming| naming.path_for(file_number))
            .ok_or_else(|| CaptureError::Configuration("session has no destination".into()))?;

        let writer = self.factory.create_writer(&path, file_number)?;
        let segment = Arc::new(ActiveSegment::new(file_number, path.clone(), writer));
        inner.tracks.clear();
        inner.segment = Some(segment.clone());
        inner.state = SessionState::AwaitingTracks;

        let bound: Vec<(MediaKind, BoundFormat)> = inner
            .binder
            .iter()
            .map(|(kind, format)| (kind, format.clone()))
            .collect();
        for (kind, format) in &bound {
            self.attach_track(inner, &segment, *kind, format)?;
        }

        if let Some(watcher) = inner.watcher.as_mut() {
            watcher.enable(path.clone());
        }
        info!(
            "Opened segment {} at {} with {} track(s)",
            file_number,
            path.display(),
            inner.tracks.len()
        );
        Ok(())
    }

    pub(crate) fn attach_track(
        &self,
        inner: &mut Inner,
        segment: &ActiveSegment,
        kind: MediaKind,
        format: &BoundFormat,
    ) -> Result<()> {
        let options = TrackOptions {
            bits_per_second: format.bits_per_second,
            max_keyframe_interval: self.config.max_keyframe_interval,
            reference_orientation: self.config.reference_orientation,
            video_orientation: format
                .orientation
                .unwrap_or(self.config.video_orientation),
        };
        let track = setup_track(
            kind,
            segment.writer.as_ref(),
            &format.description,
            &options,
            segment.is_started(),
            &inner.tracks,
        )?;
        inner.tracks.insert(track);
        if inner.readiness.mark_ready(kind) {
            debug!("{} track ready", kind);
        }
        Ok(())
    }

    pub(crate) fn arm_fragment_timer(&self, inner: &Inner, file_number: u32) {
        let Some(interval) = inner.fragment_interval else {
            return;
        };
        let events = self.events.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            // The session may be gone already
            let _ = events.send(SessionEvent::FragmentElapsed { file_number });
        });
    }

    /// Writing → Finishing. Seals the segment and finalizes it in the background.
    pub(crate) fn begin_finalize(&self, inner: &mut Inner) {
        let Some(segment) = inner.segment.take() else {
            return;
        };
        inner.tracks.clear();
        inner.state = SessionState::Finishing;
        inner.finishing = Some(segment.file_number);
        segment.seal();
        info!(
            "Finishing segment {} ({})",
            segment.file_number,
            if inner.stop_requested { "stop" } else { "rollover" }
        );

        let events = self.events.clone();
        let watchdog = self.config.finalize_timeout;
        self.runtime.spawn(async move {
            let result = match tokio::time::timeout(watchdog, segment.writer.finalize()).await {
                Ok(result) => result,
                Err(_) => {
                    segment.writer.cancel();
                    Err(CaptureError::WriterFatal(format!(
                        "finalize of segment {} did not complete within {:?}",
                        segment.file_number, watchdog
                    )))
                }
            };
            let _ = events.send(SessionEvent::Finalized {
                file_number: segment.file_number,
                path: segment.path.clone(),
                result,
            });
        });
    }

    pub(crate) fn on_finalized(
        &self,
        inner: &mut Inner,
        file_number: u32,
        path: PathBuf,
        result: Result<()>,
    ) {
        if inner.state != SessionState::Finishing || inner.finishing != Some(file_number) {
            debug!("Ignoring stale finalize of segment {}", file_number);
            return;
        }
        inner.finishing = None;

        if let Err(e) = result {
            let context = format!("finalize of segment {} failed", file_number);
            self.fail(inner, writer_fatal(&context, e));
            return;
        }

        if let Some(tail) = inner.watcher.as_mut().and_then(|w| w.disable_with_tail()) {
            inner.outbox.push(tail);
        }
        info!("Segment {} complete: {}", file_number, path.display());
        inner.outbox.push(SessionNotification::SegmentComplete { path, file_number });

        if inner.stop_requested {
            self.close(inner);
            return;
        }
        if let Err(e) = self.open_segment(inner, file_number + 1) {
            let context = format!("could not open segment {}", file_number + 1);
            self.fail(inner, writer_fatal(&context, e));
        }
    }

    pub(crate) fn on_fragment_elapsed(&self, inner: &mut Inner, file_number: u32) {
        let current = inner.segment.as_ref().map(|s| s.file_number);
        if inner.state == SessionState::Writing && current == Some(file_number) {
            debug!("Fragment interval elapsed for segment {}", file_number);
            self.begin_finalize(inner);
        }
    }

    /// Stop request from any state. Repeated calls are no-ops.
    pub(crate) fn stop(&self, inner: &mut Inner) {
        let already_requested = inner.stop_requested;
        inner.stop_requested = true;
        match inner.state {
            SessionState::Idle => self.close(inner),
            SessionState::AwaitingTracks => {
                // Nothing was written, so there is nothing to finalize
                if let Some(segment) = inner.segment.take() {
                    segment.seal();
                    segment.writer.cancel();
                    debug!("Cancelled unstarted segment {}", segment.file_number);
                }
                self.close(inner);
            }
            SessionState::Writing => self.begin_finalize(inner),
            SessionState::Finishing => {
                if !already_requested {
                    debug!("Stop requested while finishing, no further segment will open");
                }
            }
            SessionState::Closed => {}
        }
    }

    fn close(&self, inner: &mut Inner) {
        inner.tracks.clear();
        inner.segment = None;
        if let Some(watcher) = inner.watcher.as_mut() {
            watcher.disable();
        }
        inner.state = SessionState::Closed;
        info!("Capture session closed");
        inner.outbox.push(SessionNotification::Finished);
    }

    /// Any state → Closed, reporting `err` as the terminal callback.
    pub(crate) fn fail(&self, inner: &mut Inner, err: CaptureError) {
        self.fail_with(inner, err.kind(), err.to_string());
    }

    fn fail_with(&self, inner: &mut Inner, kind: ErrorKind, detail: String) {
        if inner.state == SessionState::Closed {
            warn!("Error after close ignored: {}", detail);
            return;
        }
        error!("Capture session failed: {}", detail);

        if let Some(segment) = inner.segment.take() {
            segment.seal();
            segment.writer.cancel();
        }
        inner.tracks.clear();
        inner.finishing = None;
        if let Some(watcher) = inner.watcher.as_mut() {
            watcher.disable();
        }
        inner.state = SessionState::Closed;
        inner.outbox.push(SessionNotification::Error { kind, detail });
    }
}

/// Lifts a writer error into the fatal bucket, keeping its message.
fn writer_fatal(context: &str, err: CaptureError) -> CaptureError {
    match err {
        CaptureError::WriterFatal(_) => err,
        other => CaptureError::WriterFatal(format!("{}: {}", context, other)),
    }
}
