use super::segment::ActiveSegment;
use super::{SessionEvent, SessionState, Shared};
use crate::av::{MediaKind, MediaSample};
use crate::error::CaptureError;
use crate::format::TrackId;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Why a sample did not reach the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `start` has not been called
    NotStarted,
    /// Not every required track is ready yet
    AwaitingTracks,
    /// The sample's own track has no attached input
    TrackNotReady,
    /// The segment is being finalized
    Finishing,
    /// The session is over
    Closed,
}

/// Result of routing one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Appended to the active writer
    Forwarded,
    /// Not appended, see the reason
    Dropped(DropReason),
    /// The writer refused the sample; the session carries on
    Rejected,
}

/// Counters for samples seen by the router.
#[derive(Debug, Default)]
pub(crate) struct IngestionStats {
    forwarded: [AtomicU64; 2],
    dropped: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of the router counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Audio samples appended
    pub forwarded_audio: u64,
    /// Video samples appended
    pub forwarded_video: u64,
    /// Samples that arrived while the session could not take them
    pub dropped: u64,
    /// Samples the writer refused
    pub rejected: u64,
}

impl StatsSnapshot {
    /// Samples appended across both kinds.
    pub fn forwarded(&self) -> u64 {
        self.forwarded_audio + self.forwarded_video
    }
}

impl IngestionStats {
    fn record_forwarded(&self, kind: MediaKind) {
        self.forwarded[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            forwarded_audio: self.forwarded[MediaKind::Audio.index()].load(Ordering::Relaxed),
            forwarded_video: self.forwarded[MediaKind::Video.index()].load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Shared {
    /// Routes one sample to the active writer.
    ///
    /// The session lock is held only to pick the writer and track; the append
    /// itself happens outside it so a slow writer never blocks the other track
    /// or a lifecycle transition.
    pub(crate) fn route(&self, sample: &MediaSample) -> RouteOutcome {
        let (segment, track) = match self.with_inner(|s, inner| s.snapshot_for(inner, sample)) {
            Ok(target) => target,
            Err(reason) => {
                self.stats.record_dropped();
                debug!("Dropped {} sample at {:?}: {:?}", sample.kind, sample.pts, reason);
                return RouteOutcome::Dropped(reason);
            }
        };

        match segment.append(track, sample) {
            None => {
                self.stats.record_dropped();
                debug!(
                    "Dropped {} sample at {:?}: segment {} is finishing",
                    sample.kind, sample.pts, segment.file_number
                );
                RouteOutcome::Dropped(DropReason::Finishing)
            }
            Some(Ok(())) => {
                self.stats.record_forwarded(sample.kind);
                RouteOutcome::Forwarded
            }
            Some(Err(CaptureError::WriterFatal(detail))) => {
                self.stats.record_rejected();
                self.send_event(SessionEvent::WriterFailed { detail });
                RouteOutcome::Rejected
            }
            Some(Err(e)) => {
                self.stats.record_rejected();
                warn!(
                    "Writer rejected {} sample at {:?}: {}",
                    sample.kind, sample.pts, e
                );
                RouteOutcome::Rejected
            }
        }
    }

    /// Picks the writer and track for `sample`, starting the writer session
    /// on the first sample once every required track is ready.
    fn snapshot_for(
        &self,
        inner: &mut super::Inner,
        sample: &MediaSample,
    ) -> std::result::Result<(Arc<ActiveSegment>, TrackId), DropReason> {
        let kind = sample.kind;
        match inner.state {
            SessionState::Writing => {}
            SessionState::AwaitingTracks => {
                if !inner.readiness.all_required_ready() {
                    return Err(DropReason::AwaitingTracks);
                }
                if !inner.readiness.is_ready(kind) {
                    return Err(DropReason::TrackNotReady);
                }
                let segment = inner.segment.clone().ok_or(DropReason::AwaitingTracks)?;
                if let Err(e) = segment.writer.start_session(sample.pts) {
                    self.fail(
                        inner,
                        CaptureError::WriterFatal(format!(
                            "could not start segment {}: {}",
                            segment.file_number, e
                        )),
                    );
                    return Err(DropReason::Closed);
                }
                segment.mark_started();
                inner.state = SessionState::Writing;
                info!(
                    "Segment {} writing from {:?}",
                    segment.file_number, sample.pts
                );
                self.arm_fragment_timer(inner, segment.file_number);
            }
            SessionState::Idle => return Err(DropReason::NotStarted),
            SessionState::Finishing => return Err(DropReason::Finishing),
            SessionState::Closed => return Err(DropReason::Closed),
        }

        if !inner.readiness.is_ready(kind) {
            return Err(DropReason::TrackNotReady);
        }
        let track = inner.tracks.get(kind).ok_or(DropReason::TrackNotReady)?.id();
        let segment = inner.segment.clone().ok_or(DropReason::Finishing)?;
        Ok((segment, track))
    }
}
