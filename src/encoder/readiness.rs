use crate::av::MediaKind;
use crate::config::RequiredTracks;

/// Per-track readiness flags and the aggregate gate derived from them.
///
/// Flags only ever go from `false` to `true`. They survive segment rollover
/// because the bound formats are re-attached to every new writer.
#[derive(Debug, Clone)]
pub struct ReadinessTracker {
    required: RequiredTracks,
    ready: [bool; 2],
}

impl ReadinessTracker {
    /// Creates a tracker with no kind ready yet.
    pub fn new(required: RequiredTracks) -> Self {
        Self {
            required,
            ready: [false, false],
        }
    }

    /// Tracks that gate writing.
    pub fn required(&self) -> RequiredTracks {
        self.required
    }

    /// Whether `kind` has a track attached.
    pub fn is_ready(&self, kind: MediaKind) -> bool {
        self.ready[kind.index()]
    }

    /// Flips `kind` to ready. Returns whether this call changed anything.
    pub fn mark_ready(&mut self, kind: MediaKind) -> bool {
        let flag = &mut self.ready[kind.index()];
        let changed = !*flag;
        *flag = true;
        changed
    }

    /// True once every required track is ready.
    pub fn all_required_ready(&self) -> bool {
        MediaKind::ALL
            .iter()
            .all(|kind| !self.required.requires(*kind) || self.is_ready(*kind))
    }
}
