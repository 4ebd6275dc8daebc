use crate::av::MediaSample;
use crate::error::{CaptureError, Result};
use crate::format::{ContainerWriter, TrackId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// Identifies one output file of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Starts at 0 and grows by one per rollover
    pub file_number: u32,
    /// Output file
    pub path: PathBuf,
    /// Bytes already reported through growth notifications
    pub byte_offset: u64,
    /// When the writer was created
    pub opened_at: DateTime<Utc>,
}

/// Derives segment file names from the destination URL.
///
/// `file:///rec/capture.mp4` yields `/rec/capture_0.mp4`, `/rec/capture_1.mp4`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentNaming {
    dir: PathBuf,
    stem: String,
    extension: Option<String>,
}

impl SegmentNaming {
    /// Accepts a `file:` URL or an absolute path.
    pub fn parse(destination: &str) -> Result<Self> {
        let url = match Url::parse(destination) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::from_file_path(destination)
                .map_err(|_| {
                    CaptureError::Configuration(format!(
                        "destination {} is neither a URL nor an absolute path",
                        destination
                    ))
                })?,
            Err(e) => return Err(e.into()),
        };
        Self::from_url(&url)
    }

    /// Parses a `file:` URL into a naming scheme.
    pub fn from_url(url: &Url) -> Result<Self> {
        if url.scheme() != "file" {
            return Err(CaptureError::Configuration(format!(
                "unsupported destination scheme '{}'",
                url.scheme()
            )));
        }
        let path = url
            .to_file_path()
            .map_err(|_| CaptureError::Configuration(format!("invalid file URL {}", url)))?;
        Self::from_path(&path)
    }

    /// Builds a naming scheme from an absolute path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CaptureError::Configuration(format!(
                    "destination {} has no file name",
                    path.display()
                ))
            })?
            .to_string();

        Ok(Self {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            stem,
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned()),
        })
    }

    /// Path of segment `file_number`.
    pub fn path_for(&self, file_number: u32) -> PathBuf {
        let filename = match &self.extension {
            Some(ext) => format!("{}_{}.{}", self.stem, file_number, ext),
            None => format!("{}_{}", self.stem, file_number),
        };
        self.dir.join(filename)
    }
}

/// The writer of the segment currently being recorded.
///
/// Shared with routing threads, which append through the gate. Sealing the
/// gate waits for in-flight appends and turns away every later one.
pub(crate) struct ActiveSegment {
    pub(crate) file_number: u32,
    pub(crate) path: PathBuf,
    pub(crate) writer: Arc<dyn ContainerWriter>,
    pub(crate) opened_at: DateTime<Utc>,
    started: AtomicBool,
    sealed: RwLock<bool>,
}

impl ActiveSegment {
    pub(crate) fn new(file_number: u32, path: PathBuf, writer: Arc<dyn ContainerWriter>) -> Self {
        Self {
            file_number,
            path,
            writer,
            opened_at: Utc::now(),
            started: AtomicBool::new(false),
            sealed: RwLock::new(false),
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_started(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    /// Appends unless sealed; `None` means the sample was turned away.
    pub(crate) fn append(&self, track: TrackId, sample: &MediaSample) -> Option<Result<()>> {
        let sealed = self.sealed.read();
        if *sealed {
            return None;
        }
        Some(self.writer.append(track, sample))
    }

    pub(crate) fn seal(&self) {
        *self.sealed.write() = true;
    }

    pub(crate) fn descriptor(&self, byte_offset: u64) -> SegmentDescriptor {
        SegmentDescriptor {
            file_number: self.file_number,
            path: self.path.clone(),
            byte_offset,
            opened_at: self.opened_at,
        }
    }
}
