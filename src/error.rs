use thiserror::Error;

/// Errors raised by a capture encoding session.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or duplicate format binding, or an unusable session configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The container writer refused to attach a track.
    #[error("setup error: {0}")]
    Setup(String),

    /// A single sample was rejected. Never fatal.
    #[error("ingestion error: {0}")]
    Ingestion(String),

    /// The writer failed in a way that cannot be resumed.
    #[error("writer fatal error: {0}")]
    WriterFatal(String),

    /// Transient failure while polling the output file.
    #[error("file watch error: {0}")]
    FileWatch(String),

    /// The destination URL could not be parsed.
    #[error("invalid destination: {0}")]
    Destination(#[from] url::ParseError),
}

impl CaptureError {
    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::Io(_) => ErrorKind::Io,
            CaptureError::Configuration(_) | CaptureError::Destination(_) => {
                ErrorKind::Configuration
            }
            CaptureError::Setup(_) => ErrorKind::Setup,
            CaptureError::Ingestion(_) => ErrorKind::Ingestion,
            CaptureError::WriterFatal(_) => ErrorKind::WriterFatal,
            CaptureError::FileWatch(_) => ErrorKind::FileWatch,
        }
    }

    /// Whether the error terminates the session it occurred in.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::WriterFatal(_))
    }
}

/// Error categories handed to [`SessionObserver::on_error`](crate::report::SessionObserver::on_error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Duplicate or invalid format binding, bad configuration.
    Configuration,
    /// Track creation rejected by the writer.
    Setup,
    /// Sample rejected by the writer.
    Ingestion,
    /// Start or finalize failed unrecoverably.
    WriterFatal,
    /// Output file could not be observed.
    FileWatch,
    /// I/O failure.
    Io,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CaptureError>;
