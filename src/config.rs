use crate::av::{MediaKind, VideoOrientation};
use crate::error::{CaptureError, Result};
use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

/// Default AAC bitrate in bits per second.
pub const DEFAULT_AUDIO_BITRATE: u32 = 64_000;
/// Default key frame spacing for video tracks, in frames.
pub const DEFAULT_MAX_KEYFRAME_INTERVAL: u32 = 30;
const DEFAULT_WATCH_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

/// Process-wide defaults applied to every new [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Default audio bitrate in bits per second
    pub audio_bitrate: u32,
    /// Overrides the frame-size based video bitrate when set
    pub video_bitrate: Option<u32>,
    /// Seconds per output segment, `None` disables timed rollover
    pub fragment_interval_secs: Option<u64>,
    /// Report output growth while writing
    pub watch_output_file: bool,
    /// How often the output file is polled
    pub watch_poll_interval: Duration,
    /// Longest a finalize may take before the segment fails
    pub finalize_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_bitrate: DEFAULT_AUDIO_BITRATE,
            video_bitrate: None,
            fragment_interval_secs: None,
            watch_output_file: false,
            watch_poll_interval: DEFAULT_WATCH_POLL_INTERVAL,
            finalize_timeout: DEFAULT_FINALIZE_TIMEOUT,
        }
    }
}

impl Config {
    fn new() -> Self {
        let mut config = Config::default();

        // Environment first, then config files on top
        for (key, value) in env::vars() {
            if let Some(key) = key.strip_prefix("AVSESSION_") {
                config.apply(&key.to_ascii_lowercase(), &value);
            }
        }

        let config_paths = ["./avsession.toml", "./config.toml"];
        for path in &config_paths {
            if let Ok(mut file) = File::open(path) {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_ok() {
                    config.apply_lines(&content);
                }
            }
        }

        config
    }

    /// Applies `key = value` lines, ignoring comments and unknown keys.
    pub fn apply_lines(&mut self, content: &str) {
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if !value.is_empty() {
                    self.apply(key.trim(), value);
                }
            }
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "audio_bitrate" => {
                if let Ok(v) = value.parse() {
                    self.audio_bitrate = v;
                }
            }
            "video_bitrate" => self.video_bitrate = value.parse().ok(),
            "fragment_interval_secs" => {
                self.fragment_interval_secs = value.parse().ok().filter(|secs| *secs > 0)
            }
            "watch_output_file" => {
                if let Ok(v) = value.parse() {
                    self.watch_output_file = v;
                }
            }
            "watch_poll_interval_ms" => {
                if let Ok(ms) = value.parse() {
                    self.watch_poll_interval = Duration::from_millis(ms);
                }
            }
            "finalize_timeout_secs" => {
                if let Ok(secs) = value.parse() {
                    self.finalize_timeout = Duration::from_secs(secs);
                }
            }
            _ => {}
        }
    }

    /// Reloads the process-wide configuration from the environment and config files.
    pub fn reload() {
        let new_config = Config::new();
        if let Ok(mut config) = CONFIG.write() {
            *config = new_config;
        }
    }
}

/// Returns the current process-wide defaults.
pub fn current() -> Config {
    CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# avsession configuration
# Values apply to every new capture session unless overridden in code.

audio_bitrate = 64000
# video_bitrate = 2000000
# fragment_interval_secs = 60
watch_output_file = false
watch_poll_interval_ms = 500
finalize_timeout_secs = 10
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}

/// Tracks a session waits for before multiplexing starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredTracks {
    /// Audio must be ready before writing starts
    pub audio: bool,
    /// Video must be ready before writing starts
    pub video: bool,
}

impl RequiredTracks {
    /// Both audio and video are required.
    pub fn both() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }

    /// Only audio is required.
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }

    /// Only video is required.
    pub fn video_only() -> Self {
        Self {
            audio: false,
            video: true,
        }
    }

    /// Whether `kind` has to be ready before writing starts.
    pub fn requires(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio,
            MediaKind::Video => self.video,
        }
    }
}

impl Default for RequiredTracks {
    fn default() -> Self {
        Self::both()
    }
}

/// Per-session options.
///
/// Starts from [`current()`] and is refined with the `with_*` builders.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Tracks that gate the start of writing
    pub required_tracks: RequiredTracks,
    /// Length of each output segment, `None` for a single file
    pub fragment_interval: Option<Duration>,
    /// Audio bitrate in bits per second
    pub audio_bitrate: u32,
    /// Video bitrate override, `None` derives it from the frame size
    pub video_bitrate: Option<u32>,
    /// Orientation the video is encoded in
    pub reference_orientation: VideoOrientation,
    /// Orientation the device reported for the video
    pub video_orientation: VideoOrientation,
    /// Frames between forced keyframes
    pub max_keyframe_interval: u32,
    /// Report output growth while writing
    pub watch_output_file: bool,
    /// How often the output file is polled
    pub watch_poll_interval: Duration,
    /// How long a segment may stay in `Finishing` before it is declared failed
    pub finalize_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_config(&current())
    }
}

impl SessionConfig {
    /// Creates a session config with the process-wide defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the defaults from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self {
            required_tracks: RequiredTracks::both(),
            fragment_interval: config.fragment_interval_secs.map(Duration::from_secs),
            audio_bitrate: config.audio_bitrate,
            video_bitrate: config.video_bitrate,
            reference_orientation: VideoOrientation::Portrait,
            video_orientation: VideoOrientation::Portrait,
            max_keyframe_interval: DEFAULT_MAX_KEYFRAME_INTERVAL,
            watch_output_file: config.watch_output_file,
            watch_poll_interval: config.watch_poll_interval,
            finalize_timeout: config.finalize_timeout,
        }
    }

    /// Sets which tracks gate the start of writing.
    pub fn with_required_tracks(mut self, tracks: RequiredTracks) -> Self {
        self.required_tracks = tracks;
        self
    }

    /// Rolls over to a new file every `interval`.
    pub fn with_fragment_interval(mut self, interval: Duration) -> Self {
        self.fragment_interval = Some(interval);
        self
    }

    /// Writes a single file with no timed rollover.
    pub fn without_fragments(mut self) -> Self {
        self.fragment_interval = None;
        self
    }

    /// Sets the audio bitrate.
    pub fn with_audio_bitrate(mut self, bps: u32) -> Self {
        self.audio_bitrate = bps;
        self
    }

    /// Overrides the derived video bitrate.
    pub fn with_video_bitrate(mut self, bps: u32) -> Self {
        self.video_bitrate = Some(bps);
        self
    }

    /// Sets the reference and video orientation.
    pub fn with_orientation(
        mut self,
        reference: VideoOrientation,
        video: VideoOrientation,
    ) -> Self {
        self.reference_orientation = reference;
        self.video_orientation = video;
        self
    }

    /// Turns output growth notifications on or off.
    pub fn with_watch(mut self, enable: bool) -> Self {
        self.watch_output_file = enable;
        self
    }

    /// Sets how often the output file is polled.
    pub fn with_watch_poll_interval(mut self, interval: Duration) -> Self {
        self.watch_poll_interval = interval;
        self
    }

    /// Sets the finalize watchdog.
    pub fn with_finalize_timeout(mut self, timeout: Duration) -> Self {
        self.finalize_timeout = timeout;
        self
    }

    /// Rejects configurations no session could run with.
    pub fn validate(&self) -> Result<()> {
        if !self.required_tracks.audio && !self.required_tracks.video {
            return Err(CaptureError::Configuration(
                "session must require at least one track".into(),
            ));
        }
        if self.fragment_interval == Some(Duration::ZERO) {
            return Err(CaptureError::Configuration(
                "fragment interval must be non-zero".into(),
            ));
        }
        if self.finalize_timeout.is_zero() || self.watch_poll_interval.is_zero() {
            return Err(CaptureError::Configuration(
                "finalize timeout and watch poll interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
