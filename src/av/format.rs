use super::{CodecType, MediaKind};
use crate::error::{CaptureError, Result};
use bytes::Bytes;

/// Pixel layout of uncompressed video handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 32-bit BGRA
    Bgra,
    /// Bi-planar 4:2:0, video range
    Nv12,
    /// Planar 4:2:0
    I420,
    /// Already compressed by the capture source
    Compressed,
}

/// Audio stream parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFormat {
    /// Codec of the encoded audio
    pub codec: CodecType,
    /// Samples per second
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Codec-specific setup bytes (e.g. AudioSpecificConfig)
    pub extra_data: Option<Bytes>,
}

/// Video stream parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFormat {
    /// Codec of the encoded video
    pub codec: CodecType,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Layout of the source frames
    pub pixel_format: PixelFormat,
    /// Codec-specific setup bytes (e.g. SPS/PPS)
    pub extra_data: Option<Bytes>,
}

/// Format descriptor supplied once per track by the capture source.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatDescription {
    /// Describes an audio track
    Audio(AudioFormat),
    /// Describes a video track
    Video(VideoFormat),
}

impl FormatDescription {
    /// Convenience constructor for an audio description without extra data.
    pub fn audio(codec: CodecType, sample_rate: u32, channels: u16) -> Self {
        FormatDescription::Audio(AudioFormat {
            codec,
            sample_rate,
            channels,
            extra_data: None,
        })
    }

    /// Convenience constructor for a video description without extra data.
    pub fn video(codec: CodecType, width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        FormatDescription::Video(VideoFormat {
            codec,
            width,
            height,
            pixel_format,
            extra_data: None,
        })
    }

    /// Audio or video.
    pub fn kind(&self) -> MediaKind {
        match self {
            FormatDescription::Audio(_) => MediaKind::Audio,
            FormatDescription::Video(_) => MediaKind::Video,
        }
    }

    /// Codec carried by this description.
    pub fn codec_type(&self) -> CodecType {
        match self {
            FormatDescription::Audio(a) => a.codec,
            FormatDescription::Video(v) => v.codec,
        }
    }

    /// Frame width, `None` for audio.
    pub fn width(&self) -> Option<u32> {
        match self {
            FormatDescription::Video(v) => Some(v.width),
            FormatDescription::Audio(_) => None,
        }
    }

    /// Frame height, `None` for audio.
    pub fn height(&self) -> Option<u32> {
        match self {
            FormatDescription::Video(v) => Some(v.height),
            FormatDescription::Audio(_) => None,
        }
    }

    /// Codec configuration bytes, if any.
    pub fn extra_data(&self) -> Option<&[u8]> {
        match self {
            FormatDescription::Audio(a) => a.extra_data.as_deref(),
            FormatDescription::Video(v) => v.extra_data.as_deref(),
        }
    }

    /// Checks that the description is usable for a track of `expected` kind.
    pub fn validate(&self, expected: MediaKind) -> Result<()> {
        if self.kind() != expected {
            return Err(CaptureError::Configuration(format!(
                "expected {} format description, got {}",
                expected,
                self.kind()
            )));
        }
        if self.codec_type().kind() != expected {
            return Err(CaptureError::Configuration(format!(
                "codec {:?} cannot carry {}",
                self.codec_type(),
                expected
            )));
        }
        match self {
            FormatDescription::Audio(a) if a.sample_rate == 0 || a.channels == 0 => {
                Err(CaptureError::Configuration(
                    "audio sample rate and channel count must be non-zero".into(),
                ))
            }
            FormatDescription::Video(v) if v.width == 0 || v.height == 0 => Err(
                CaptureError::Configuration("video dimensions must be non-zero".into()),
            ),
            _ => Ok(()),
        }
    }
}

/// Physical orientation of the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoOrientation {
    /// Upright, home button at the bottom
    #[default]
    Portrait,
    /// Upside down
    PortraitUpsideDown,
    /// Rotated so the top faces right
    LandscapeRight,
    /// Rotated so the top faces left
    LandscapeLeft,
}

impl VideoOrientation {
    fn angle_offset(self) -> i32 {
        match self {
            VideoOrientation::Portrait => 0,
            VideoOrientation::PortraitUpsideDown => 180,
            VideoOrientation::LandscapeRight => -90,
            VideoOrientation::LandscapeLeft => 90,
        }
    }

    /// Clockwise rotation in degrees, in `[0, 360)`, that maps frames captured
    /// in `reference` orientation to `self`.
    pub fn rotation_from(self, reference: VideoOrientation) -> u32 {
        (self.angle_offset() - reference.angle_offset()).rem_euclid(360) as u32
    }
}
