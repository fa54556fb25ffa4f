//! Common types shared by the controller and its collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Audio encoder configuration, passed through to the engine unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Encoder MIME type (e.g., "audio/mp4a-latm" for AAC).
    pub mime_type: String,

    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Number of capture channels (1 = mono, 2 = stereo).
    pub channel_count: u16,

    /// Target bitrate in bits per second.
    pub bitrate_bps: u32,

    /// Enable the platform echo canceler.
    pub echo_canceler: bool,

    /// Enable the platform noise suppressor.
    pub noise_suppressor: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            mime_type: "audio/mp4a-latm".to_string(),
            sample_rate: 44_100,
            channel_count: 2,
            bitrate_bps: 128_000,
            echo_canceler: false,
            noise_suppressor: false,
        }
    }
}

/// Video encoder configuration, passed through to the engine unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Encoder MIME type (e.g., "video/avc" for H.264).
    pub mime_type: String,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Frames per second.
    pub fps: u32,

    /// Target bitrate in bits per second.
    pub bitrate_bps: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            mime_type: "video/avc".to_string(),
            width: 1280,
            height: 720,
            fps: 25,
            bitrate_bps: 2_000_000,
        }
    }
}

/// Audio and video configuration applied to the engine before streaming.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Audio encoder configuration.
    pub audio: AudioConfig,

    /// Video encoder configuration.
    pub video: VideoConfig,
}

impl SessionConfig {
    /// Create a session configuration from its two halves.
    pub fn new(audio: AudioConfig, video: VideoConfig) -> Self {
        Self { audio, video }
    }
}

/// Device rotation, normalized to quarter turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationAngle {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl RotationAngle {
    /// Normalize an angle in degrees to the nearest quarter turn.
    ///
    /// Negative and out-of-range values wrap, so `-90` maps to `Deg270`.
    pub fn from_degrees(degrees: i32) -> Self {
        let quarter = ((degrees as f32) / 90.0).round() as i32;
        match quarter.rem_euclid(4) {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    /// Convert a platform surface rotation index (0..=3).
    pub fn from_surface_rotation(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Deg0),
            1 => Some(Self::Deg90),
            2 => Some(Self::Deg180),
            3 => Some(Self::Deg270),
            _ => None,
        }
    }

    /// The angle in degrees.
    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Returns true for the landscape rotations.
    pub fn is_landscape(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

impl fmt::Display for RotationAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_degrees_wraps() {
        assert_eq!(RotationAngle::from_degrees(0), RotationAngle::Deg0);
        assert_eq!(RotationAngle::from_degrees(90), RotationAngle::Deg90);
        assert_eq!(RotationAngle::from_degrees(-90), RotationAngle::Deg270);
        assert_eq!(RotationAngle::from_degrees(450), RotationAngle::Deg90);
        assert_eq!(RotationAngle::from_degrees(360), RotationAngle::Deg0);
    }

    #[test]
    fn test_from_degrees_rounds_to_nearest_quarter() {
        assert_eq!(RotationAngle::from_degrees(80), RotationAngle::Deg90);
        assert_eq!(RotationAngle::from_degrees(200), RotationAngle::Deg180);
        assert_eq!(RotationAngle::from_degrees(-10), RotationAngle::Deg0);
    }

    #[test]
    fn test_surface_rotation_index() {
        assert_eq!(
            RotationAngle::from_surface_rotation(3),
            Some(RotationAngle::Deg270)
        );
        assert_eq!(RotationAngle::from_surface_rotation(4), None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"video":{"width":1920,"height":1080}}"#).unwrap();

        assert_eq!(config.video.width, 1920);
        assert_eq!(config.video.fps, 25);
        assert_eq!(config.audio, AudioConfig::default());
    }
}
