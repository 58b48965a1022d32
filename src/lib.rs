pub mod capture;
pub mod convert;
pub mod display;
pub mod encode;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod utils;

use std::path::{Path, PathBuf};

use config::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use capture::{Color, EncodedFrame, PixelGrid};
pub use encode::{ColorApprox, Encoder};
pub use pipeline::{PlaybackReport, Session, StopHandle};

/// Prefix for environment overrides, e.g. `TERMREEL__PIPELINE__WATERMARK=64`
pub const ENV_PREFIX: &str = "TERMREEL";

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub encoder: EncoderConfig,
    pub capture: CaptureConfig,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Per-channel color tolerance; 0 emits a token for every pixel
    pub tolerance: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory of `<index>.png` source frames
    pub frames_dir: PathBuf,
    pub scale_x: f64,
    pub scale_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of `<index>.tframe` encoded frames
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Queue depth at which the loader blocks
    pub watermark: usize,
    /// Frames buffered before the player starts
    pub min_fill: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Optional pacing; unset plays as fast as the display accepts
    pub target_fps: Option<f64>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            tolerance: encode::color::DEFAULT_EPS,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let scale = capture::Scale::default();
        Self {
            frames_dir: PathBuf::from("frames"),
            scale_x: scale.x,
            scale_y: scale.y,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("txt"),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            watermark: 1000,
            min_fill: 256,
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `TERMREEL__*` environment variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config: Config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!("Loaded configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.watermark == 0 {
            return Err(ConfigError::Message(
                "pipeline.watermark must be at least 1".into(),
            ));
        }
        for (name, scale) in [
            ("capture.scale_x", self.capture.scale_x),
            ("capture.scale_y", self.capture.scale_y),
        ] {
            if !(scale > 0.0 && scale <= 1.0) {
                return Err(ConfigError::Message(format!(
                    "{name} must be in (0, 1], got {scale}"
                )));
            }
        }
        if let Some(fps) = self.player.target_fps {
            if !(fps > 0.0 && fps.is_finite()) {
                return Err(ConfigError::Message(format!(
                    "player.target_fps must be positive, got {fps}"
                )));
            }
        }
        Ok(())
    }
}
