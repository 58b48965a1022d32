use std::path::{Path, PathBuf};

use image::imageops;
use tracing::{debug, instrument};

use super::frame::PixelGrid;
use crate::error::SourceError;
use crate::CaptureConfig;

/// Per-axis downscale factor applied before encoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Target size for a `width` x `height` source, never smaller than 1x1
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let w = (f64::from(width) * self.x).round().max(1.0) as u32;
        let h = (f64::from(height) * self.y).round().max(1.0) as u32;
        (w, h)
    }
}

impl Default for Scale {
    fn default() -> Self {
        // Terminal cells are roughly 3x5 font pixels
        Self::new(1.0 / 6.0, 1.0 / 10.0)
    }
}

/// Decode an image file and area-downscale it into a pixel grid
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_grid(path: impl AsRef<Path>, scale: Scale) -> Result<PixelGrid, SourceError> {
    let path = path.as_ref();
    let image = image::open(path)
        .map_err(|source| SourceError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();

    let (width, height) = scale.target_size(image.width(), image.height());
    // thumbnail() averages every source pixel into exactly one target cell
    let resized = imageops::thumbnail(&image, width, height);
    debug!(
        "Decoded {}x{} -> {}x{}",
        image.width(),
        image.height(),
        width,
        height
    );

    Ok(PixelGrid::from_rgb_image(&resized))
}

/// Produces one pixel grid per frame index
pub trait FrameSource {
    fn grid(&self, index: u64) -> Result<PixelGrid, SourceError>;
    fn exists(&self, index: u64) -> bool;
}

/// Directory of still images named `<index>.png`
pub struct ImageDirSource {
    dir: PathBuf,
    scale: Scale,
}

impl ImageDirSource {
    pub fn new(dir: impl Into<PathBuf>, scale: Scale) -> Self {
        Self {
            dir: dir.into(),
            scale,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.frames_dir.clone(),
            Scale::new(config.scale_x, config.scale_y),
        )
    }

    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{index}.png"))
    }
}

impl FrameSource for ImageDirSource {
    fn grid(&self, index: u64) -> Result<PixelGrid, SourceError> {
        let path = self.path_for(index);
        if !path.is_file() {
            return Err(SourceError::Missing { index, path });
        }
        load_grid(path, self.scale)
    }

    fn exists(&self, index: u64) -> bool {
        self.path_for(index).is_file()
    }
}
