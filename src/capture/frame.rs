use bytes::Bytes;
use image::RgbImage;

/// 24-bit RGB color of one source pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

/// Row-major pixel matrix for one frame, already downscaled to display resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    rows: Vec<Vec<Color>>,
}

impl PixelGrid {
    /// Wrap rows as-is. Shape is checked by the encoder, not here.
    pub fn from_rows(rows: Vec<Vec<Color>>) -> Self {
        Self { rows }
    }

    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let rows = image
            .rows()
            .map(|row| row.map(|px| Color::from(px.0)).collect())
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<Color>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Width of the first row, 0 for an empty grid
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

/// One fully rendered, escape-coded frame.
///
/// Not `Clone`: a frame has exactly one owner at a time and is released when
/// that owner drops it.
#[derive(Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    data: Bytes,
}

impl EncodedFrame {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}
