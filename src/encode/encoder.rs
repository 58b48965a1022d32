//! Run-suppressed ANSI truecolor encoder
//!
//! Each pixel becomes one terminal cell: a space painted with a 24-bit
//! background color. A color token is only emitted when the color changes
//! within a row, so horizontal runs cost one byte per pixel.

use bytes::{BufMut, BytesMut};
use tracing::trace;

use super::color::ColorApprox;
use crate::capture::{Color, EncodedFrame, PixelGrid};
use crate::error::EncodeError;

const ESC: u8 = 0x1b;

/// Single-width placeholder reserving one cell per pixel
pub const PLACEHOLDER: u8 = b' ';

/// Moves the cursor back to the top-left corner after every frame
pub const RESET_TOKEN: &[u8] = b"\x1b[0;0H";

/// Longest possible color token: `ESC[48;2;255;255;255m`
pub const MAX_TOKEN_LEN: usize = 19;

#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder {
    approx: ColorApprox,
}

impl Encoder {
    pub fn new(approx: ColorApprox) -> Self {
        Self { approx }
    }

    pub fn with_tolerance(eps: u8) -> Self {
        Self::new(ColorApprox::new(eps))
    }

    pub fn approx(&self) -> ColorApprox {
        self.approx
    }

    pub fn encode(&self, grid: &PixelGrid) -> Result<EncodedFrame, EncodeError> {
        let (rows, cols) = check_shape(grid)?;

        // Monochrome rows need one token plus cols + 1 bytes
        let mut out = BytesMut::with_capacity(rows * (cols + 1 + MAX_TOKEN_LEN) + RESET_TOKEN.len());
        let mut tokens = 0usize;

        for row in grid.rows() {
            // Every row starts from scratch so it renders on its own
            let mut last: Option<Color> = None;
            for &pixel in row {
                if !last.is_some_and(|prev| self.approx.same(prev, pixel)) {
                    put_color_token(&mut out, pixel);
                    last = Some(pixel);
                    tokens += 1;
                }
                out.put_u8(PLACEHOLDER);
            }
            out.put_u8(b'\n');
        }
        out.put_slice(RESET_TOKEN);

        trace!(rows, cols, tokens, bytes = out.len(), "Encoded frame");
        Ok(EncodedFrame::new(out.freeze()))
    }
}

fn check_shape(grid: &PixelGrid) -> Result<(usize, usize), EncodeError> {
    let rows = grid.height();
    let cols = grid.width();
    if rows == 0 || cols == 0 {
        return Err(EncodeError::Empty { rows, cols });
    }
    if let Some((row, found)) = grid
        .rows()
        .iter()
        .map(Vec::len)
        .enumerate()
        .find(|&(_, len)| len != cols)
    {
        return Err(EncodeError::Ragged {
            row,
            expected: cols,
            found,
        });
    }
    Ok((rows, cols))
}

fn put_color_token(out: &mut BytesMut, color: Color) {
    out.put_slice(&[ESC, b'[']);
    out.put_slice(b"48;2;");
    put_decimal(out, color.r);
    out.put_u8(b';');
    put_decimal(out, color.g);
    out.put_u8(b';');
    put_decimal(out, color.b);
    out.put_u8(b'm');
}

/// Decimal without leading zeros
fn put_decimal(out: &mut BytesMut, value: u8) {
    if value >= 100 {
        out.put_u8(b'0' + value / 100);
    }
    if value >= 10 {
        out.put_u8(b'0' + (value / 10) % 10);
    }
    out.put_u8(b'0' + value % 10);
}
