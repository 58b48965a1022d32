//! Terminal display over any `io::Write`
//!
//! The terminal must already understand 24-bit ANSI colors; configuring it
//! (fonts, console modes) is left to the user.

use std::io::{self, Stdout, Write};

use tracing::{debug, instrument};

use super::Display;
use crate::error::DisplayWriteError;

/// Clear the screen and home the cursor
const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[0;0H";

/// Reset colors so the shell prompt is readable again
const RESET_ATTRIBUTES: &[u8] = b"\x1b[0m\n";

pub struct TerminalDisplay<W: Write> {
    out: W,
    frames: u64,
    bytes: u64,
    closed: bool,
}

impl TerminalDisplay<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frames: 0,
            bytes: 0,
            closed: false,
        }
    }

    pub fn clear(&mut self) -> Result<(), DisplayWriteError> {
        self.raw_write(CLEAR_SCREEN)
    }

    /// Reset attributes and refuse further frames
    #[instrument(skip(self))]
    pub fn finish(&mut self) -> Result<(), DisplayWriteError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.out.write_all(RESET_ATTRIBUTES)?;
        self.out.flush()?;
        debug!("Display wrote {} frames, {} bytes", self.frames, self.bytes);
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn raw_write(&mut self, bytes: &[u8]) -> Result<(), DisplayWriteError> {
        if self.closed {
            return Err(DisplayWriteError::Closed);
        }
        self.out.write_all(bytes)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Display for TerminalDisplay<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), DisplayWriteError> {
        self.raw_write(bytes)?;
        self.frames += 1;
        self.bytes += bytes.len() as u64;
        Ok(())
    }
}
