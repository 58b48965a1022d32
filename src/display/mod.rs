pub mod terminal;

pub use terminal::TerminalDisplay;

use crate::error::DisplayWriteError;

/// Synchronous byte sink that renders escape-coded frames
pub trait Display: Send {
    /// Write `bytes` in full. Implementations must not retry a partially
    /// completed write.
    fn write(&mut self, bytes: &[u8]) -> Result<(), DisplayWriteError>;
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), DisplayWriteError> {
        (**self).write(bytes)
    }
}
