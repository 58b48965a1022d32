//! Error taxonomy for encoding, storage, display and playback

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed input handed to the encoder
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("pixel grid is empty ({rows} rows x {cols} cols)")]
    Empty { rows: usize, cols: usize },

    #[error("pixel grid row {row} has {found} columns, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// A stored frame that could not be read back
#[derive(Debug, Error)]
pub enum StoreReadError {
    #[error("frame {index} is missing from the store")]
    Missing { index: u64 },

    #[error("frame {index} is empty")]
    Empty { index: u64 },

    #[error("frame {index} truncated: read {actual} of {expected} bytes")]
    Truncated {
        index: u64,
        expected: u64,
        actual: u64,
    },

    #[error("failed to read frame {index}: {source}")]
    Io {
        index: u64,
        #[source]
        source: io::Error,
    },
}

impl StoreReadError {
    pub fn index(&self) -> u64 {
        match self {
            Self::Missing { index }
            | Self::Empty { index }
            | Self::Truncated { index, .. }
            | Self::Io { index, .. } => *index,
        }
    }
}

/// The display sink rejected or only partially completed a write
#[derive(Debug, Error)]
pub enum DisplayWriteError {
    #[error("display write failed: {0}")]
    Io(#[from] io::Error),

    #[error("display is closed")]
    Closed,
}

/// A source image that could not be turned into a pixel grid
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source frame {index} not found at {}", .path.display())]
    Missing { index: u64, path: PathBuf },

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Per-frame failure while converting images into stored frames
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("frame {index}: {source}")]
    Source {
        index: u64,
        #[source]
        source: SourceError,
    },

    #[error("frame {index}: {source}")]
    Encode {
        index: u64,
        #[source]
        source: EncodeError,
    },

    #[error("frame {index}: failed to write encoded frame: {source}")]
    Write {
        index: u64,
        #[source]
        source: io::Error,
    },
}

/// Anything that halts a playback session
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("loader: {0}")]
    Store(#[from] StoreReadError),

    #[error("player: frame {index}: {source}")]
    Display {
        index: u64,
        #[source]
        source: DisplayWriteError,
    },

    #[error("player: expected frame {expected}, received frame {found}")]
    OutOfOrder { expected: u64, found: u64 },

    #[error("loader thread panicked after queueing {queued} frames")]
    LoaderPanicked { queued: u64 },

    #[error("failed to spawn loader thread before frame {index}: {source}")]
    Spawn {
        /// First frame that was never loaded
        index: u64,
        #[source]
        source: io::Error,
    },
}

impl PlaybackError {
    /// Index of the frame the failure is attributed to
    pub fn index(&self) -> u64 {
        match self {
            Self::Store(e) => e.index(),
            Self::Display { index, .. } => *index,
            Self::OutOfOrder { found, .. } => *found,
            Self::LoaderPanicked { queued } => queued + 1,
            Self::Spawn { index, .. } => *index,
        }
    }

    /// Short name of the error kind, used in user-facing diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(_) => "StoreReadError",
            Self::Display { .. } => "DisplayWriteError",
            Self::OutOfOrder { .. } => "OutOfOrder",
            Self::LoaderPanicked { .. } => "LoaderPanicked",
            Self::Spawn { .. } => "SpawnError",
        }
    }
}
