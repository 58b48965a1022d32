//! Keyed storage for encoded frames

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::capture::EncodedFrame;
use crate::error::StoreReadError;

/// File extension used for encoded frames on disk
pub const FRAME_EXTENSION: &str = "tframe";

/// Read side of a frame store, indexed from 1
pub trait FrameStore: Send + Sync {
    fn get(&self, index: u64) -> Result<Bytes, StoreReadError>;
    fn exists(&self, index: u64) -> bool;
}

/// One `<index>.tframe` file per frame
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open the directory for writing, creating it if needed
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{index}.{FRAME_EXTENSION}"))
    }

    pub fn put(&self, index: u64, frame: &EncodedFrame) -> io::Result<()> {
        let path = self.path_for(index);
        fs::write(&path, frame.as_bytes())?;
        debug!("Stored frame {} ({} bytes)", index, frame.len());
        Ok(())
    }
}

impl FrameStore for DirStore {
    fn get(&self, index: u64) -> Result<Bytes, StoreReadError> {
        let io_err = |source| StoreReadError::Io { index, source };

        let mut file = match File::open(self.path_for(index)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreReadError::Missing { index })
            }
            Err(e) => return Err(io_err(e)),
        };

        let expected = file.metadata().map_err(io_err)?.len();
        if expected == 0 {
            return Err(StoreReadError::Empty { index });
        }

        let mut buf = Vec::with_capacity(expected as usize);
        file.read_to_end(&mut buf).map_err(io_err)?;
        let actual = buf.len() as u64;
        if actual < expected {
            return Err(StoreReadError::Truncated {
                index,
                expected,
                actual,
            });
        }

        Ok(Bytes::from(buf))
    }

    fn exists(&self, index: u64) -> bool {
        self.path_for(index).is_file()
    }
}

/// In-process store, mainly for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    frames: HashMap<u64, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u64, data: impl Into<Bytes>) {
        self.frames.insert(index, data.into());
    }

    pub fn remove(&mut self, index: u64) -> Option<Bytes> {
        self.frames.remove(&index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FromIterator<(u64, Bytes)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (u64, Bytes)>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl FrameStore for MemoryStore {
    fn get(&self, index: u64) -> Result<Bytes, StoreReadError> {
        match self.frames.get(&index) {
            Some(data) if data.is_empty() => Err(StoreReadError::Empty { index }),
            Some(data) => Ok(data.clone()),
            None => Err(StoreReadError::Missing { index }),
        }
    }

    fn exists(&self, index: u64) -> bool {
        self.frames.contains_key(&index)
    }
}
