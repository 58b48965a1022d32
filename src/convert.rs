//! Batch stage: decode source images, encode them and write them to a store

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::capture::FrameSource;
use crate::encode::Encoder;
use crate::error::ConvertError;
use crate::store::DirStore;

/// Progress is logged every this many frames
const PROGRESS_EVERY: u64 = 100;

#[derive(Debug, Default)]
pub struct ConvertReport {
    pub converted: u64,
    /// Failed frames in index order; the batch keeps going past them
    pub failures: Vec<ConvertError>,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

impl ConvertReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Converter {
    encoder: Encoder,
}

impl Converter {
    pub fn new(encoder: Encoder) -> Self {
        Self { encoder }
    }

    #[instrument(skip_all, fields(total = total, dir = %sink.dir().display()))]
    pub fn run(&self, total: u64, source: &dyn FrameSource, sink: &DirStore) -> ConvertReport {
        let started = Instant::now();
        let mut report = ConvertReport::default();

        for index in 1..=total {
            match self.convert_one(index, source, sink) {
                Ok(bytes) => {
                    report.converted += 1;
                    report.bytes_written += bytes;
                    metrics::counter!("frames_converted").increment(1);
                }
                Err(e) => {
                    warn!("Skipping frame: {}", e);
                    report.failures.push(e);
                }
            }

            if index % PROGRESS_EVERY == 0 {
                info!("Processed {}/{} frames", index, total);
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "Converted {} frames ({} failed, {} bytes) in {:.3}s",
            report.converted,
            report.failures.len(),
            report.bytes_written,
            report.elapsed.as_secs_f64()
        );
        report
    }

    fn convert_one(
        &self,
        index: u64,
        source: &dyn FrameSource,
        sink: &DirStore,
    ) -> Result<u64, ConvertError> {
        let grid = source
            .grid(index)
            .map_err(|source| ConvertError::Source { index, source })?;
        let frame = self
            .encoder
            .encode(&grid)
            .map_err(|source| ConvertError::Encode { index, source })?;
        sink.put(index, &frame)
            .map_err(|source| ConvertError::Write { index, source })?;

        debug!("Frame {}: {}x{}", index, grid.width(), grid.height());
        Ok(frame.len() as u64)
    }
}
