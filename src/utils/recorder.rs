//! recorder.rs
//! Non-blocking telemetry recorder with background CSV export.
//!
//! `on_tick` pushes into a bounded lock-free queue and returns immediately; samples
//! are dropped (and counted) when the queue is full. A background thread drains the
//! queue into a CSV file, one row per tick.

use std::{
    fs::{File, create_dir_all},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_queue::ArrayQueue;
use log::{error, info};
use parking_lot::Mutex;

use crate::runtime::history::TelemetrySample;
use crate::utils::{
    error::{ControlError, ControlResult},
    sink::{RunnerEvent, TelemetrySink},
};

pub const SAMPLE_QUEUE_CAPACITY: usize = 16_384;
const DRAIN_IDLE: Duration = Duration::from_millis(10);

pub struct CsvRecorder {
    queue: Arc<ArrayQueue<TelemetrySample>>,
    closed: Arc<AtomicBool>,
    dropped: AtomicU64,
    path: PathBuf,
    exporter: Mutex<Option<JoinHandle<ControlResult<u64>>>>,
}

impl CsvRecorder {
    /// Creates the output file and spawns the exporter thread.
    pub fn create(path: impl AsRef<Path>) -> ControlResult<Self> {
        Self::with_capacity(path, SAMPLE_QUEUE_CAPACITY)
    }

    pub fn with_capacity(path: impl AsRef<Path>, capacity: usize) -> ControlResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir).map_err(|source| ControlError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(&path).map_err(|source| ControlError::Io {
            path: path.clone(),
            source,
        })?;

        let queue = Arc::new(ArrayQueue::new(capacity.max(1)));
        let closed = Arc::new(AtomicBool::new(false));

        let exporter = {
            let queue = queue.clone();
            let closed = closed.clone();
            let out = path.clone();
            thread::Builder::new()
                .name("csv-exporter".into())
                .spawn(move || drain(file, &out, &queue, &closed))
                .map_err(ControlError::Spawn)?
        };

        Ok(Self {
            queue,
            closed,
            dropped: AtomicU64::new(0),
            path,
            exporter: Mutex::new(Some(exporter)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples lost to a full queue.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops accepting samples, drains what is queued and flushes the file.
    /// Returns rows written. Later calls return `Ok(0)`.
    pub fn finish(&self) -> ControlResult<u64> {
        self.closed.store(true, Ordering::Release);
        let Some(handle) = self.exporter.lock().take() else {
            return Ok(0);
        };
        let rows = match handle.join() {
            Ok(result) => result?,
            Err(_) => {
                error!("CSV exporter thread panicked for {:?}", self.path);
                0
            }
        };
        info!(
            "[Recorder] {} rows written to {:?} ({} dropped)",
            rows,
            self.path,
            self.dropped()
        );
        Ok(rows)
    }
}

impl TelemetrySink for CsvRecorder {
    #[inline]
    fn on_tick(&self, sample: &TelemetrySample) {
        if self.closed.load(Ordering::Relaxed) || self.queue.push(*sample).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_event(&self, _event: &RunnerEvent) {}
}

impl Drop for CsvRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!("CSV export to {:?} failed: {}", self.path, e);
        }
    }
}

/// Exporter loop: exits once closed and empty.
fn drain(
    file: File,
    path: &Path,
    queue: &ArrayQueue<TelemetrySample>,
    closed: &AtomicBool,
) -> ControlResult<u64> {
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    let mut rows = 0u64;

    loop {
        match queue.pop() {
            Some(sample) => {
                writer.serialize(sample)?;
                rows += 1;
            }
            None => {
                if closed.load(Ordering::Acquire) && queue.is_empty() {
                    break;
                }
                thread::sleep(DRAIN_IDLE);
            }
        }
    }

    writer.flush().map_err(|source| ControlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(rows)
}
