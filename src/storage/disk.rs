//! Durable Record Store
//!
//! Persists one record per file (`<key>.msg`) inside the node's data directory.
//! Three interchangeable write strategies trade durability against throughput:
//!
//! - **Classic**: buffered writer, flushed once the payload is written.
//! - **Unbuffered**: direct write followed by `fsync`.
//! - **MemoryMapped**: the file is sized to the payload, mapped, filled and flushed.
//!
//! The strategy is fixed when the store is constructed.
//!
//! Access is serialized per key: a record is never read while it is being
//! rewritten. A memory-mapped read racing a truncating write would otherwise
//! fault on pages past the new end of file.

use anyhow::{Context, Result};
use clap::ValueEnum;
use dashmap::DashMap;
use memmap2::{Mmap, MmapOptions};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Key;

const RECORD_EXTENSION: &str = "msg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum IoMode {
    Classic,
    Unbuffered,
    #[value(name = "memory_mapped")]
    MemoryMapped,
}

impl IoMode {
    pub fn name(&self) -> &'static str {
        match self {
            IoMode::Classic => "CLASSIC",
            IoMode::Unbuffered => "UNBUFFERED",
            IoMode::MemoryMapped => "MEMORY_MAPPED",
        }
    }
}

/// Clones share the same directory and the same per-key locks.
#[derive(Debug, Clone)]
pub struct DiskStore {
    mode: IoMode,
    dir: PathBuf,
    locks: Arc<DashMap<Key, Arc<RwLock<()>>>>,
}

impl DiskStore {
    pub fn open(mode: IoMode, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;

        tracing::info!("Record store at {} ({})", dir.display(), mode.name());

        Ok(Self {
            mode,
            dir,
            locks: Arc::new(DashMap::new()),
        })
    }

    pub fn mode(&self) -> IoMode {
        self.mode
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: Key) -> PathBuf {
        self.dir.join(format!("{}.{}", key, RECORD_EXTENSION))
    }

    fn record_lock(&self, key: Key) -> Arc<RwLock<()>> {
        self.locks.entry(key).or_default().clone()
    }

    /// Writes `payload` under `key`, replacing any previous value.
    ///
    /// Returns the time spent in the write strategy itself.
    pub fn write(&self, key: Key, payload: &str) -> Result<Duration> {
        self.write_then(key, payload, || ())
    }

    /// Like [`DiskStore::write`], running `on_written` before the key is
    /// released so readers observe the record and the callback's effect together.
    pub fn write_then(
        &self,
        key: Key,
        payload: &str,
        on_written: impl FnOnce(),
    ) -> Result<Duration> {
        let lock = self.record_lock(key);
        let _guard = lock.write();

        let elapsed = self.write_record(key, payload)?;
        on_written();
        Ok(elapsed)
    }

    fn write_record(&self, key: Key, payload: &str) -> Result<Duration> {
        let path = self.record_path(key);
        let bytes = payload.as_bytes();

        let started = Instant::now();
        let written = match self.mode {
            IoMode::Classic => write_classic(&path, bytes),
            IoMode::Unbuffered => write_unbuffered(&path, bytes),
            IoMode::MemoryMapped => write_memory_mapped(&path, bytes),
        };
        written.with_context(|| format!("failed to write record {}", key))?;

        Ok(started.elapsed())
    }

    /// Reads the payload stored under `key`; `Ok(None)` when no record exists.
    pub fn read(&self, key: Key) -> Result<Option<String>> {
        self.read_then(key, |_| ())
    }

    /// Like [`DiskStore::read`], handing a found payload to `on_found` while
    /// writers of the key are still held off.
    pub fn read_then(&self, key: Key, on_found: impl FnOnce(&str)) -> Result<Option<String>> {
        let lock = self.record_lock(key);
        let _guard = lock.read();

        let loaded = self.read_record(key)?;
        if let Some(payload) = &loaded {
            on_found(payload);
        }
        Ok(loaded)
    }

    fn read_record(&self, key: Key) -> Result<Option<String>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = match self.mode {
            IoMode::Classic => read_classic(&path),
            IoMode::Unbuffered => fs::read(&path).map_err(anyhow::Error::from),
            IoMode::MemoryMapped => read_memory_mapped(&path),
        }
        .with_context(|| format!("failed to read record {}", key))?;

        let payload = String::from_utf8(bytes)
            .with_context(|| format!("record {} is not valid UTF-8", key))?;

        Ok(Some(payload))
    }

    pub fn exists(&self, key: Key) -> bool {
        self.record_path(key).exists()
    }

    fn records(&self) -> Result<Vec<fs::Metadata>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION) {
                records.push(entry.metadata()?);
            }
        }
        Ok(records)
    }

    /// Number of records on disk.
    pub fn file_count(&self) -> usize {
        match self.records() {
            Ok(records) => records.len(),
            Err(e) => {
                tracing::warn!("Failed to list {}: {}", self.dir.display(), e);
                0
            }
        }
    }

    /// Sum of all record sizes in bytes.
    pub fn total_bytes(&self) -> u64 {
        match self.records() {
            Ok(records) => records.iter().map(|meta| meta.len()).sum(),
            Err(e) => {
                tracing::warn!("Failed to list {}: {}", self.dir.display(), e);
                0
            }
        }
    }
}

fn write_classic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

fn write_unbuffered(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn write_memory_mapped(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.set_len(bytes.len() as u64)?;

    // A zero-length mapping is rejected by the OS; the truncated file is the record.
    if bytes.is_empty() {
        file.sync_all()?;
        return Ok(());
    }

    // SAFETY: called with the key's write lock held, so no other mapping of
    // this file exists in the process.
    let mut mmap = unsafe { MmapOptions::new().len(bytes.len()).map_mut(&file)? };
    mmap.copy_from_slice(bytes);
    mmap.flush()?;
    Ok(())
}

fn read_classic(path: &Path) -> Result<Vec<u8>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_memory_mapped(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }

    // SAFETY: called with the key's read lock held, so the file cannot be
    // truncated underneath the mapping; the bytes are copied out before it drops.
    let mmap: Mmap = unsafe { MmapOptions::new().map(&file)? };
    Ok(mmap.to_vec())
}
