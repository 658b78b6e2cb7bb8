//! Append-only write-ahead log over a single file.
//!
//! The WAL owns LSN assignment: `append` stamps each record with the next
//! sequence number under the internal mutex, so LSN order and byte order in
//! the file always agree. Appends are buffered by the OS until `flush`,
//! which fsyncs; a bounded number of appends (100) forces an automatic
//! flush. Callers that need a specific record durable call `flush`
//! themselves, which the transaction manager does on every commit.
//!
//! On open, the file is scanned forward record by record. The scan stops at
//! the first record that fails its CRC or runs past the end of the file;
//! everything after that point is a torn tail from an interrupted write and
//! is truncated away.

use crate::record::{LogRecord, RecordError};
use brine_core::{Error, Lsn, Result};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// File name of the log under the data directory.
pub const WAL_FILE: &str = "wal.log";

/// Appends buffered before an automatic flush.
pub const AUTO_FLUSH_APPENDS: usize = 100;

/// The write-ahead log.
///
/// A single mutex serializes `append`, `flush`, `read_from` and `truncate`.
/// `last_lsn` is additionally kept in an atomic so observers can read it
/// without taking the mutex; mutation happens only under the mutex.
pub struct Wal {
    path: PathBuf,
    inner: Mutex<WalInner>,
    last_lsn: AtomicU64,
}

struct WalInner {
    file: File,
    /// Appends since the last fsync.
    staged: usize,
}

impl Wal {
    /// Open or create the log file under `data_dir`.
    ///
    /// Scans any existing records to restore `last_lsn` and truncates a
    /// torn tail left by a crash mid-append.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(WAL_FILE);

        let mut last_lsn = 0u64;
        let mut valid_end = 0u64;
        let mut torn = false;

        if path.exists() {
            let bytes = fs::read(&path)?;
            let mut offset = 0usize;
            while offset < bytes.len() {
                match LogRecord::from_bytes(&bytes[offset..]) {
                    Ok((record, consumed)) => {
                        last_lsn = last_lsn.max(record.lsn);
                        offset += consumed;
                    }
                    Err(reason) => {
                        warn!(
                            offset,
                            %reason,
                            "torn record at WAL tail, truncating"
                        );
                        torn = true;
                        break;
                    }
                }
            }
            valid_end = offset as u64;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        if torn {
            file.set_len(valid_end)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::End(0))?;

        info!(path = %path.display(), last_lsn, "WAL opened");

        Ok(Wal {
            path,
            inner: Mutex::new(WalInner { file, staged: 0 }),
            last_lsn: AtomicU64::new(last_lsn),
        })
    }

    /// Append a record, assigning it the next LSN.
    ///
    /// The assigned LSN is burned even if the write itself fails, so LSNs
    /// stay monotonic for subsequent appends. A record is only guaranteed
    /// durable after the next successful `flush`.
    pub fn append(&self, record: &mut LogRecord) -> Result<Lsn> {
        let mut inner = self.inner.lock();

        let lsn = self.last_lsn.load(Ordering::Relaxed) + 1;
        self.last_lsn.store(lsn, Ordering::Relaxed);
        record.lsn = lsn;

        let bytes = record.to_bytes();
        if let Err(e) = inner.file.write_all(&bytes) {
            error!(lsn, "WAL append failed: {e}");
            return Err(e.into());
        }
        inner.staged += 1;

        if inner.staged >= AUTO_FLUSH_APPENDS {
            debug!(lsn, "auto-flushing WAL after {AUTO_FLUSH_APPENDS} appends");
            Self::flush_inner(&mut inner)?;
        }

        Ok(lsn)
    }

    /// Force all appended records to disk.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::flush_inner(&mut inner)
    }

    fn flush_inner(inner: &mut WalInner) -> Result<()> {
        inner.file.sync_data()?;
        inner.staged = 0;
        Ok(())
    }

    /// Highest LSN assigned so far; 0 on a fresh log.
    pub fn last_lsn(&self) -> Lsn {
        self.last_lsn.load(Ordering::Relaxed)
    }

    /// Read every durable record with `lsn >= start_lsn`, in LSN order.
    ///
    /// A record that fails its CRC ends the read; the prefix read so far is
    /// returned and the tail is treated as torn.
    pub fn read_from(&self, start_lsn: Lsn) -> Result<Vec<LogRecord>> {
        let _inner = self.inner.lock();
        let bytes = fs::read(&self.path)?;

        let mut records = Vec::new();
        let mut offset = 0usize;
        while offset < bytes.len() {
            match LogRecord::from_bytes(&bytes[offset..]) {
                Ok((record, consumed)) => {
                    if record.lsn >= start_lsn {
                        records.push(record);
                    }
                    offset += consumed;
                }
                Err(reason) => {
                    warn!(offset, %reason, "stopping WAL read at damaged record");
                    break;
                }
            }
        }
        Ok(records)
    }

    /// Drop every record with `lsn < keep_from`.
    ///
    /// The surviving records are written to a temporary file which is then
    /// renamed over the log, so an interrupted truncate leaves the original
    /// intact.
    pub fn truncate(&self, keep_from: Lsn) -> Result<()> {
        let mut inner = self.inner.lock();

        let bytes = fs::read(&self.path)?;
        let mut kept = Vec::new();
        let mut dropped = 0usize;
        let mut offset = 0usize;
        while offset < bytes.len() {
            match LogRecord::from_bytes(&bytes[offset..]) {
                Ok((record, consumed)) => {
                    if record.lsn >= keep_from {
                        kept.extend_from_slice(&bytes[offset..offset + consumed]);
                    } else {
                        dropped += 1;
                    }
                    offset += consumed;
                }
                Err(_) => break,
            }
        }

        let tmp_path = self.path.with_extension("log.tmp");
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(&kept)?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path)?;

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.seek(SeekFrom::End(0))?;
        inner.file = file;
        inner.staged = 0;

        info!(keep_from, dropped, "WAL truncated");
        Ok(())
    }

    /// Flush and release the log.
    pub fn close(&self) -> Result<()> {
        self.flush()
    }

    /// Check that the durable records are well formed and strictly
    /// LSN-ordered. Diagnostic; used by the engine's integrity check.
    pub fn verify(&self) -> Result<bool> {
        let records = self.read_from(1)?;
        let mut prev = 0u64;
        for record in &records {
            if record.lsn <= prev {
                error!(lsn = record.lsn, prev, "WAL LSN order violation");
                return Ok(false);
            }
            prev = record.lsn;
        }
        Ok(true)
    }
}

impl From<RecordError> for Error {
    fn from(e: RecordError) -> Self {
        Error::Corruption(e.to_string())
    }
}
