//! Append-only score log
//!
//! Durable storage for game score events received from the message bus.
//! The log holds one JSON record per line; existing lines are never
//! rewritten, so a crash mid-append can at worst leave a torn trailing
//! line, which readers skip and the next append heals.

use crate::time::{epoch_now, format_local_date};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// One reported game score, as received on the score topic
///
/// Every field is optional on the wire and passed through without
/// validation of presence or range. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreReport {
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub score: Option<serde_json::Number>,
}

/// One persisted score log entry
///
/// `ts` is stamped once at receipt and never changes; `date` is its local
/// rendering, stored redundantly so readers can display it directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRecord {
    pub ssid: Option<String>,
    pub username: Option<String>,
    pub score: Option<serde_json::Number>,
    pub ts: i64,
    pub date: String,
}

impl ScoreRecord {
    /// Build a record from a wire report, stamped with the current time
    pub fn from_report(report: ScoreReport) -> Self {
        Self::from_report_at(report, epoch_now())
    }

    /// Build a record from a wire report at an explicit receipt time
    pub fn from_report_at(report: ScoreReport, ts: i64) -> Self {
        Self {
            ssid: report.ssid,
            username: report.username,
            score: report.score,
            ts,
            date: format_local_date(ts),
        }
    }
}

/// Append-only, file-backed score log
///
/// Exactly one writer (the ingest dispatcher) appends; any number of
/// reader threads may call [`ScoreLog::read_recent`] concurrently. The
/// writer side is serialized by an explicit mutex rather than relying on
/// callers to uphold a single-writer convention.
#[derive(Debug)]
pub struct ScoreLog {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl ScoreLog {
    /// Create a handle to the log at `path`.
    ///
    /// No I/O happens here; the file and its parent directory are created
    /// on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. The record is written out before this returns.
    pub fn append(&self, record: &ScoreRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;

        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.path)?;

        // Heal a torn trailing line left by a crash mid-append, so the new
        // record cannot merge into it.
        let len = file.metadata()?.len();
        if len > 0 {
            file.seek(SeekFrom::End(-1))?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        // One write call keeps the line contiguous for concurrent readers.
        let mut buf = line.into_bytes();
        buf.push(b'\n');
        file.write_all(&buf)?;

        Ok(())
    }

    /// Load every record in append order.
    ///
    /// An absent file reads as an empty log. Lines that fail to parse
    /// (e.g. a torn trailing line after a crash) are skipped, never fatal.
    pub fn load(&self) -> Vec<ScoreRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unparsable score log line: {}", e);
                    None
                }
            })
            .collect()
    }

    /// The most recent `n` records, newest first
    pub fn read_recent(&self, n: usize) -> Vec<ScoreRecord> {
        self.load().into_iter().rev().take(n).collect()
    }
}
