// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage
//!
//! One JSON object per line, each carrying a sequence number and a CRC32 of
//! the serialized operation. Replay stops at the first line that fails to
//! parse or verify; everything after it is treated as a torn write.

use ms_core::Operation;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single line in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WalEntry {
    seq: u64,
    op: Operation,
    checksum: u32,
}

impl WalEntry {
    fn new(seq: u64, op: Operation) -> Result<Self, WalError> {
        let checksum = checksum(&op)?;
        Ok(Self { seq, op, checksum })
    }

    fn verify(&self) -> bool {
        checksum(&self.op).is_ok_and(|c| c == self.checksum)
    }
}

fn checksum(op: &Operation) -> Result<u32, WalError> {
    let json = serde_json::to_string(op)?;
    Ok(crc32fast::hash(json.as_bytes()))
}

/// Result of reading a log from disk
#[derive(Debug, Default)]
pub struct Replay {
    pub ops: Vec<Operation>,
    /// Sequence number of the last valid entry
    pub last_sequence: u64,
    /// Byte length of the valid prefix
    pub valid_len: u64,
    /// Line number of the first invalid entry, if any
    pub corrupted_at: Option<u64>,
}

/// Write-ahead log for durable operation storage
pub struct Wal {
    path: PathBuf,
    file: File,
    sequence: u64,
}

impl Wal {
    /// Open or create a WAL at the given path
    ///
    /// A torn tail left by a crash is cut off so new entries follow the last
    /// valid one. Returns the log together with the operations it replayed.
    pub fn open(path: &Path) -> Result<(Self, Replay), WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let replay = Self::replay(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if replay.corrupted_at.is_some() {
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        let wal = Self {
            path: path.to_path_buf(),
            file,
            sequence: replay.last_sequence,
        };
        Ok((wal, replay))
    }

    /// Append an operation to the log
    ///
    /// The entry is fsync'd before this returns.
    pub fn append(&mut self, op: &Operation) -> Result<u64, WalError> {
        let entry = WalEntry::new(self.sequence + 1, op.clone())?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.sync_all()?;
        self.sequence = entry.seq;
        Ok(self.sequence)
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the log contents with `ops`
    ///
    /// Writes a temporary file next to the log and renames it over the
    /// original, so a crash leaves either the old or the new log intact.
    /// Sequence numbers restart at 1.
    pub fn rewrite(&mut self, ops: &[Operation]) -> Result<(), WalError> {
        let temp_path = self.path.with_extension("wal.compact.tmp");
        {
            let mut temp = File::create(&temp_path)?;
            for (i, op) in ops.iter().enumerate() {
                let entry = WalEntry::new(i as u64 + 1, op.clone())?;
                let line = serde_json::to_string(&entry)?;
                temp.write_all(line.as_bytes())?;
                temp.write_all(b"\n")?;
            }
            temp.sync_all()?;
        }
        std::fs::rename(&temp_path, &self.path)?;

        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.sequence = ops.len() as u64;
        Ok(())
    }

    /// Replay all valid operations from the log
    pub fn replay(path: &Path) -> Result<Replay, WalError> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e.into()),
        };

        let mut replay = Replay::default();
        let mut offset = 0u64;
        for (index, raw) in bytes.split_inclusive(|b| *b == b'\n').enumerate() {
            let line_number = index as u64 + 1;
            let complete = raw.last() == Some(&b'\n');
            let text = std::str::from_utf8(raw).map(str::trim).unwrap_or("");

            if complete && text.is_empty() {
                offset += raw.len() as u64;
                replay.valid_len = offset;
                continue;
            }

            let entry = match serde_json::from_str::<WalEntry>(text) {
                Ok(entry) if complete && entry.verify() => entry,
                _ => {
                    replay.corrupted_at = Some(line_number);
                    break;
                }
            };

            offset += raw.len() as u64;
            replay.valid_len = offset;
            replay.last_sequence = entry.seq;
            replay.ops.push(entry.op);
        }

        Ok(replay)
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
