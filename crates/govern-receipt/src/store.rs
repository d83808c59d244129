//! # Receipt Stores
//!
//! [`ReceiptStore`] is the persistence capability the engine depends on.
//! Two implementations:
//!
//! - [`MemoryReceiptStore`]: append-ordered list indexed by agent and id.
//! - [`FileReceiptStore`]: append-only JSON-lines log, one canonical receipt
//!   per line, with the same in-memory index rebuilt on open.
//!
//! [`ReceiptLog`] is a read-only snapshot of a log file for inspection. It
//! never creates, truncates or locks the file.
//!
//! ## Durability
//!
//! A file append writes the whole line with one `write_all`, then
//! `sync_data`, and only then indexes the receipt and reports success.
//! Appends are serialized by a mutex, so concurrent writers never
//! interleave lines. A crash mid-write can leave an unterminated trailing
//! line; [`FileReceiptStore::open`] truncates it away with a warning. A
//! complete line that fails to parse is corruption and is reported, not
//! skipped.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use govern_core::{CanonicalBytes, StorageError, Timestamp};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::receipt::Receipt;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Filter for [`ReceiptStore::query`]. Bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptQuery {
    /// Only receipts for this agent.
    pub agent_id: Option<String>,
    /// Not before this instant.
    pub start: Option<Timestamp>,
    /// Not after this instant.
    pub end: Option<Timestamp>,
    /// At most this many, earliest first.
    pub limit: Option<usize>,
}

impl ReceiptQuery {
    /// Match everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match one agent.
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Self::default()
        }
    }

    /// Set the inclusive lower bound.
    pub fn since(mut self, start: Timestamp) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the inclusive upper bound.
    pub fn until(mut self, end: Timestamp) -> Self {
        self.end = Some(end);
        self
    }

    /// Cap the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn in_range(&self, ts: &Timestamp) -> bool {
        self.start.as_ref().map_or(true, |s| ts >= s) && self.end.as_ref().map_or(true, |e| ts <= e)
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Persists and queries receipts.
pub trait ReceiptStore: Send + Sync {
    /// Persist one receipt. Fails on a duplicate `receipt_id`.
    fn append(&self, receipt: &Receipt) -> Result<(), StorageError>;

    /// Receipts matching `query`, ascending by timestamp, append order for
    /// ties.
    fn query(&self, query: &ReceiptQuery) -> Result<Vec<Receipt>, StorageError>;

    /// Look up one receipt.
    fn get(&self, receipt_id: &Uuid) -> Result<Option<Receipt>, StorageError>;

    /// Number of stored receipts.
    fn len(&self) -> usize;

    /// True if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Shared index
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ReceiptIndex {
    receipts: Vec<Receipt>,
    by_agent: HashMap<String, Vec<usize>>,
    by_id: HashMap<Uuid, usize>,
}

impl ReceiptIndex {
    fn contains(&self, id: &Uuid) -> bool {
        self.by_id.contains_key(id)
    }

    fn insert(&mut self, receipt: Receipt) -> Result<(), StorageError> {
        if self.contains(&receipt.receipt_id) {
            return Err(StorageError::Duplicate(receipt.receipt_id.to_string()));
        }
        let pos = self.receipts.len();
        self.by_id.insert(receipt.receipt_id, pos);
        self.by_agent
            .entry(receipt.agent_id.clone())
            .or_default()
            .push(pos);
        self.receipts.push(receipt);
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Option<Receipt> {
        self.by_id.get(id).map(|&pos| self.receipts[pos].clone())
    }

    fn query(&self, query: &ReceiptQuery) -> Vec<Receipt> {
        let mut positions: Vec<usize> = match &query.agent_id {
            Some(agent) => self.by_agent.get(agent).cloned().unwrap_or_default(),
            None => (0..self.receipts.len()).collect(),
        };
        positions.retain(|&pos| query.in_range(&self.receipts[pos].timestamp));
        // Positions are in append order; a stable sort keeps it for ties.
        positions.sort_by_key(|&pos| self.receipts[pos].timestamp);
        if let Some(limit) = query.limit {
            positions.truncate(limit);
        }
        positions
            .into_iter()
            .map(|pos| self.receipts[pos].clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.receipts.len()
    }
}

// ---------------------------------------------------------------------------
// MemoryReceiptStore
// ---------------------------------------------------------------------------

/// Volatile store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryReceiptStore {
    index: RwLock<ReceiptIndex>,
}

impl MemoryReceiptStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReceiptStore for MemoryReceiptStore {
    fn append(&self, receipt: &Receipt) -> Result<(), StorageError> {
        self.index.write().insert(receipt.clone())
    }

    fn query(&self, query: &ReceiptQuery) -> Result<Vec<Receipt>, StorageError> {
        Ok(self.index.read().query(query))
    }

    fn get(&self, receipt_id: &Uuid) -> Result<Option<Receipt>, StorageError> {
        Ok(self.index.read().get(receipt_id))
    }

    fn len(&self) -> usize {
        self.index.read().len()
    }
}

// ---------------------------------------------------------------------------
// FileReceiptStore
// ---------------------------------------------------------------------------

/// Append-only JSON-lines receipt log.
pub struct FileReceiptStore {
    path: PathBuf,
    file: Mutex<File>,
    index: RwLock<ReceiptIndex>,
}

impl FileReceiptStore {
    /// Open or create the log at `path` and index its receipts.
    ///
    /// # Errors
    ///
    /// I/O failures, a malformed complete line ([`StorageError::Corrupt`]),
    /// or the same receipt id on two lines ([`StorageError::Duplicate`]).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let (index, valid_len) = load_index(&contents)?;
        if valid_len < contents.len() {
            tracing::warn!(
                path = %path.display(),
                discarded_bytes = contents.len() - valid_len,
                "truncating unterminated trailing record in receipt log"
            );
            file.set_len(valid_len as u64)?;
            file.sync_data()?;
        }

        tracing::info!(path = %path.display(), receipts = index.len(), "opened receipt log");
        Ok(Self {
            path,
            file: Mutex::new(file),
            index: RwLock::new(index),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse complete lines; returns the index and the byte length of the
/// complete-line prefix.
fn load_index(contents: &[u8]) -> Result<(ReceiptIndex, usize), StorageError> {
    let mut index = ReceiptIndex::default();
    let mut offset = 0;
    let mut line_no = 0;
    while let Some(newline) = contents[offset..].iter().position(|&b| b == b'\n') {
        line_no += 1;
        let line = &contents[offset..offset + newline];
        offset += newline + 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let receipt: Receipt =
            serde_json::from_slice(line).map_err(|e| StorageError::Corrupt {
                line: line_no,
                reason: e.to_string(),
            })?;
        index.insert(receipt)?;
    }
    Ok((index, offset))
}

impl ReceiptStore for FileReceiptStore {
    fn append(&self, receipt: &Receipt) -> Result<(), StorageError> {
        let mut line = CanonicalBytes::new(receipt)?.into_bytes();
        line.push(b'\n');

        let mut file = self.file.lock();
        if self.index.read().contains(&receipt.receipt_id) {
            return Err(StorageError::Duplicate(receipt.receipt_id.to_string()));
        }

        let before = file.metadata()?.len();
        if let Err(e) = file.write_all(&line).and_then(|_| file.sync_data()) {
            // Leave no partial line behind for the next append to extend.
            if let Err(trunc) = file.set_len(before) {
                tracing::warn!(error = %trunc, "failed to roll back partial receipt write");
            }
            return Err(e.into());
        }

        self.index.write().insert(receipt.clone())?;
        tracing::debug!(receipt_id = %receipt.receipt_id, agent_id = %receipt.agent_id, "receipt persisted");
        Ok(())
    }

    fn query(&self, query: &ReceiptQuery) -> Result<Vec<Receipt>, StorageError> {
        Ok(self.index.read().query(query))
    }

    fn get(&self, receipt_id: &Uuid) -> Result<Option<Receipt>, StorageError> {
        Ok(self.index.read().get(receipt_id))
    }

    fn len(&self) -> usize {
        self.index.read().len()
    }
}

// ---------------------------------------------------------------------------
// ReceiptLog
// ---------------------------------------------------------------------------

/// Read-only snapshot of a JSON-lines receipt log.
///
/// An unterminated trailing line is left on disk and skipped; a writer
/// reopening the log with [`FileReceiptStore::open`] decides what to do
/// with it.
#[derive(Debug)]
pub struct ReceiptLog {
    path: PathBuf,
    index: ReceiptIndex,
    torn_bytes: usize,
}

impl ReceiptLog {
    /// Read and index the log at `path`. A missing file is an I/O error.
    ///
    /// # Errors
    ///
    /// Same as [`FileReceiptStore::open`], except that nothing is created.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut contents = Vec::new();
        File::open(&path)?.read_to_end(&mut contents)?;

        let (index, valid_len) = load_index(&contents)?;
        let torn_bytes = contents.len() - valid_len;
        if torn_bytes > 0 {
            tracing::warn!(
                path = %path.display(),
                ignored_bytes = torn_bytes,
                "ignoring unterminated trailing record in receipt log"
            );
        }
        tracing::debug!(path = %path.display(), receipts = index.len(), "loaded receipt log");
        Ok(Self {
            path,
            index,
            torn_bytes,
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes after the last complete line.
    pub fn torn_bytes(&self) -> usize {
        self.torn_bytes
    }

    /// Receipts matching `query`, with [`ReceiptStore::query`] ordering.
    pub fn query(&self, query: &ReceiptQuery) -> Vec<Receipt> {
        self.index.query(query)
    }

    /// Look up one receipt.
    pub fn get(&self, receipt_id: &Uuid) -> Option<Receipt> {
        self.index.get(receipt_id)
    }

    /// Number of complete receipts.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if the log holds no complete receipt.
    pub fn is_empty(&self) -> bool {
        self.index.len() == 0
    }
}

impl std::fmt::Debug for FileReceiptStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReceiptStore")
            .field("path", &self.path)
            .field("receipts", &self.len())
            .finish()
    }
}
