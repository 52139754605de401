//! Storage layer for leadline
//!
//! All durable client-side state lives under one data directory.
//!
//! # Directory Structure
//!
//! ```text
//! <data-dir>/
//!   config.toml        # Optional configuration
//!   tasks.json         # File-backed task record source
//!   kv.json            # Durable key/value store (read markers live here)
//!   activity.jsonl     # Append-only call/status activity trail
//!   *.lock             # Lock files guarding the above
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "LEADLINE_DATA_DIR";

/// Storage manager for the data directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Resolve the data directory: explicit path, then the platform data dir.
    ///
    /// `LEADLINE_DATA_DIR` is handled by the CLI argument parser.
    pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        directories::ProjectDirs::from("dev", "leadline", "leadline")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "cannot determine a data directory; pass --data-dir or set {DATA_DIR_ENV}"
                ))
            })
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_timeout_ms(&self) -> u64 {
        self.lock_timeout_ms
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.root.join("tasks.json")
    }

    pub fn kv_file(&self) -> PathBuf {
        self.root.join("kv.json")
    }

    pub fn activity_file(&self) -> PathBuf {
        self.root.join("activity.jsonl")
    }

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    // =========================================================================
    // JSON helpers
    // =========================================================================

    /// Read JSON under the file's lock; `None` when missing.
    pub fn read_json_locked<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match lock::read_locked(path, self.lock_timeout_ms)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write a JSON document under its lock.
    pub fn update_json<T, R, F>(&self, path: &Path, apply: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> Result<R>,
    {
        lock::update_locked(path, self.lock_timeout_ms, |current| {
            let mut doc: T = match current {
                Some(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)?,
                _ => T::default(),
            };
            let result = apply(&mut doc)?;
            let json = serde_json::to_vec_pretty(&doc)?;
            Ok((Some(json), result))
        })
    }

    /// Append one record to a JSONL file under its lock.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        let _lock = FileLock::acquire(lock::lock_path_for(path), self.lock_timeout_ms)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", json)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read all records from a JSONL file
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    pub fn kv(&self) -> KvStore {
        KvStore {
            storage: self.clone(),
        }
    }
}

/// Durable string key/value store backed by `kv.json`.
///
/// Values are opaque strings; callers JSON-encode structured values.
#[derive(Debug, Clone)]
pub struct KvStore {
    storage: Storage,
}

type KvDocument = BTreeMap<String, String>;

impl KvStore {
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let doc: Option<KvDocument> = self.storage.read_json_locked(&self.storage.kv_file())?;
        Ok(doc.and_then(|mut doc| doc.remove(key)))
    }

    pub fn set(&self, key: &str, value: String) -> Result<()> {
        self.storage
            .update_json(&self.storage.kv_file(), |doc: &mut KvDocument| {
                doc.insert(key.to_string(), value);
                Ok(())
            })
    }

    /// Atomically rewrite one key from its current value.
    pub fn update<R, F>(&self, key: &str, apply: F) -> Result<R>
    where
        F: FnOnce(Option<&str>) -> Result<(String, R)>,
    {
        self.storage
            .update_json(&self.storage.kv_file(), |doc: &mut KvDocument| {
                let (next, result) = apply(doc.get(key).map(String::as_str))?;
                doc.insert(key.to_string(), next);
                Ok(result)
            })
    }
}
