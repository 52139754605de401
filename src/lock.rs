//! File locking and atomic writes for the data directory
//!
//! Several leadline processes (a `notify watch` session plus one-shot
//! `notify read` calls, for example) share the same files. Writers:
//! - hold an exclusive `fs2` lock on a sibling `<file>.lock`
//! - write a temp file in the same directory and rename it over the target
//!
//! Readers never observe a partially written file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const LOCK_RETRY_INTERVAL_MS: u64 = 25;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // Windows reports sharing/lock violations as raw OS errors 32/33.
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// A file lock guard that releases the lock when dropped
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock, retrying until `timeout_ms` elapses.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Try to acquire a lock without waiting
    ///
    /// Returns `Ok(None)` when another holder has it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FileLock {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if is_lock_contended(&e) => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Path to the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Lock file guarding `path`.
pub fn lock_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

/// Atomically replace `path` with `data` (temp file + rename).
///
/// Does not lock; callers coordinating with other processes use
/// [`update_locked`] or hold a [`FileLock`] themselves.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension(format!(
        "{}.tmp.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Read-modify-write `path` under its lock file.
///
/// `apply` receives the current contents (`None` when the file does not
/// exist yet) and returns the new contents plus a value handed back to the
/// caller. Returning `None` as new contents leaves the file untouched.
pub fn update_locked<T, F>(path: impl AsRef<Path>, timeout_ms: u64, apply: F) -> Result<T>
where
    F: FnOnce(Option<Vec<u8>>) -> Result<(Option<Vec<u8>>, T)>,
{
    let path = path.as_ref();
    let _lock = FileLock::acquire(lock_path_for(path), timeout_ms)?;

    let current = match fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => return Err(Error::Io(err)),
    };

    let (next, value) = apply(current)?;
    if let Some(next) = next {
        write_atomic(path, &next)?;
    }
    Ok(value)
}

/// Read `path` while holding its lock; `None` when missing.
pub fn read_locked(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Option<Vec<u8>>> {
    let path = path.as_ref();
    let _lock = FileLock::acquire(lock_path_for(path), timeout_ms)?;

    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("kv.json.lock");

        let lock = FileLock::acquire(&lock_path, 1000).unwrap();
        assert!(FileLock::try_acquire(&lock_path).unwrap().is_none());

        drop(lock);
        assert!(FileLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn timeout_returns_lock_failed() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("tasks.json.lock");

        let _lock = FileLock::acquire(&lock_path, 1000).unwrap();
        let result = FileLock::acquire(&lock_path, 50);
        assert!(matches!(result, Err(Error::LockFailed(_))));
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");

        write_atomic(&path, b"[]").unwrap();
        write_atomic(&path, b"[1]").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[1]");
    }

    #[test]
    fn update_locked_sees_missing_file_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kv.json");

        let was_missing = update_locked(&path, 1000, |current| {
            Ok((Some(b"{}".to_vec()), current.is_none()))
        })
        .unwrap();

        assert!(was_missing);
        assert_eq!(read_locked(&path, 1000).unwrap(), Some(b"{}".to_vec()));
    }

    #[test]
    fn update_locked_serializes_concurrent_increments() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("counter");

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let done = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(threads);
        for _ in 0..threads {
            let barrier = Arc::clone(&barrier);
            let done = Arc::clone(&done);
            let path = path.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                update_locked(&path, 5000, |current| {
                    let value: u64 = current
                        .map(|bytes| String::from_utf8(bytes).unwrap().parse().unwrap())
                        .unwrap_or(0);
                    Ok((Some((value + 1).to_string().into_bytes()), ()))
                })
                .unwrap();
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(done.load(Ordering::SeqCst), threads);
        assert_eq!(fs::read_to_string(&path).unwrap(), threads.to_string());
    }
}
