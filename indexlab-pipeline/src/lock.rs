//! Cross-process pipeline lock.
//!
//! A scheduled run and a manual backfill must never interleave writes on the
//! same tables, so the whole pipeline executes under one exclusive lock file.
//! Acquisition is atomic (`create_new`); a second invocation polls until the
//! holder releases or the bounded wait expires. The guard removes the file on
//! drop, including during unwinding, so every exit path releases the lock.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{info, warn};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock {path} still held after {waited_secs}s")]
    Timeout { path: String, waited_secs: u64 },

    #[error("lock I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// RAII guard for the pipeline lock file.
#[derive(Debug)]
pub struct PipelineLock {
    path: PathBuf,
}

impl PipelineLock {
    /// Acquire the lock, waiting up to `wait_timeout` for a holder to release.
    pub fn acquire(path: &Path, wait_timeout: Duration) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let started = Instant::now();
        let mut announced = false;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Contents are diagnostic only; the file's existence is the lock.
                    let _ = writeln!(
                        file,
                        "pid={} acquired_at={}",
                        std::process::id(),
                        chrono::Local::now().naive_local()
                    );
                    info!("pipeline lock acquired: {}", path.display());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= wait_timeout {
                        return Err(LockError::Timeout {
                            path: path.display().to_string(),
                            waited_secs: started.elapsed().as_secs(),
                        });
                    }
                    if !announced {
                        warn!(
                            "pipeline lock {} held by another run; waiting",
                            path.display()
                        );
                        announced = true;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(LockError::Io(e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PipelineLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("failed to remove lock file {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.lock");

        let lock = PipelineLock::acquire(&path, Duration::from_millis(10)).unwrap();
        assert!(path.exists());
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.lock");

        let _held = PipelineLock::acquire(&path, Duration::from_millis(10)).unwrap();
        let err = PipelineLock::acquire(&path, Duration::from_millis(300)).unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn reacquire_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.lock");

        drop(PipelineLock::acquire(&path, Duration::from_millis(10)).unwrap());
        let again = PipelineLock::acquire(&path, Duration::from_millis(10));
        assert!(again.is_ok());
    }

    #[test]
    fn waits_for_holder_to_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.lock");
        let held = PipelineLock::acquire(&path, Duration::from_millis(10)).unwrap();

        let waiter_path = path.clone();
        let waiter = std::thread::spawn(move || {
            PipelineLock::acquire(&waiter_path, Duration::from_secs(5))
        });

        std::thread::sleep(Duration::from_millis(100));
        drop(held);

        let acquired = waiter.join().unwrap();
        assert!(acquired.is_ok());
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/pipeline.lock");
        let lock = PipelineLock::acquire(&path, Duration::from_millis(10)).unwrap();
        assert!(lock.path().exists());
    }
}
