//! Advisory lock serialising mutations of one root directory.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, info};

use crate::error::{IoContext, Result, ZirconError};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(10);
const MAX_RETRY_DELAY: Duration = Duration::from_millis(500);
const WAIT_MESSAGE_THRESHOLD: Duration = Duration::from_secs(2);

/// Holds the exclusive lock on `<root>/.lock` until dropped.
///
/// The OS releases the lock when the file handle closes, so an interrupted
/// process never leaves the root locked.
#[derive(Debug)]
pub struct RootLock {
    file: File,
    path: PathBuf,
}

impl RootLock {
    /// Waits up to `timeout` for the lock, backing off exponentially between attempts.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .io_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .io_context(|| format!("failed to open lock file {}", path.display()))?;

        let start = Instant::now();
        let mut delay = INITIAL_RETRY_DELAY;
        let mut announced = false;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "acquired root lock");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    let elapsed = start.elapsed();
                    if elapsed >= timeout {
                        return Err(ZirconError::LockTimeout {
                            path: path.to_path_buf(),
                        });
                    }
                    if !announced && elapsed >= WAIT_MESSAGE_THRESHOLD {
                        info!("waiting for another zircon process to finish ({})", path.display());
                        announced = true;
                    }
                    thread::sleep(delay);
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
                Err(e) => {
                    return Err(ZirconError::io(
                        format!("failed to lock {}", path.display()),
                        e,
                    ));
                }
            }
        }
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "released root lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_holder_times_out_until_first_drops() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".lock");

        let first = RootLock::acquire(&path, Duration::from_secs(1)).unwrap();
        let err = RootLock::acquire(&path, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ZirconError::LockTimeout { .. }));

        drop(first);
        assert!(RootLock::acquire(&path, Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn lock_file_parent_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/root/.lock");
        let _lock = RootLock::acquire(&path, Duration::from_millis(10)).unwrap();
        assert!(path.exists());
    }
}
