use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

const LOCK_FILE: &str = ".lock";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Exclusive advisory lock on a dataset's `kpi/` directory.
///
/// Held for the whole read-merge-write of a save so two `kpi` processes
/// entering values at once never drop each other's cells. Released on drop.
/// The `.lock` file itself stays on disk so every waiter locks the same inode.
pub struct FileLock {
    _file: File,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("dataset is locked ({path}): another kpi process is saving, waited {waited_ms}ms")]
    Timeout { path: PathBuf, waited_ms: u128 },
}

impl FileLock {
    /// Lock `data_dir`, retrying with a growing pause until `timeout` elapses.
    pub fn acquire(data_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::CreateError {
                path: path.clone(),
                source,
            })?;

        let start = Instant::now();
        let mut pause = Duration::from_millis(5);
        while try_lock(&file).is_err() {
            let waited = start.elapsed();
            if waited >= timeout {
                warn!(path = %path.display(), "gave up waiting for dataset lock");
                return Err(LockError::Timeout {
                    path,
                    waited_ms: waited.as_millis(),
                });
            }
            std::thread::sleep(pause.min(timeout - waited));
            pause = (pause * 2).min(MAX_BACKOFF);
        }
        debug!(path = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "dataset locked");
        Ok(FileLock { _file: file })
    }

    pub fn acquire_default(data_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(data_dir, DEFAULT_TIMEOUT)
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the descriptor belongs to `file`, which outlives the call
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> std::io::Result<()> {
    Ok(())
}
