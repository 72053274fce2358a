use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_FILE: &str = ".lock";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Advisory lock serializing writers to one workspace.
///
/// Two `dl` invocations saving the same day would otherwise both reconcile
/// against the same snapshot and double-insert. The lock file itself is
/// never removed: waiters hold handles to it, and unlinking it would let a
/// newcomer lock a different inode. The holder's pid is written into it.
pub struct WorkspaceLock {
    _file: File,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not acquire lock on {path}: {}", holder_hint(.holder))]
    Timeout { path: PathBuf, holder: Option<u32> },
}

fn holder_hint(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!("dl process {} is writing", pid),
        None => "another dl process may be writing".to_string(),
    }
}

impl WorkspaceLock {
    /// Lock `.daylog/.lock`, polling until `timeout` elapses
    pub fn acquire(daylog_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = daylog_dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::CreateError {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        while let Err(e) = try_lock(&file) {
            if Instant::now() >= deadline {
                let holder = read_holder(&mut file);
                tracing::debug!(path = %path.display(), ?holder, error = %e, "lock wait timed out");
                return Err(LockError::Timeout { path, holder });
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        // pid is informational; failing to record it does not void the lock
        if let Err(e) = record_holder(&mut file) {
            tracing::debug!(error = %e, "could not record lock holder");
        }
        Ok(WorkspaceLock { _file: file })
    }

    pub fn acquire_default(daylog_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(daylog_dir, Duration::from_secs(5))
    }
}

fn record_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    Ok(())
}
