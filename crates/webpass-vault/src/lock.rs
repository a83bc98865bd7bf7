//! Exclusive advisory lock around read-modify-write cycles.
//!
//! Two concurrent invocations would otherwise both load the vault, mutate
//! their own copy, and the last rename would silently win. Every mutation of
//! the vault file or the session-token file happens while holding
//! [`VaultLock`] on `{data_dir}/.lock`.
//!
//! Unix uses `flock(2)`; elsewhere the lock is a no-op.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::VaultError;

const LOCK_FILE: &str = ".lock";

/// RAII guard; the lock is released on drop.
#[derive(Debug)]
pub struct VaultLock {
    file: File,
}

impl VaultLock {
    /// Block until the exclusive lock for `data_dir` is held.
    ///
    /// Not re-entrant: acquiring twice in one process deadlocks.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if the lock file cannot be opened or
    /// locked.
    pub fn acquire(data_dir: &Path) -> Result<Self, VaultError> {
        crate::store::create_private_dir(data_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(data_dir.join(LOCK_FILE))?;
        platform::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        platform::unlock(&self.file);
    }
}

#[cfg(unix)]
mod platform {
    use std::fs::File;
    use std::os::fd::AsRawFd;

    pub(super) fn lock_exclusive(file: &File) -> std::io::Result<()> {
        loop {
            // SAFETY: flock on a descriptor owned by `file`, which outlives
            // the call.
            let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if ret == 0 {
                return Ok(());
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub(super) fn unlock(file: &File) {
        // SAFETY: as above. Failure is harmless: closing the descriptor
        // releases the lock anyway.
        unsafe {
            libc::flock(file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use std::fs::File;

    #[allow(clippy::unnecessary_wraps)]
    pub(super) fn lock_exclusive(_file: &File) -> std::io::Result<()> {
        Ok(())
    }

    pub(super) fn unlock(_file: &File) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_lock_file() {
        let dir = TempDir::new().unwrap();
        let _guard = VaultLock::acquire(dir.path()).unwrap();
        assert!(dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn lock_can_be_reacquired_after_drop() {
        let dir = TempDir::new().unwrap();
        drop(VaultLock::acquire(dir.path()).unwrap());
        let _again = VaultLock::acquire(dir.path()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn second_holder_waits_for_the_first() {
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let guard = VaultLock::acquire(&path).unwrap();

        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let _second = VaultLock::acquire(&path).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }
}
