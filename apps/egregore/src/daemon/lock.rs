//! Single-instance lock.
//!
//! An exclusive open-file-description lock (`F_OFD_SETLK`) on a well-known
//! file decides which process is the daemon. The kernel drops the lock when
//! the holder exits, so a crash never leaves the lock held. Observers query
//! it with `F_OFD_GETLK`, which never takes the lock.
//!
//! The holder writes its PID into the lock file. That copy is trusted only
//! while the lock is held. The PID record next to it is informational and
//! can go stale.

use egregore_core::EgregoreError;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// A whole-file write lock request.
fn whole_file(kind: libc::c_short) -> libc::flock {
    // SAFETY: `flock` is a plain C struct; all-zero is a valid value.
    let mut request: libc::flock = unsafe { std::mem::zeroed() };
    request.l_type = kind;
    request.l_whence = libc::SEEK_SET as libc::c_short;
    // l_start = 0, l_len = 0: the whole file. l_pid must be 0 for OFD locks.
    request
}

/// Try to take the exclusive lock. `Ok(false)` if someone else holds it.
///
/// OFD locks conflict between open file descriptions, so two handles in the
/// same process contend like two processes do.
pub(super) fn try_lock(file: &File) -> io::Result<bool> {
    let request = whole_file(libc::F_WRLCK as libc::c_short);
    // SAFETY: `file` owns a valid descriptor and `request` outlives the call.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_OFD_SETLK, &raw const request) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EAGAIN | libc::EACCES) => Ok(false),
        _ => Err(err),
    }
}

/// Whether a conflicting lock is held on `file`, without taking one.
fn query(file: &File) -> io::Result<bool> {
    let mut request = whole_file(libc::F_WRLCK as libc::c_short);
    // SAFETY: as above; the kernel writes the answer back into `request`.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_OFD_GETLK, &raw mut request) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(request.l_type != libc::F_UNLCK as libc::c_short)
}

fn open_lock_file(path: &Path) -> Result<File, EgregoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| {
            EgregoreError::IoError(format!("Cannot open lock file '{}': {}", path.display(), e))
        })
}

/// Read a PID record. Missing or garbled records read as `None`.
#[must_use]
pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Remove a PID record. A missing record is not an error.
pub fn remove_pid(path: &Path) -> Result<(), EgregoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EgregoreError::IoError(format!(
            "Cannot remove PID record '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Remove a PID record only if it still names `pid`.
///
/// Returns whether it was removed. A record rewritten by a newer daemon is
/// left alone.
pub fn remove_pid_if(path: &Path, pid: u32) -> Result<bool, EgregoreError> {
    if read_pid(path) != Some(pid) {
        return Ok(false);
    }
    remove_pid(path)?;
    Ok(true)
}

/// Whether some process currently holds the lock. Never takes it.
pub fn is_held(lock_path: &Path) -> Result<bool, EgregoreError> {
    if !lock_path.exists() {
        return Ok(false);
    }
    let file = open_lock_file(lock_path)?;
    Ok(query(&file)?)
}

/// PID the current holder wrote into the lock file.
///
/// Only meaningful while [`is_held`] is true.
#[must_use]
pub fn holder_pid(lock_path: &Path) -> Option<u32> {
    read_pid(lock_path)
}

/// The held instance lock. Dropping it removes the PID record and releases
/// the lock.
#[derive(Debug)]
pub struct InstanceLock {
    _file: File,
    pid_file: PathBuf,
    pid: u32,
}

impl InstanceLock {
    /// Take the lock without waiting and record our PID.
    ///
    /// Fails with `AlreadyRunning` (carrying the holder's PID, if known)
    /// when another process holds it.
    pub fn acquire(lock_path: &Path, pid_file: &Path) -> Result<Self, EgregoreError> {
        let mut file = open_lock_file(lock_path)?;
        if !try_lock(&file)? {
            let holder = holder_pid(lock_path).or_else(|| read_pid(pid_file));
            return Err(EgregoreError::AlreadyRunning(holder));
        }

        let pid = std::process::id();
        let record = format!("{pid}\n");
        file.set_len(0)?;
        file.rewind()?;
        file.write_all(record.as_bytes())?;

        if let Some(parent) = pid_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(pid_file, &record).map_err(|e| {
            EgregoreError::IoError(format!(
                "Cannot write PID record '{}': {}",
                pid_file.display(),
                e
            ))
        })?;

        tracing::debug!(pid, lock = %lock_path.display(), "instance lock acquired");
        Ok(Self {
            _file: file,
            pid_file: pid_file.to_path_buf(),
            pid,
        })
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = remove_pid_if(&self.pid_file, self.pid) {
            tracing::warn!(error = %e, "failed to remove PID record");
        }
    }
}
