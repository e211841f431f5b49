//! Process liveness and signalling.

use egregore_core::EgregoreError;

fn as_pid(pid: u32) -> Option<libc::pid_t> {
    libc::pid_t::try_from(pid).ok().filter(|p| *p > 0)
}

/// Whether `/proc` reports the process as a zombie: exited, descriptors
/// closed, not yet reaped by its parent.
fn is_zombie(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // "pid (comm) S ...": comm may itself contain parentheses.
    stat.rfind(')')
        .and_then(|end| stat[end + 1..].split_whitespace().next())
        .is_some_and(|state| state == "Z")
}

/// Whether a process with this PID exists and has not exited.
///
/// `EPERM` means it exists but belongs to someone else, which still counts
/// as alive. A zombie does not.
#[must_use]
pub fn is_alive(pid: u32) -> bool {
    let Some(raw) = as_pid(pid) else {
        return false;
    };
    // SAFETY: signal 0 only checks existence and permissions.
    let rc = unsafe { libc::kill(raw, 0) };
    let exists = rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
    exists && !is_zombie(pid)
}

fn send(pid: u32, signal: libc::c_int, name: &str) -> Result<(), EgregoreError> {
    let raw = as_pid(pid)
        .ok_or_else(|| EgregoreError::InvalidInput(format!("invalid PID {pid}")))?;
    // SAFETY: plain kill(2) on a positive PID.
    let rc = unsafe { libc::kill(raw, signal) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        // Already gone.
        return Ok(());
    }
    Err(EgregoreError::IoError(format!(
        "{name} to PID {pid} failed: {err}"
    )))
}

/// Ask the process to shut down.
pub fn terminate(pid: u32) -> Result<(), EgregoreError> {
    send(pid, libc::SIGTERM, "SIGTERM")
}

/// Kill the process outright.
pub fn kill(pid: u32) -> Result<(), EgregoreError> {
    send(pid, libc::SIGKILL, "SIGKILL")
}
