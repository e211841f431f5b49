//! # Daemon Supervisor
//!
//! Runs at most one Egregore server per host and manages its lifetime.
//!
//! The exclusive OFD lock on `daemon.lock_file` is the only thing that
//! decides who is running. It is taken by the `serve` process itself, so
//! two racing `start`s both spawn a child and exactly one child gets the
//! lock; the other exits with [`EXIT_ALREADY_RUNNING`]. `status` only
//! queries the lock, it never takes it.
//!
//! | Operation | Behaviour |
//! |-----------|-----------|
//! | `start` | spawn `egregore serve` detached, output appended to the log |
//! | `stop` | SIGTERM, 5 s grace polled every 500 ms, then SIGKILL and wait for exit |
//! | `status` | lock held: RUNNING, otherwise STOPPED (stale PID records are removed) |
//! | `restart` | `stop` then `start` |
//! | `logs` | tail or follow the log file |

mod lock;
mod logs;
mod process;
mod state;

pub use lock::InstanceLock;
pub use logs::{DEFAULT_TAIL_LINES, follow, tail};
pub use state::{DaemonState, Lifecycle};

use crate::api::{self, AppState};
use crate::config::{DaemonSettings, Settings};
use crate::store::GraphHandle;
use crate::vector::VectorClient;
use egregore_core::{EgregoreError, StorageBackend};
use std::fs::{self, OpenOptions};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exit code of a `serve` process that lost the lock.
pub const EXIT_ALREADY_RUNNING: i32 = 3;

const STOP_GRACE: Duration = Duration::from_secs(5);
const STOP_POLL: Duration = Duration::from_millis(500);
const KILL_WAIT: Duration = Duration::from_secs(2);
const KILL_POLL: Duration = Duration::from_millis(50);
const START_VERIFY: Duration = Duration::from_secs(2);
const START_POLL: Duration = Duration::from_millis(100);
const START_FAILURE_LOG_LINES: usize = 20;

/// What `status` observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    /// The lock is held. The PID is known once the daemon has recorded it.
    Running { pid: Option<u32> },
    Stopped,
}

impl DaemonStatus {
    #[must_use]
    pub fn state(self) -> DaemonState {
        match self {
            Self::Running { .. } => DaemonState::Running,
            Self::Stopped => DaemonState::Stopped,
        }
    }
}

/// Result of `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Stopped {
        pid: u32,
        /// SIGKILL was needed.
        forced: bool,
    },
}

// =============================================================================
// SUPERVISOR
// =============================================================================

/// Lifecycle operations against the daemon files of one installation.
#[derive(Debug, Clone)]
pub struct DaemonSupervisor {
    paths: DaemonSettings,
    grace: Duration,
    poll: Duration,
}

impl DaemonSupervisor {
    #[must_use]
    pub fn new(paths: &DaemonSettings) -> Self {
        Self {
            paths: paths.clone(),
            grace: STOP_GRACE,
            poll: STOP_POLL,
        }
    }

    /// Override the stop grace period and its poll interval.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration, poll: Duration) -> Self {
        self.grace = grace;
        self.poll = poll;
        self
    }

    #[must_use]
    pub fn paths(&self) -> &DaemonSettings {
        &self.paths
    }

    /// Current status. Heals a stale PID record as a side effect.
    pub fn status(&self) -> Result<DaemonStatus, EgregoreError> {
        let recorded = lock::read_pid(&self.paths.pid_file);

        if lock::is_held(&self.paths.lock_file)? {
            return Ok(self.running(recorded));
        }
        let Some(pid) = recorded else {
            return Ok(DaemonStatus::Stopped);
        };

        // A daemon may have started since the record was read.
        if lock::is_held(&self.paths.lock_file)? {
            return Ok(self.running(lock::read_pid(&self.paths.pid_file)));
        }
        if lock::remove_pid_if(&self.paths.pid_file, pid)? {
            let stale = EgregoreError::StaleLock(pid);
            tracing::warn!(
                pid,
                alive = process::is_alive(pid),
                "{stale}; removed PID record"
            );
        }
        Ok(DaemonStatus::Stopped)
    }

    /// The lock is held: prefer the PID the holder wrote into the lock file.
    fn running(&self, recorded: Option<u32>) -> DaemonStatus {
        let pid = lock::holder_pid(&self.paths.lock_file)
            .filter(|pid| process::is_alive(*pid))
            .or_else(|| recorded.filter(|pid| process::is_alive(*pid)));
        DaemonStatus::Running { pid }
    }

    /// Spawn a detached `serve` process and wait briefly to see it survive.
    ///
    /// Returns the child's PID.
    pub async fn start(&self, config: Option<&Path>) -> Result<u32, EgregoreError> {
        if let DaemonStatus::Running { pid } = self.status()? {
            return Err(EgregoreError::AlreadyRunning(pid));
        }

        let log_path = &self.paths.log_file;
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let log_out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|e| {
                EgregoreError::IoError(format!("Cannot open log '{}': {}", log_path.display(), e))
            })?;
        let log_err = log_out.try_clone()?;

        let exe = std::env::current_exe()?;
        let mut command = Command::new(exe);
        if let Some(config) = config {
            command.arg("--config").arg(std::path::absolute(config)?);
        }
        command
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_out))
            .stderr(Stdio::from(log_err))
            // Own process group: a terminal Ctrl-C must not reach the daemon.
            .process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| EgregoreError::IoError(format!("Failed to launch daemon: {}", e)))?;
        let pid = child.id();
        tracing::debug!(pid, "daemon process spawned");

        let deadline = Instant::now() + START_VERIFY;
        while Instant::now() < deadline {
            if let Some(status) = child.try_wait()? {
                if status.code() == Some(EXIT_ALREADY_RUNNING) {
                    return Err(EgregoreError::AlreadyRunning(lock::read_pid(
                        &self.paths.pid_file,
                    )));
                }
                let lines = tail(log_path, START_FAILURE_LOG_LINES)?.join("\n");
                return Err(EgregoreError::IoError(format!(
                    "daemon exited during startup ({status}); last log lines:\n{lines}"
                )));
            }
            tokio::time::sleep(START_POLL).await;
        }
        Ok(pid)
    }

    /// SIGTERM, wait out the grace period, then SIGKILL.
    pub async fn stop(&self) -> Result<StopOutcome, EgregoreError> {
        let pid = match self.status()? {
            DaemonStatus::Stopped => return Ok(StopOutcome::NotRunning),
            DaemonStatus::Running { pid: Some(pid) } => pid,
            DaemonStatus::Running { pid: None } => {
                return Err(EgregoreError::IoError(format!(
                    "instance lock '{}' is held but no live holder PID is recorded",
                    self.paths.lock_file.display()
                )));
            }
        };

        let mut lifecycle = Lifecycle::at(DaemonState::Running);
        lifecycle.advance(DaemonState::Stopping)?;
        process::terminate(pid)?;

        let deadline = Instant::now() + self.grace;
        let mut forced = false;
        while process::is_alive(pid) {
            if Instant::now() >= deadline {
                tracing::warn!(
                    pid,
                    grace_ms = self.grace.as_millis() as u64,
                    "daemon ignored SIGTERM, sending SIGKILL"
                );
                process::kill(pid)?;
                forced = true;
                break;
            }
            tokio::time::sleep(self.poll).await;
        }
        if forced {
            wait_for_exit(pid, KILL_WAIT).await?;
        }

        // The kernel has released the lock now that the process is gone.
        lock::remove_pid_if(&self.paths.pid_file, pid)?;
        lifecycle.advance(DaemonState::Stopped)?;
        Ok(StopOutcome::Stopped { pid, forced })
    }

    /// `stop` then `start`. The daemon is unavailable in between.
    pub async fn restart(&self, config: Option<&Path>) -> Result<u32, EgregoreError> {
        let stopped = self.stop().await?;
        tracing::debug!(?stopped, "restart: stop finished");
        self.start(config).await
    }
}

/// Poll until `pid` has exited, failing after `limit`.
async fn wait_for_exit(pid: u32, limit: Duration) -> Result<(), EgregoreError> {
    let deadline = Instant::now() + limit;
    while process::is_alive(pid) {
        if Instant::now() >= deadline {
            return Err(EgregoreError::IoError(format!(
                "PID {pid} still alive {} ms after SIGKILL",
                limit.as_millis()
            )));
        }
        tokio::time::sleep(KILL_POLL).await;
    }
    Ok(())
}

// =============================================================================
// SERVING
// =============================================================================

/// Open both stores and build the server state. Called once per process.
pub fn open_state(settings: &Settings) -> Result<AppState, EgregoreError> {
    let timeout = settings.storage.timeout();
    let backend = StorageBackend::open(settings.storage.backend, &settings.storage.database)?;
    let persistent = backend.is_persistent();
    let graph = GraphHandle::new(backend, timeout);
    let index = VectorClient::from_settings(&settings.index, timeout)?;

    tracing::info!(
        backend = %settings.storage.backend,
        persistent,
        database = %settings.storage.database.display(),
        index = %index.describe(),
        timeout_ms = settings.storage.timeout_ms,
        "stores ready"
    );
    Ok(AppState::new(graph, Arc::new(index), &settings.instance))
}

/// Run the server in this process while holding the instance lock.
pub async fn serve(settings: &Settings) -> Result<(), EgregoreError> {
    let mut lifecycle = Lifecycle::default();
    lifecycle.advance(DaemonState::Starting)?;

    let prepared = InstanceLock::acquire(&settings.daemon.lock_file, &settings.daemon.pid_file)
        .and_then(|guard| open_state(settings).map(|state| (guard, state)));
    let (guard, state) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            lifecycle.advance(DaemonState::Stopped)?;
            return Err(e);
        }
    };

    lifecycle.advance(DaemonState::Running)?;
    tracing::info!(
        instance = %settings.instance,
        pid = guard.pid(),
        url = %settings.server.url(),
        "egregore running"
    );

    let result = api::run_server(
        &settings.server.addr(),
        state,
        &settings.http,
        shutdown_signal(),
    )
    .await;

    lifecycle.advance(DaemonState::Stopping)?;
    drop(guard);
    lifecycle.advance(DaemonState::Stopped)?;
    result
}

/// Resolves on SIGTERM or Ctrl-C.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Ctrl-C received, shutting down"),
        () = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;
    use std::process::ChildStdin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Children inherit the lock descriptor; spawn them one test at a time
    /// so no other test's child picks it up.
    static SPAWN: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    fn daemon_paths(dir: &TempDir) -> DaemonSettings {
        DaemonSettings {
            lock_file: dir.path().join("egregore.lock"),
            pid_file: dir.path().join("egregore.pid"),
            log_file: dir.path().join("egregore.log"),
        }
    }

    /// Reap `child` in the background so it does not linger as a zombie.
    fn reap(mut child: std::process::Child) {
        std::thread::spawn(move || {
            let _ = child.wait();
        });
    }

    /// Spawn `sh -c script` as the lock holder, the way `serve` holds it.
    ///
    /// The child blocks reading its stdin; the returned handle keeps that
    /// pipe open.
    fn spawn_lock_holder(paths: &DaemonSettings, script: &str) -> (u32, ChildStdin) {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&paths.lock_file)
            .expect("open lock file");
        assert!(lock::try_lock(&file).expect("lock"));

        let fd = file.as_raw_fd();
        // SAFETY: clears FD_CLOEXEC on a descriptor we own.
        let inheritable = unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC)
        };
        assert_eq!(inheritable, 0);

        let mut child = Command::new("sh")
            .args(["-c", script])
            .stdin(Stdio::piped())
            .spawn()
            .expect("spawn holder");
        // From here on only the child holds the lock.
        drop(file);

        let stdin = child.stdin.take().expect("stdin");
        let pid = child.id();
        fs::write(&paths.lock_file, format!("{pid}\n")).expect("holder pid");
        fs::write(&paths.pid_file, format!("{pid}\n")).expect("pid record");
        reap(child);
        (pid, stdin)
    }

    #[test]
    fn fresh_install_is_stopped() {
        let dir = TempDir::new().expect("tempdir");
        let supervisor = DaemonSupervisor::new(&daemon_paths(&dir));
        assert_eq!(supervisor.status().expect("status"), DaemonStatus::Stopped);
    }

    #[test]
    fn held_lock_is_running_with_pid() {
        let dir = TempDir::new().expect("tempdir");
        let paths = daemon_paths(&dir);
        let _guard = InstanceLock::acquire(&paths.lock_file, &paths.pid_file).expect("acquire");

        let status = DaemonSupervisor::new(&paths).status().expect("status");
        assert_eq!(
            status,
            DaemonStatus::Running {
                pid: Some(std::process::id())
            }
        );
        assert_eq!(status.state(), DaemonState::Running);
    }

    #[test]
    fn stale_pid_record_is_healed() {
        let dir = TempDir::new().expect("tempdir");
        let paths = daemon_paths(&dir);
        fs::write(&paths.lock_file, "").expect("lock file");
        fs::write(&paths.pid_file, "999999\n").expect("stale record");

        let status = DaemonSupervisor::new(&paths).status().expect("status");
        assert_eq!(status, DaemonStatus::Stopped);
        assert!(!paths.pid_file.exists());
        assert!(paths.lock_file.exists());
    }

    #[test]
    fn status_never_makes_serve_lose_the_lock() {
        let dir = TempDir::new().expect("tempdir");
        let paths = daemon_paths(&dir);
        fs::write(&paths.lock_file, "").expect("lock file");
        let done = Arc::new(AtomicBool::new(false));

        let watcher = {
            let (supervisor, done) = (DaemonSupervisor::new(&paths), Arc::clone(&done));
            std::thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    supervisor.status().expect("status");
                }
            })
        };

        let refused = (0..5_000)
            .filter(|_| InstanceLock::acquire(&paths.lock_file, &paths.pid_file).is_err())
            .count();
        done.store(true, Ordering::Relaxed);
        watcher.join().expect("watcher");

        assert_eq!(refused, 0, "status made acquire fail with no daemon running");
    }

    #[tokio::test]
    async fn lost_pid_record_still_finds_the_holder() {
        let _spawning = SPAWN.lock().await;
        let dir = TempDir::new().expect("tempdir");
        let paths = daemon_paths(&dir);
        let (pid, _stdin) = spawn_lock_holder(&paths, "read _");
        lock::remove_pid(&paths.pid_file).expect("drop record");

        let supervisor = DaemonSupervisor::new(&paths)
            .with_grace(Duration::from_secs(5), Duration::from_millis(50));
        assert_eq!(
            supervisor.status().expect("status"),
            DaemonStatus::Running { pid: Some(pid) }
        );

        let outcome = supervisor.stop().await.expect("stop");
        assert_eq!(outcome, StopOutcome::Stopped { pid, forced: false });
    }

    #[tokio::test]
    async fn stop_when_stopped_is_noop() {
        let dir = TempDir::new().expect("tempdir");
        let outcome = DaemonSupervisor::new(&daemon_paths(&dir))
            .stop()
            .await
            .expect("stop");
        assert_eq!(outcome, StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn stop_terminates_recorded_process() {
        let _spawning = SPAWN.lock().await;
        let dir = TempDir::new().expect("tempdir");
        let paths = daemon_paths(&dir);
        let (pid, _stdin) = spawn_lock_holder(&paths, "read _");

        let outcome = DaemonSupervisor::new(&paths)
            .with_grace(Duration::from_secs(5), Duration::from_millis(50))
            .stop()
            .await
            .expect("stop");

        assert_eq!(outcome, StopOutcome::Stopped { pid, forced: false });
        assert!(!process::is_alive(pid));
        assert!(!paths.pid_file.exists());
    }

    #[tokio::test]
    async fn forced_stop_releases_the_lock_before_returning() {
        let _spawning = SPAWN.lock().await;
        let dir = TempDir::new().expect("tempdir");
        let paths = daemon_paths(&dir);
        let (pid, _stdin) = spawn_lock_holder(&paths, "trap '' TERM; read _");
        // Let the shell install its trap.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let supervisor = DaemonSupervisor::new(&paths)
            .with_grace(Duration::from_millis(300), Duration::from_millis(50));
        let outcome = supervisor.stop().await.expect("stop");
        assert_eq!(outcome, StopOutcome::Stopped { pid, forced: true });

        // A restart's start must find the instance free straight away.
        assert!(!process::is_alive(pid));
        assert_eq!(supervisor.status().expect("status"), DaemonStatus::Stopped);
        let next = InstanceLock::acquire(&paths.lock_file, &paths.pid_file).expect("reacquire");
        assert_eq!(next.pid(), std::process::id());
    }

    #[tokio::test]
    async fn start_refuses_while_running() {
        let dir = TempDir::new().expect("tempdir");
        let paths = daemon_paths(&dir);
        let _guard = InstanceLock::acquire(&paths.lock_file, &paths.pid_file).expect("acquire");

        let err = DaemonSupervisor::new(&paths)
            .start(None)
            .await
            .expect_err("already running");
        assert_eq!(err.kind(), "AlreadyRunning");
    }

    #[tokio::test]
    async fn serve_fails_fast_when_lock_is_held() {
        let dir = TempDir::new().expect("tempdir");
        let mut settings = Settings::default();
        settings.daemon = daemon_paths(&dir);
        settings.storage.backend = egregore_core::BackendKind::Memory;
        let _guard =
            InstanceLock::acquire(&settings.daemon.lock_file, &settings.daemon.pid_file)
                .expect("acquire");

        let err = serve(&settings).await.expect_err("second instance");
        assert_eq!(err.kind(), "AlreadyRunning");
    }
}
