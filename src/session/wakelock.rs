//! Wake lock.
//!
//! While an alarm rings the machine must not fall asleep. The desktop
//! implementation holds a sleep inhibitor process (`caffeinate` on macOS,
//! `systemd-inhibit` elsewhere) for as long as the lock is held. The lock
//! has no timeout. If the daemon dies the inhibitor goes with it: on macOS
//! `caffeinate -w` watches the daemon's pid, and `systemd-inhibit` releases
//! its lock when its own process is killed.

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::SessionError;

/// Trait for wake lock providers.
pub trait WakeLock: Send + Sync {
    /// Acquires the lock with no timeout. Acquiring a held lock is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    fn acquire(&self) -> Result<(), SessionError>;

    /// Releases the lock if held.
    fn release(&self);

    fn is_held(&self) -> bool;
}

impl<T: WakeLock + ?Sized> WakeLock for std::sync::Arc<T> {
    fn acquire(&self) -> Result<(), SessionError> {
        (**self).acquire()
    }

    fn release(&self) {
        (**self).release()
    }

    fn is_held(&self) -> bool {
        (**self).is_held()
    }
}

/// Returns the default inhibitor command line for this platform.
#[must_use]
pub fn default_inhibitor_command() -> Vec<String> {
    if cfg!(target_os = "macos") {
        vec![
            "caffeinate".to_string(),
            "-i".to_string(),
            "-w".to_string(),
            std::process::id().to_string(),
        ]
    } else {
        vec![
            "systemd-inhibit".to_string(),
            "--what=sleep:idle".to_string(),
            "--who=wakeup".to_string(),
            "--why=Alarm ringing".to_string(),
            "--mode=block".to_string(),
            "tail".to_string(),
            format!("--pid={}", std::process::id()),
            "-f".to_string(),
            "/dev/null".to_string(),
        ]
    }
}

/// Wake lock that holds a sleep inhibitor child process.
#[derive(Debug)]
pub struct InhibitorWakeLock {
    command: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl InhibitorWakeLock {
    /// Creates a lock that runs `command` while held.
    #[must_use]
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            child: Mutex::new(None),
        }
    }

    /// Returns the program that will be run.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }
}

impl Default for InhibitorWakeLock {
    fn default() -> Self {
        Self::new(default_inhibitor_command())
    }
}

impl WakeLock for InhibitorWakeLock {
    fn acquire(&self) -> Result<(), SessionError> {
        let mut child = self.child.lock().map_err(|_| {
            SessionError::WakeLockUnavailable("wake lock state poisoned".to_string())
        })?;

        if let Some(running) = child.as_mut() {
            if matches!(running.try_wait(), Ok(None)) {
                return Ok(());
            }
        }

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| SessionError::WakeLockUnavailable("empty inhibitor command".to_string()))?;

        let spawned = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SessionError::WakeLockUnavailable(format!("{}: {}", program, e)))?;

        tracing::debug!(program, pid = spawned.id(), "wake lock acquired");
        *child = Some(spawned);
        Ok(())
    }

    fn release(&self) {
        let Ok(mut child) = self.child.lock() else {
            return;
        };
        if let Some(mut running) = child.take() {
            let _ = running.kill();
            let _ = running.wait();
            tracing::debug!("wake lock released");
        }
    }

    fn is_held(&self) -> bool {
        self.child
            .lock()
            .map(|mut child| {
                child
                    .as_mut()
                    .is_some_and(|running| matches!(running.try_wait(), Ok(None)))
            })
            .unwrap_or(false)
    }
}

impl Drop for InhibitorWakeLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Mock wake lock for testing.
#[derive(Debug, Default)]
pub struct MockWakeLock {
    held: AtomicBool,
    fail: AtomicBool,
    acquire_count: AtomicUsize,
    release_count: AtomicUsize,
}

impl MockWakeLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn acquire_count(&self) -> usize {
        self.acquire_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }
}

impl WakeLock for MockWakeLock {
    fn acquire(&self) -> Result<(), SessionError> {
        self.acquire_count.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SessionError::WakeLockUnavailable("Mock failure".to_string()));
        }
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.release_count.fetch_add(1, Ordering::SeqCst);
        self.held.store(false, Ordering::SeqCst);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}
