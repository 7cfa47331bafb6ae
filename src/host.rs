// src/host.rs

//! Host application monitor
//!
//! Switching packs underneath a running host application corrupts its view
//! of the installed set, so the switch engine asks the monitor first. This
//! is the one place the user can cancel a switch.

use crate::error::{Error, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Detects and closes the host application
pub trait HostMonitor {
    /// Display name of the host application
    fn name(&self) -> &str;

    fn is_running(&self) -> bool;

    /// Ask the user whether the host may be closed
    fn confirm_terminate(&self) -> bool;

    /// Close the host application; returns once it has exited
    fn terminate(&self) -> Result<()>;
}

impl<H: HostMonitor + ?Sized> HostMonitor for &H {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn confirm_terminate(&self) -> bool {
        (**self).confirm_terminate()
    }

    fn terminate(&self) -> Result<()> {
        (**self).terminate()
    }
}

impl<H: HostMonitor + ?Sized> HostMonitor for Box<H> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn confirm_terminate(&self) -> bool {
        (**self).confirm_terminate()
    }

    fn terminate(&self) -> Result<()> {
        (**self).terminate()
    }
}

/// Monitor for setups without a host process to check
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHost;

impl HostMonitor for NoHost {
    fn name(&self) -> &str {
        "none"
    }

    fn is_running(&self) -> bool {
        false
    }

    fn confirm_terminate(&self) -> bool {
        true
    }

    fn terminate(&self) -> Result<()> {
        Ok(())
    }
}

type ConfirmFn = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Finds the host by executable name under `/proc` and stops it with SIGTERM
pub struct ProcessMonitor {
    executable: String,
    proc_root: std::path::PathBuf,
    confirm: ConfirmFn,
    timeout: Duration,
}

impl ProcessMonitor {
    /// Monitor `executable`; `confirm` is asked before terminating it
    pub fn new(
        executable: impl Into<String>,
        confirm: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            executable: executable.into(),
            proc_root: "/proc".into(),
            confirm: Box::new(confirm),
            timeout: Duration::from_secs(10),
        }
    }

    /// How long `terminate` waits for the process to exit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Scan a different procfs mount (tests)
    pub fn with_proc_root(mut self, proc_root: impl Into<std::path::PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    /// PIDs whose command line starts with the host executable
    pub fn find_pids(&self) -> Vec<i32> {
        let Ok(entries) = fs::read_dir(&self.proc_root) else {
            return Vec::new();
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let pid: i32 = entry.file_name().to_str()?.parse().ok()?;
                let cmdline = fs::read(entry.path().join("cmdline")).ok()?;
                let argv0 = cmdline.split(|b| *b == 0).next()?;
                let argv0 = std::str::from_utf8(argv0).ok()?;
                let exe = Path::new(argv0).file_name()?.to_str()?;
                (exe == self.executable).then_some(pid)
            })
            .collect()
    }
}

impl HostMonitor for ProcessMonitor {
    fn name(&self) -> &str {
        &self.executable
    }

    fn is_running(&self) -> bool {
        !self.find_pids().is_empty()
    }

    fn confirm_terminate(&self) -> bool {
        (self.confirm)(&self.executable)
    }

    fn terminate(&self) -> Result<()> {
        for pid in self.find_pids() {
            info!("Sending SIGTERM to {} (pid {})", self.executable, pid);
            if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
                return Err(Error::HostTerminate {
                    name: self.executable.clone(),
                    reason: format!("kill({}) failed: {}", pid, e),
                });
            }
        }

        let deadline = Instant::now() + self.timeout;
        while self.is_running() {
            if Instant::now() >= deadline {
                return Err(Error::HostTerminate {
                    name: self.executable.clone(),
                    reason: format!("still running after {:?}", self.timeout),
                });
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        debug!("{} has exited", self.executable);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_proc(entries: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (pid, cmdline) in entries {
            let dir = temp_dir.path().join(pid);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("cmdline"), cmdline).unwrap();
        }
        fs::create_dir_all(temp_dir.path().join("self")).unwrap();
        temp_dir
    }

    #[test]
    fn test_find_pids_matches_executable_basename() {
        let proc_dir = fake_proc(&[
            ("101", "/opt/game/game.bin\0--windowed\0"),
            ("102", "/usr/bin/bash\0"),
            ("103", "game.bin\0"),
        ]);
        let monitor = ProcessMonitor::new("game.bin", |_| true).with_proc_root(proc_dir.path());

        let mut pids = monitor.find_pids();
        pids.sort();
        assert_eq!(pids, vec![101, 103]);
        assert!(monitor.is_running());
    }

    #[test]
    fn test_not_running() {
        let proc_dir = fake_proc(&[("200", "/usr/bin/vim\0")]);
        let monitor = ProcessMonitor::new("game.bin", |_| true).with_proc_root(proc_dir.path());
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_confirm_is_delegated() {
        let monitor = ProcessMonitor::new("game.bin", |name| name == "other");
        assert!(!monitor.confirm_terminate());
    }

    #[test]
    fn test_no_host() {
        assert!(!NoHost.is_running());
        assert!(NoHost.terminate().is_ok());
    }
}
