//! Startup gate: wait for the session's key processes before the first pass
//!
//! Which processes to wait for depends on the boot mode. A sysmaint boot is
//! recognised by a marker on the kernel command line.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::constants::{display, paths};
use crate::procfs::ProcessTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut { missing: Vec<String> },
}

/// Check the kernel command line for the sysmaint boot-role marker
pub fn detect_sysmaint_mode() -> Result<bool> {
    detect_sysmaint_in(paths::KERNEL_CMDLINE)
}

/// Like [`detect_sysmaint_mode`], trying `candidates` in order
pub fn detect_sysmaint_in<P: AsRef<Path>>(candidates: &[P]) -> Result<bool> {
    let mut last_error = None;
    for path in candidates {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(cmdline) => {
                let sysmaint = cmdline.contains(display::SYSMAINT_MARKER);
                info!(path = %path.display(), sysmaint = sysmaint, "Read kernel command line");
                return Ok(sysmaint);
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Kernel command line not readable here");
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => anyhow!(e).context("Cannot read the kernel command line"),
        None => anyhow!("No kernel command line location configured"),
    })
}

/// Poll `processes` until every name in `wanted` is running or `timeout` passes
///
/// A timeout is not an error, the caller just starts in a degraded state.
pub fn wait_for_processes(
    processes: &dyn ProcessTable,
    wanted: &[String],
    timeout: Duration,
    poll_interval: Duration,
) -> WaitOutcome {
    let start = Instant::now();
    info!(processes = ?wanted, timeout_secs = timeout.as_secs(), "Waiting for session processes");

    loop {
        let snapshot = processes
            .command_names()
            .context("Failed to snapshot process list")
            .inspect_err(|e| warn!(error = ?e, "Process snapshot failed, retrying"))
            .unwrap_or_default();

        let missing: Vec<String> = wanted
            .iter()
            .filter(|name| !snapshot.contains(name))
            .cloned()
            .collect();
        if missing.is_empty() {
            info!(elapsed_ms = start.elapsed().as_millis(), "All awaited processes are running");
            return WaitOutcome::Ready;
        }

        if start.elapsed() >= timeout {
            warn!(missing = ?missing, "Timed out waiting for processes, continuing anyway");
            return WaitOutcome::TimedOut { missing };
        }

        debug!(missing = ?missing, "Still waiting for processes");
        thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use crate::virt::test_support::FakeProcesses;
    use std::cell::Cell;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Reports `labwc` only from the third snapshot on
    struct SlowSession {
        calls: Cell<usize>,
    }

    impl ProcessTable for SlowSession {
        fn command_names(&self) -> Result<Vec<String>> {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() >= 3 {
                Ok(names(&["systemd", "labwc"]))
            } else {
                Ok(names(&["systemd"]))
            }
        }

        fn command_lines(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_ready_immediately() {
        let procs = FakeProcesses::with_names(&["systemd", "labwc", "pipewire"]);
        let outcome = wait_for_processes(
            &procs,
            &names(&["labwc", "pipewire"]),
            Duration::from_secs(30),
            Duration::ZERO,
        );
        assert_eq!(outcome, WaitOutcome::Ready);
    }

    #[test]
    fn test_empty_wait_list_is_ready() {
        let outcome = wait_for_processes(&FakeProcesses::default(), &[], Duration::ZERO, Duration::ZERO);
        assert_eq!(outcome, WaitOutcome::Ready);
    }

    #[test]
    fn test_times_out_with_missing_list() {
        let procs = FakeProcesses::with_names(&["systemd", "labwc"]);
        let outcome = wait_for_processes(
            &procs,
            &names(&["labwc", "sysmaint-panel"]),
            Duration::ZERO,
            Duration::ZERO,
        );
        assert_eq!(
            outcome,
            WaitOutcome::TimedOut {
                missing: names(&["sysmaint-panel"])
            }
        );
    }

    #[test]
    fn test_names_must_match_exactly() {
        let procs = FakeProcesses::with_names(&["labwc-helper"]);
        let outcome = wait_for_processes(&procs, &names(&["labwc"]), Duration::ZERO, Duration::ZERO);
        assert!(matches!(outcome, WaitOutcome::TimedOut { .. }));
    }

    #[test]
    fn test_polls_until_process_appears() {
        let procs = SlowSession { calls: Cell::new(0) };
        let outcome = wait_for_processes(
            &procs,
            &names(&["labwc"]),
            Duration::from_secs(60),
            Duration::from_millis(1),
        );
        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(procs.calls.get(), 3);
    }

    #[test]
    fn test_sysmaint_marker_detected() {
        let dir = TempDir::new().unwrap();
        let cmdline = dir.path().join("cmdline");
        fs::write(&cmdline, "BOOT_IMAGE=/vmlinuz root=/dev/vda1 boot-role=sysmaint quiet\n").unwrap();
        assert!(detect_sysmaint_in(&[cmdline]).unwrap());
    }

    #[test]
    fn test_normal_boot() {
        let dir = TempDir::new().unwrap();
        let cmdline = dir.path().join("cmdline");
        fs::write(&cmdline, "BOOT_IMAGE=/vmlinuz root=/dev/vda1 quiet\n").unwrap();
        assert!(!detect_sysmaint_in(&[cmdline]).unwrap());
    }

    #[test]
    fn test_falls_back_to_second_path() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("bootargs");
        fs::write(&fallback, "console=ttyS0 boot-role=sysmaint").unwrap();
        let candidates = [dir.path().join("missing"), fallback];
        assert!(detect_sysmaint_in(&candidates).unwrap());
    }

    #[test]
    fn test_no_readable_cmdline_is_fatal() {
        let candidates = ["/nonexistent/cmdline", "/nonexistent/bootargs"];
        assert!(detect_sysmaint_in(&candidates).is_err());
    }
}
