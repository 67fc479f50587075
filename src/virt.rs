//! Virtualizer detection and the resize-helper readiness gate
//!
//! Native-mode changes only reach the guest's DRM device when the
//! hypervisor's guest helper is installed and running. Without it the
//! daemon still runs, but falls back to a fixed default resolution.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{info, warn};

use crate::constants::{helpers, tools};
use crate::procfs::ProcessTable;
use crate::types::{ReadinessState, VirtualizerKind};

/// Outcome of looking for a guest helper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperStatus {
    Running,
    Missing,
    NotRunning,
}

/// Runs the platform detection tool
#[derive(Debug, Clone)]
pub struct VirtDetector {
    binary: PathBuf,
}

impl VirtDetector {
    pub fn new() -> Self {
        Self::with_binary(tools::DETECT_VIRT)
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Classify the host; a tool failure yields `Unknown`
    pub fn detect(&self) -> VirtualizerKind {
        match self.run() {
            Ok(output) => {
                let kind = VirtualizerKind::from_detect_output(&output);
                info!(output = %output.trim(), kind = ?kind, "Detected virtualizer");
                kind
            }
            Err(e) => {
                warn!(error = ?e, "Cannot detect virtualizer in use");
                VirtualizerKind::Unknown
            }
        }
    }

    fn run(&self) -> Result<String> {
        // Exit status is deliberately ignored, the tool exits 1 when it prints "none"
        let output = Command::new(&self.binary)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .context(format!("Failed to run {}", self.binary.display()))?;
        String::from_utf8(output.stdout).context("Virtualizer detection output is not valid UTF-8")
    }
}

impl Default for VirtDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Guest helper binary a virtualizer needs, if any
pub fn helper_for(kind: VirtualizerKind) -> Option<&'static str> {
    match kind {
        VirtualizerKind::Oracle => Some(helpers::VBOX_DRM_CLIENT),
        VirtualizerKind::Kvm => Some(helpers::SPICE_VDAGENTD),
        _ => None,
    }
}

/// Whether `exe` exists and some process was started from exactly that path
///
/// A process started through a relative path or a symlink won't match.
pub fn helper_status(exe: &Path, processes: &dyn ProcessTable) -> Result<HelperStatus> {
    if !exe.is_file() {
        return Ok(HelperStatus::Missing);
    }

    let exe = exe.to_string_lossy().into_owned();
    let with_args = format!("{exe} ");
    let running = processes
        .command_lines()?
        .iter()
        .any(|line| *line == exe || line.starts_with(&with_args));

    Ok(if running {
        HelperStatus::Running
    } else {
        HelperStatus::NotRunning
    })
}

/// Decide whether native-mode reconciliation can work on this host
///
/// Never fails: every problem degrades to `resize_helper_present = false`.
/// Physical hardware must be handled by the caller before this point.
pub fn assess_readiness(
    virtualizer: VirtualizerKind,
    processes: &dyn ProcessTable,
    in_sysmaint_mode: bool,
) -> ReadinessState {
    let helper = helper_for(virtualizer).map(Path::new);
    assess_with_helper(virtualizer, helper, processes, in_sysmaint_mode)
}

fn assess_with_helper(
    virtualizer: VirtualizerKind,
    helper: Option<&Path>,
    processes: &dyn ProcessTable,
    in_sysmaint_mode: bool,
) -> ReadinessState {
    let resize_helper_present = match (virtualizer, helper) {
        (VirtualizerKind::Oracle | VirtualizerKind::Kvm, Some(exe)) => {
            match helper_status(exe, processes) {
                Ok(HelperStatus::Running) => {
                    info!(helper = %exe.display(), "Virtualizer helper is running");
                    true
                }
                Ok(HelperStatus::Missing) => {
                    warn!(helper = %exe.display(), "Virtualizer helper is missing");
                    false
                }
                Ok(HelperStatus::NotRunning) => {
                    warn!(helper = %exe.display(), "Virtualizer helper is not running");
                    false
                }
                Err(e) => {
                    warn!(helper = %exe.display(), error = ?e, "Cannot check virtualizer helper");
                    false
                }
            }
        }
        (VirtualizerKind::Xen, _) => true,
        (VirtualizerKind::Unknown, _) => {
            warn!("Virtualizer unknown, dynamic resolution unavailable");
            false
        }
        _ => {
            warn!(virtualizer = ?virtualizer, "Running on an unsupported virtualizer");
            false
        }
    };

    ReadinessState {
        virtualizer,
        resize_helper_present,
        in_sysmaint_mode,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeProcesses;
    use super::*;
    use tempfile::TempDir;

    fn fake_helper(dir: &TempDir) -> PathBuf {
        let exe = dir.path().join("VBoxDRMClient");
        std::fs::write(&exe, "").unwrap();
        exe
    }

    #[test]
    fn test_helper_missing() {
        let procs = FakeProcesses::with_lines(&["/nonexistent/VBoxDRMClient"]);
        let status = helper_status(Path::new("/nonexistent/VBoxDRMClient"), &procs).unwrap();
        assert_eq!(status, HelperStatus::Missing);
    }

    #[test]
    fn test_helper_running_with_and_without_args() {
        let dir = TempDir::new().unwrap();
        let exe = fake_helper(&dir);
        let exe_str = exe.to_string_lossy().to_string();

        let bare = FakeProcesses::with_lines(&["/sbin/init", &exe_str]);
        assert_eq!(helper_status(&exe, &bare).unwrap(), HelperStatus::Running);

        let with_args = format!("{exe_str} --foreground");
        let args = FakeProcesses::with_lines(&[&with_args]);
        assert_eq!(helper_status(&exe, &args).unwrap(), HelperStatus::Running);
    }

    #[test]
    fn test_helper_prefix_must_end_at_token() {
        let dir = TempDir::new().unwrap();
        let exe = fake_helper(&dir);
        let longer = format!("{}-wrapper", exe.to_string_lossy());
        let nested = format!("/usr/bin/env {}", exe.to_string_lossy());

        let procs = FakeProcesses::with_lines(&[&longer, &nested]);
        assert_eq!(helper_status(&exe, &procs).unwrap(), HelperStatus::NotRunning);
    }

    #[test]
    fn test_oracle_ready_only_with_running_helper() {
        let dir = TempDir::new().unwrap();
        let exe = fake_helper(&dir);
        let exe_str = exe.to_string_lossy().to_string();

        let running = FakeProcesses::with_lines(&[&exe_str]);
        let ready = assess_with_helper(VirtualizerKind::Oracle, Some(&exe), &running, false);
        assert!(ready.resize_helper_present);

        let stopped = FakeProcesses::with_lines(&["/sbin/init"]);
        let ready = assess_with_helper(VirtualizerKind::Oracle, Some(&exe), &stopped, false);
        assert!(!ready.resize_helper_present);
    }

    #[test]
    fn test_kvm_with_missing_helper_is_not_ready() {
        let missing = Path::new("/nonexistent/spice-vdagentd");
        let procs = FakeProcesses::with_lines(&["/nonexistent/spice-vdagentd"]);
        let ready = assess_with_helper(VirtualizerKind::Kvm, Some(missing), &procs, false);
        assert!(!ready.resize_helper_present);
        assert_eq!(ready.virtualizer, VirtualizerKind::Kvm);
    }

    #[test]
    fn test_xen_is_ready_without_helper() {
        let readiness = assess_readiness(VirtualizerKind::Xen, &FakeProcesses::default(), false);
        assert!(readiness.resize_helper_present);
        assert_eq!(readiness.virtualizer, VirtualizerKind::Xen);
    }

    #[test]
    fn test_unsupported_virtualizers_are_not_ready() {
        for kind in [VirtualizerKind::Other, VirtualizerKind::Unknown] {
            let readiness = assess_readiness(kind, &FakeProcesses::default(), true);
            assert!(!readiness.resize_helper_present);
            assert!(readiness.in_sysmaint_mode);
        }
    }

    #[test]
    fn test_helpers_per_virtualizer() {
        assert_eq!(helper_for(VirtualizerKind::Oracle), Some("/usr/bin/VBoxDRMClient"));
        assert_eq!(helper_for(VirtualizerKind::Kvm), Some("/usr/bin/spice-vdagentd"));
        assert_eq!(helper_for(VirtualizerKind::Xen), None);
    }

    #[test]
    fn test_detection_tool_failure_is_unknown() {
        let detector = VirtDetector::with_binary("/nonexistent/systemd-detect-virt");
        assert_eq!(detector.detect(), VirtualizerKind::Unknown);
    }

    #[test]
    fn test_empty_detection_output_is_unknown() {
        // sh with stdin at /dev/null prints nothing
        assert_eq!(VirtDetector::with_binary("/bin/sh").detect(), VirtualizerKind::Unknown);
    }
}
