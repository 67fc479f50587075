//! Compositor access through wlr-randr
//!
//! Queries the outputs the compositor currently sees and changes their mode.
//! Output is scraped from the tool's human-readable format, see [`parser`].

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::constants::{display, paths, tools};
use crate::types::DisplayInfo;

mod parser;
use parser::parse_outputs;

/// The compositor-side view of outputs
pub trait Compositor {
    /// Current outputs with their active mode, `None` if there are none
    fn outputs(&self) -> Result<Option<Vec<DisplayInfo>>>;

    /// Switch `output` to `mode` at the fixed refresh rate
    fn set_mode(&self, output: &str, mode: &str) -> Result<()>;
}

/// [`Compositor`] backed by the wlr-randr binary
#[derive(Debug, Clone)]
pub struct WlrRandr {
    binary: PathBuf,
    runtime_dir: OsString,
}

impl WlrRandr {
    pub fn new() -> Self {
        Self::with_binary(tools::WLR_RANDR)
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            runtime_dir: runtime_dir(),
        }
    }

    /// Base command with a fixed environment: the Wayland runtime dir and C locale
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.env_clear()
            .env("XDG_RUNTIME_DIR", &self.runtime_dir)
            .env("LC_ALL", "C")
            .stdin(Stdio::null());
        cmd
    }
}

impl Default for WlrRandr {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor for WlrRandr {
    fn outputs(&self) -> Result<Option<Vec<DisplayInfo>>> {
        let output = self
            .command()
            .output()
            .context(format!("Could not get list of displays from compositor ({})", self.binary.display()))?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8(output.stdout)
            .context("wlr-randr output is not valid UTF-8")?;
        let outputs = parse_outputs(&stdout)
            .with_context(|| format!("Unexpected wlr-randr output:\n{stdout}"))?;
        debug!(count = outputs.as_ref().map_or(0, Vec::len), "Queried compositor outputs");
        Ok(outputs)
    }

    fn set_mode(&self, output: &str, mode: &str) -> Result<()> {
        let custom_mode = format!("{mode}@{}", display::REFRESH_HZ);
        let status = self
            .command()
            .arg("--output")
            .arg(output)
            .arg("--custom-mode")
            .arg(&custom_mode)
            .status()
            .context(format!("Failed to run {}", self.binary.display()))?;
        if !status.success() {
            bail!("Setting {output} to {custom_mode} failed: {status}");
        }
        Ok(())
    }
}

/// XDG_RUNTIME_DIR, or the conventional per-uid location when unset
fn runtime_dir() -> OsString {
    std::env::var_os("XDG_RUNTIME_DIR").unwrap_or_else(|| {
        let uid = nix::unistd::getuid();
        OsString::from(paths::RUNTIME_DIR_FORMAT.replace("{}", &uid.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tool_output_means_no_displays() {
        // sh with no arguments and stdin at /dev/null prints nothing and succeeds
        let randr = WlrRandr::with_binary("/bin/sh");
        assert_eq!(randr.outputs().unwrap(), None);
    }

    #[test]
    fn test_missing_tool_is_an_error() {
        let randr = WlrRandr::with_binary("/nonexistent/wlr-randr");
        assert!(randr.outputs().is_err());
        assert!(randr.set_mode("Virtual-1", "1920x1080").is_err());
    }

    #[test]
    fn test_failing_resize_is_an_error() {
        // sh rejects the unknown --output option with a non-zero status
        let randr = WlrRandr::with_binary("/bin/sh");
        assert!(randr.set_mode("Virtual-1", "1920x1080").is_err());
    }

    #[test]
    fn test_runtime_dir_is_never_empty() {
        assert!(!runtime_dir().is_empty());
    }
}
