//! Process snapshots from procfs

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::constants::paths;

/// Source of process-list snapshots
pub trait ProcessTable {
    /// Command name (`comm`) of every process
    fn command_names(&self) -> Result<Vec<String>>;

    /// Full command line of every process, arguments joined by single spaces
    fn command_lines(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new() -> Self {
        Self::at(paths::PROC_ROOT)
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read `file` for every pid; processes that exit meanwhile are skipped
    fn read_each(&self, file: &str) -> Result<Vec<Vec<u8>>> {
        let entries = fs::read_dir(&self.root)
            .context(format!("Failed to list processes in {}", self.root.display()))?;

        let mut contents = Vec::new();
        for entry in entries.filter_map(|entry| entry.ok()) {
            let is_pid = entry
                .file_name()
                .to_str()
                .is_some_and(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()));
            if !is_pid {
                continue;
            }
            if let Ok(data) = fs::read(entry.path().join(file)) {
                contents.push(data);
            }
        }
        Ok(contents)
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for ProcFs {
    fn command_names(&self) -> Result<Vec<String>> {
        Ok(self
            .read_each("comm")?
            .into_iter()
            .map(|data| String::from_utf8_lossy(&data).trim_end_matches('\n').to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }

    fn command_lines(&self) -> Result<Vec<String>> {
        Ok(self
            .read_each("cmdline")?
            .into_iter()
            .map(|data| join_cmdline(&data))
            .filter(|line| !line.is_empty())
            .collect())
    }
}

/// NUL-separated argv to a space-joined string
fn join_cmdline(data: &[u8]) -> String {
    data.split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}
