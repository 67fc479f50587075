//! Resize policy and its config-file representation

use anyhow::{bail, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::types::{is_resolution_token, VirtualizerKind};

/// Validated, immutable daemon policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Follow native resolution changes at all
    pub enable_dynamic_resolution: bool,
    /// Notify the user once when a resize is refused by policy
    pub warn_on_refuse: bool,
    /// Fallback resolution for most virtualizers
    pub standard_default_resolution: String,
    /// Fallback resolution on Xen
    pub small_default_resolution: String,
    /// Processes to wait for before the first pass, normal boot
    pub normal_wait_proc_list: Vec<String>,
    /// Processes to wait for before the first pass, sysmaint boot
    pub sysmaint_wait_proc_list: Vec<String>,
    /// Upper bound on the process wait, in seconds
    pub wait_proc_timeout: u64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enable_dynamic_resolution: true,
            warn_on_refuse: true,
            standard_default_resolution: "1920x1080".to_string(),
            small_default_resolution: "1280x720".to_string(),
            normal_wait_proc_list: vec!["labwc".to_string()],
            sysmaint_wait_proc_list: vec!["labwc".to_string()],
            wait_proc_timeout: 30,
        }
    }
}

impl Policy {
    /// Resolution to fall back to when native modes can't be followed
    pub fn default_resolution(&self, virtualizer: VirtualizerKind) -> &str {
        match virtualizer {
            VirtualizerKind::Xen => &self.small_default_resolution,
            _ => &self.standard_default_resolution,
        }
    }

    /// Wait list for the boot mode we're in
    pub fn wait_list(&self, in_sysmaint_mode: bool) -> &[String] {
        if in_sysmaint_mode {
            &self.sysmaint_wait_proc_list
        } else {
            &self.normal_wait_proc_list
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_proc_timeout)
    }

    /// Overlay the keys a config file sets
    pub(super) fn apply(&mut self, file: PolicyFile) {
        let PolicyFile {
            enable_dynamic_resolution,
            warn_on_refuse,
            standard_default_resolution,
            small_default_resolution,
            normal_wait_proc_list,
            sysmaint_wait_proc_list,
            wait_proc_timeout,
        } = file;

        if let Some(v) = enable_dynamic_resolution {
            self.enable_dynamic_resolution = v;
        }
        if let Some(v) = warn_on_refuse {
            self.warn_on_refuse = v;
        }
        if let Some(v) = standard_default_resolution {
            self.standard_default_resolution = v;
        }
        if let Some(v) = small_default_resolution {
            self.small_default_resolution = v;
        }
        if let Some(v) = normal_wait_proc_list {
            self.normal_wait_proc_list = v;
        }
        if let Some(v) = sysmaint_wait_proc_list {
            self.sysmaint_wait_proc_list = v;
        }
        if let Some(v) = wait_proc_timeout {
            self.wait_proc_timeout = v;
        }
    }

    /// Reject values serde can't catch on its own
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("standard_default_resolution", &self.standard_default_resolution),
            ("small_default_resolution", &self.small_default_resolution),
        ] {
            if !is_resolution_token(value) {
                bail!("{key} must look like WIDTHxHEIGHT, got '{value}'");
            }
        }

        for (key, list) in [
            ("normal_wait_proc_list", &self.normal_wait_proc_list),
            ("sysmaint_wait_proc_list", &self.sysmaint_wait_proc_list),
        ] {
            if list.iter().any(|name| name.trim().is_empty()) {
                bail!("{key} contains an empty process name");
            }
        }
        Ok(())
    }
}

/// One config drop-in file; every key optional, unknown keys rejected
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct PolicyFile {
    enable_dynamic_resolution: Option<bool>,
    warn_on_refuse: Option<bool>,
    standard_default_resolution: Option<String>,
    small_default_resolution: Option<String>,
    normal_wait_proc_list: Option<Vec<String>>,
    sysmaint_wait_proc_list: Option<Vec<String>>,
    wait_proc_timeout: Option<u64>,
}
