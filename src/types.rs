//! Shared value types

use std::fmt;

/// A named output and one resolution token (`WIDTHxHEIGHT`)
///
/// Compositor-side instances carry the output's current mode, hardware-side
/// instances carry the connector's native mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    pub name: String,
    pub mode: String,
}

impl DisplayInfo {
    pub fn new(name: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: mode.into(),
        }
    }
}

impl fmt::Display for DisplayInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mode)
    }
}

/// Hypervisor the guest is running under, as reported by systemd-detect-virt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualizerKind {
    Oracle,
    Kvm,
    Xen,
    /// Physical hardware
    None,
    /// Some virtualizer we have no integration for
    Other,
    /// Detection itself failed
    Unknown,
}

impl VirtualizerKind {
    /// Classify the trimmed output of the detection tool
    pub fn from_detect_output(output: &str) -> Self {
        match output.trim() {
            "oracle" => Self::Oracle,
            "kvm" => Self::Kvm,
            "xen" => Self::Xen,
            "none" => Self::None,
            "" => Self::Unknown,
            _ => Self::Other,
        }
    }
}

/// Startup readiness, computed once and never re-derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessState {
    pub virtualizer: VirtualizerKind,
    pub resize_helper_present: bool,
    pub in_sysmaint_mode: bool,
}

/// Check that a token looks like `WIDTHxHEIGHT` with positive dimensions
pub fn is_resolution_token(token: &str) -> bool {
    let Some((width, height)) = token.split_once('x') else {
        return false;
    };
    [width, height].iter().all(|dim| {
        !dim.is_empty()
            && dim.bytes().all(|b| b.is_ascii_digit())
            && dim.parse::<u32>().is_ok_and(|n| n > 0)
    })
}
