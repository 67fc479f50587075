//! Application-wide constants
//!
//! Tool locations, sysfs/procfs paths and timing values used by the watcher,
//! kept in one place so tests and the daemon agree on them.

use std::time::Duration;

/// External command-line tools
pub mod tools {
    /// wlroots output query/configuration tool
    pub const WLR_RANDR: &str = "/usr/bin/wlr-randr";

    /// Hypervisor detection tool
    pub const DETECT_VIRT: &str = "/usr/bin/systemd-detect-virt";

    /// Desktop notification client
    pub const NOTIFY_SEND: &str = "/usr/bin/notify-send";
}

/// Filesystem locations
pub mod paths {
    /// Root of the kernel DRM class tree
    pub const DRM_ROOT: &str = "/sys/class/drm";

    /// Root of procfs
    pub const PROC_ROOT: &str = "/proc";

    /// Marker file present inside Qubes OS qubes
    pub const QUBES_MARKER: &str = "/usr/share/qubes/marker-vm";

    /// Kernel command line, tried in order
    pub const KERNEL_CMDLINE: &[&str] = &[
        "/proc/cmdline",
        "/sys/firmware/devicetree/base/chosen/bootargs",
    ];

    /// Runtime directory used when XDG_RUNTIME_DIR is not set ({} = uid)
    pub const RUNTIME_DIR_FORMAT: &str = "/run/user/{}";
}

/// Virtualizer guest helpers that drive native-mode changes
pub mod helpers {
    /// VirtualBox DRM resize client
    pub const VBOX_DRM_CLIENT: &str = "/usr/bin/VBoxDRMClient";

    /// SPICE guest agent daemon (KVM/QEMU)
    pub const SPICE_VDAGENTD: &str = "/usr/bin/spice-vdagentd";
}

/// Configuration discovery
pub mod config {
    /// Application directory name under the system and user config roots
    pub const APP_DIR: &str = "wlr-resize-watcher";

    /// System-wide drop-in directories, lowest precedence first
    pub const SYSTEM_DIRS: &[&str] = &[
        "/etc/wlr-resize-watcher.d",
        "/usr/local/etc/wlr-resize-watcher.d",
    ];

    /// Extension of config drop-in files
    pub const EXTENSION: &str = "toml";
}

/// Display mode handling
pub mod display {
    /// Refresh rate assumed for every mode we set
    pub const REFRESH_HZ: u32 = 60;

    /// Substring of the kernel command line marking a sysmaint boot
    pub const SYSMAINT_MARKER: &str = "boot-role=sysmaint";
}

/// Timing
pub mod timing {
    use super::Duration;

    /// Wait after a card event so the compositor can pick up new outputs
    pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

    /// Poll cadence of the startup process-wait gate
    pub const PROCESS_POLL_INTERVAL: Duration = Duration::from_secs(1);
}

/// Notification text shown when dynamic resolution is refused by policy
pub mod notify {
    pub const REFUSE_TITLE: &str = "Dynamic resolution disabled";

    pub const REFUSE_BODY: &str = "The VM window size will not be applied to the desktop. \
        Set enable_dynamic_resolution = true to turn automatic resizing on.";
}
