//! Desktop notifications, best effort

use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::constants::tools;

/// Fire-and-forget user notification
pub trait Notifier {
    fn notify(&self, title: &str, body: &str);
}

/// [`Notifier`] that shells out to notify-send
#[derive(Debug, Clone)]
pub struct NotifySend {
    binary: PathBuf,
}

impl NotifySend {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from(tools::NOTIFY_SEND),
        }
    }
}

impl Default for NotifySend {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NotifySend {
    fn notify(&self, title: &str, body: &str) {
        let result = Command::new(&self.binary)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match result {
            Ok(status) if status.success() => debug!(title = %title, "Sent notification"),
            Ok(status) => debug!(title = %title, status = %status, "Notification client failed"),
            Err(e) => debug!(title = %title, error = %e, "Could not run notification client"),
        }
    }
}
