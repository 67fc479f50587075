use anyhow::{bail, Context, Result};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::AsFd;
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::{debug, error, info};

use crate::drm::is_card_name;

const DRM_SUBSYSTEM: &str = "drm";

/// Card name for a `.../drm/card<N>` syspath, `None` for connectors and others
pub fn card_from_syspath(syspath: &Path) -> Option<String> {
    let name = syspath.file_name()?.to_str()?;
    let parent = syspath.parent()?.file_name()?;
    (parent == DRM_SUBSYSTEM && is_card_name(name)).then(|| name.to_string())
}

fn open_drm_monitor() -> Result<udev::MonitorSocket> {
    udev::MonitorBuilder::new()
        .context("Failed to create udev monitor")?
        .match_subsystem(DRM_SUBSYSTEM)
        .context("Failed to filter udev monitor on the drm subsystem")?
        .listen()
        .context("Cannot listen for DRM udev events")
}

/// Spawn a background thread forwarding DRM card events as card names
///
/// Returns once the netlink subscription is up, or with its error.
pub fn spawn_listener(sender: Sender<String>) -> Result<thread::JoinHandle<()>> {
    let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

    let handle = thread::Builder::new()
        .name("card-events".to_string())
        .spawn(move || {
            let socket = match open_drm_monitor() {
                Ok(socket) => {
                    let _ = ready_tx.send(Ok(()));
                    socket
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            info!(subsystem = DRM_SUBSYSTEM, "Card event listener started");
            if let Err(e) = listen_for_card_events(&socket, &sender) {
                error!(error = ?e, "Card event listener error");
            }
        })
        .context("Failed to spawn card event listener thread")?;

    ready_rx
        .recv()
        .context("Card event listener exited during setup")??;
    Ok(handle)
}

/// Block on the monitor socket and forward card events until the receiver hangs up
fn listen_for_card_events(socket: &udev::MonitorSocket, sender: &Sender<String>) -> Result<()> {
    loop {
        let mut fds = [PollFd::new(socket.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e).context("Failed to poll udev monitor"),
        }
        check_revents(fds[0].revents())?;

        for event in socket.iter() {
            let syspath = event.syspath();
            let Some(card) = card_from_syspath(syspath) else {
                debug!(syspath = %syspath.display(), "Ignoring non-card DRM event");
                continue;
            };

            debug!(card = %card, action = ?event.event_type(), "Card event");
            if sender.send(card).is_err() {
                debug!("Card event receiver gone, stopping listener");
                return Ok(());
            }
        }
    }
}

/// Fail on error or hang-up, otherwise the socket never drains and poll spins
fn check_revents(revents: Option<PollFlags>) -> Result<()> {
    let flags = revents.unwrap_or(PollFlags::empty());
    if flags.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
        bail!("udev monitor socket failed ({flags:?})");
    }
    Ok(())
}
