//! Reconciliation of compositor modes with native hardware modes
//!
//! Each pass enumerates both sides fresh, pairs outputs by exact name and
//! resizes every compositor output whose mode differs from the connector's
//! native mode. A failed resize only affects that output; the next card
//! event retries naturally.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Policy;
use crate::constants::notify;
use crate::drm::{hardware_displays, DrmTree};
use crate::notify::Notifier;
use crate::randr::Compositor;

/// Collaborators and policy shared by every pass
pub struct SyncContext<'a> {
    pub policy: &'a Policy,
    pub compositor: &'a dyn Compositor,
    pub notifier: &'a dyn Notifier,
    pub drm: &'a DrmTree,
}

/// Mutable state carried between passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSession {
    /// Cleared after the first refusal notification
    warn_on_refuse: bool,
}

impl ReconcileSession {
    pub fn new(policy: &Policy) -> Self {
        Self {
            warn_on_refuse: policy.warn_on_refuse,
        }
    }

    fn refuse(&mut self, notifier: &dyn Notifier) {
        debug!("Dynamic resolution disabled by policy, not resizing");
        if self.warn_on_refuse {
            notifier.notify(notify::REFUSE_TITLE, notify::REFUSE_BODY);
            self.warn_on_refuse = false;
        }
    }
}

/// What a pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub resized: usize,
    pub failed: usize,
    /// Hardware displays the compositor doesn't expose
    pub unmatched: usize,
}

/// Bring every matched output to its native mode
///
/// `cards` limits the hardware side to those cards; `None` means every card
/// currently present.
pub fn sync_displays(
    ctx: &SyncContext<'_>,
    session: &mut ReconcileSession,
    cards: Option<&[String]>,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    if !ctx.policy.enable_dynamic_resolution {
        session.refuse(ctx.notifier);
        return Ok(report);
    }

    let Some(compositor_displays) = ctx.compositor.outputs()? else {
        debug!("Compositor sees no displays");
        return Ok(report);
    };
    let Some(hw_displays) = hardware_displays(ctx.drm, cards)? else {
        debug!(cards = ?cards, "No connected hardware displays");
        return Ok(report);
    };

    for hw_display in &hw_displays {
        let Some(current) = compositor_displays
            .iter()
            .find(|display| display.name == hw_display.name)
        else {
            debug!(output = %hw_display.name, "Compositor does not expose this output");
            report.unmatched += 1;
            continue;
        };

        if current.mode == hw_display.mode {
            continue;
        }

        info!(
            output = %hw_display.name,
            from = %current.mode,
            to = %hw_display.mode,
            "Syncing display to native resolution"
        );
        match ctx.compositor.set_mode(&hw_display.name, &hw_display.mode) {
            Ok(()) => report.resized += 1,
            Err(e) => {
                warn!(output = %hw_display.name, error = ?e, "Unable to sync display resolution");
                report.failed += 1;
            }
        }
    }

    debug!(report = ?report, "Reconciliation pass finished");
    Ok(report)
}

/// Set every compositor output to `resolution`
pub fn apply_default_resolution(ctx: &SyncContext<'_>, resolution: &str) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    let Some(displays) = ctx.compositor.outputs()? else {
        debug!("Compositor sees no displays");
        return Ok(report);
    };

    for compositor_display in &displays {
        info!(output = %compositor_display.name, mode = %resolution, "Setting default display resolution");
        match ctx.compositor.set_mode(&compositor_display.name, resolution) {
            Ok(()) => report.resized += 1,
            Err(e) => {
                warn!(output = %compositor_display.name, error = ?e, "Unable to set default display resolution");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}
