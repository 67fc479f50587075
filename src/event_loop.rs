//! Card events in, reconciliation passes out
//!
//! One pass runs at a time. Events that arrive while we settle or while a
//! pass runs are folded into the next pass instead of queueing one each.

use anyhow::{Context, Result};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use crate::reconcile::{sync_displays, ReconcileSession, SyncContext};

/// Block for the next event, settle, then drain everything that piled up
///
/// Card names come back deduplicated in first-seen order.
pub fn next_batch(events: &Receiver<String>, settle: Duration) -> Result<Vec<String>> {
    let first = events
        .recv()
        .context("Card event source stopped, cannot watch for resolution changes")?;
    thread::sleep(settle);

    let mut cards = vec![first];
    for card in events.try_iter() {
        if !cards.contains(&card) {
            cards.push(card);
        }
    }
    Ok(cards)
}

/// Run passes for card events until the event source goes away
///
/// Only returns with an error; under normal operation it runs until killed.
pub fn run(
    ctx: &SyncContext<'_>,
    session: &mut ReconcileSession,
    events: &Receiver<String>,
    settle: Duration,
) -> Result<()> {
    info!("Watching for display changes");
    loop {
        let cards = next_batch(events, settle)?;
        debug!(cards = ?cards, "Card change, reconciling");
        let report = sync_displays(ctx, session, Some(&cards))
            .context(format!("Failed to sync displays for {}", cards.join(", ")))?;
        if report.resized > 0 || report.failed > 0 {
            info!(resized = report.resized, failed = report.failed, "Display sync finished");
        }
    }
}
