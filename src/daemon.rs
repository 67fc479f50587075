//! Daemon start-up sequence
//!
//! Host check → config → sysmaint/readiness → process wait → first pass →
//! event loop. Everything up to the first pass runs exactly once.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::mpsc;
use tracing::info;

use crate::card_events;
use crate::config::{self, Policy};
use crate::constants::{paths, timing};
use crate::drm::DrmTree;
use crate::event_loop;
use crate::notify::NotifySend;
use crate::process_wait::{detect_sysmaint_mode, wait_for_processes};
use crate::procfs::ProcFs;
use crate::randr::WlrRandr;
use crate::reconcile::{apply_default_resolution, sync_displays, ReconcileSession, SyncContext, SyncReport};
use crate::types::{ReadinessState, VirtualizerKind};
use crate::virt::{assess_readiness, VirtDetector};

/// Whether this host is one we should run on at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCheck {
    Supported(VirtualizerKind),
    /// Qubes OS manages guest resolution itself
    Qubes,
    Physical,
}

/// How the first pass brings displays into shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupPlan {
    NativeModes,
    DefaultResolution(String),
}

/// Check for the Qubes marker, then ask `detect` for the virtualizer
pub fn check_host(qubes_marker: &Path, detect: impl FnOnce() -> VirtualizerKind) -> HostCheck {
    if qubes_marker.is_file() {
        return HostCheck::Qubes;
    }
    match detect() {
        VirtualizerKind::None => HostCheck::Physical,
        kind => HostCheck::Supported(kind),
    }
}

pub fn plan_startup(policy: &Policy, readiness: &ReadinessState) -> StartupPlan {
    if readiness.resize_helper_present && policy.enable_dynamic_resolution {
        StartupPlan::NativeModes
    } else {
        StartupPlan::DefaultResolution(policy.default_resolution(readiness.virtualizer).to_string())
    }
}

/// The one-shot pass before the event loop takes over
pub fn initial_pass(
    ctx: &SyncContext<'_>,
    session: &mut ReconcileSession,
    readiness: &ReadinessState,
) -> Result<SyncReport> {
    match plan_startup(ctx.policy, readiness) {
        StartupPlan::NativeModes => sync_displays(ctx, session, None),
        StartupPlan::DefaultResolution(resolution) => {
            info!(
                resolution = %resolution,
                helper_present = readiness.resize_helper_present,
                dynamic = ctx.policy.enable_dynamic_resolution,
                "Falling back to default resolution"
            );
            let report = apply_default_resolution(ctx, &resolution)?;
            if !ctx.policy.enable_dynamic_resolution {
                // Surfaces the refusal notice now rather than on the first event
                sync_displays(ctx, session, None)?;
            }
            Ok(report)
        }
    }
}

/// Run the watcher; returns `Ok` only when there is intentionally nothing to do
pub fn run_daemon() -> Result<()> {
    run_on_host(Path::new(paths::QUBES_MARKER), || VirtDetector::new().detect())
}

fn run_on_host(qubes_marker: &Path, detect: impl FnOnce() -> VirtualizerKind) -> Result<()> {
    let virtualizer = match check_host(qubes_marker, detect) {
        HostCheck::Qubes => {
            info!("Qubes OS detected, exiting");
            return Ok(());
        }
        HostCheck::Physical => {
            info!("Running on physical hardware, exiting");
            return Ok(());
        }
        HostCheck::Supported(kind) => kind,
    };
    info!(virtualizer = ?virtualizer, "Virtualized host");

    let policy = config::load_policy().context("Failed to load configuration")?;
    info!(policy = ?policy, "Loaded policy");

    let processes = ProcFs::new();
    let in_sysmaint_mode = detect_sysmaint_mode()?;
    let readiness = assess_readiness(virtualizer, &processes, in_sysmaint_mode);
    info!(readiness = ?readiness, "Startup readiness");

    wait_for_processes(
        &processes,
        policy.wait_list(in_sysmaint_mode),
        policy.wait_timeout(),
        timing::PROCESS_POLL_INTERVAL,
    );

    let compositor = WlrRandr::new();
    let notifier = NotifySend::new();
    let drm = DrmTree::new();
    info!(root = %drm.root().display(), "Using DRM class tree");
    let ctx = SyncContext {
        policy: &policy,
        compositor: &compositor,
        notifier: &notifier,
        drm: &drm,
    };
    let mut session = ReconcileSession::new(&policy);

    // Subscribe before the first pass so changes made during it aren't lost
    let (card_tx, card_rx) = mpsc::channel();
    let _listener = card_events::spawn_listener(card_tx)?;

    let report = initial_pass(&ctx, &mut session, &readiness)?;
    info!(resized = report.resized, failed = report.failed, "Initial display sync finished");

    event_loop::run(&ctx, &mut session, &card_rx, timing::SETTLE_DELAY)
}
