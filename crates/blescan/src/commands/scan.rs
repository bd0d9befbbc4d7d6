//! Discovery session handler.
//!
//! Wires the simulated radio, the stored rules and a process-local hub into
//! a [`ScanCoordinator`], runs it for the requested duration and prints the
//! published list.

use std::sync::Arc;

use chrono::Local;
use tabled::Tabled;
use tracing::{debug, info, warn};

use blescan_core::{
    DeviceFilter, DeviceRecord, DeviceSnapshot, FilterEngine, HubProvider, ScanCoordinator,
    ScanState, SimulatedRadio,
};

use crate::cli::{GlobalOpts, OutputFormat, ScanArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "RSSI")]
    rssi: String,
    #[tabled(rename = "Pairing")]
    pairing: String,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(d: &DeviceRecord) -> Self {
        Self {
            address: d.identity.to_string(),
            name: d.display_name.clone(),
            rssi: format!("{} dBm", d.signal_strength),
            pairing: d.pairing_state.to_string(),
            last_seen: d
                .last_seen
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
        }
    }
}

// ── View ────────────────────────────────────────────────────────────

fn view_filters(args: &ScanArgs) -> Vec<DeviceFilter> {
    let mut filters = Vec::new();
    if let Some(min) = args.min_signal {
        filters.push(DeviceFilter::MinSignal(min));
    }
    if args.named {
        filters.push(DeviceFilter::Named);
    }
    filters
}

fn visible(filters: &[DeviceFilter], snapshot: &DeviceSnapshot) -> Vec<Arc<DeviceRecord>> {
    snapshot
        .iter()
        .filter(|d| filters.iter().all(|f| f.matches(d)))
        .cloned()
        .collect()
}

fn render(
    format: &OutputFormat,
    filters: &[DeviceFilter],
    snapshot: &DeviceSnapshot,
) -> Result<String, CliError> {
    let devices = visible(filters, snapshot);
    output::render_list(
        format,
        &devices,
        |d| DeviceRow::from(d.as_ref()),
        |d| d.identity.to_string(),
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ScanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let scan_config = cfg.to_scan_config()?;
    let settings = cfg.to_simulator_settings()?;

    let store = config::rule_store(global, &cfg);
    let filter = Arc::new(FilterEngine::new());
    let rule_count = filter.reload(&store)?;
    debug!(rules = rule_count, path = %store.path().display(), "loaded filter rules");

    let provider = HubProvider::new();
    let hub = provider.initialize(scan_config.publish_interval)?;
    let radio = SimulatedRadio::new(settings);
    let coordinator = ScanCoordinator::new(scan_config, Arc::new(radio), filter, hub)?;

    for address in cfg.tracked.iter().chain(&args.track) {
        coordinator.add_tracked_device(address.as_str());
    }

    let filters = view_filters(&args);
    let mut published = coordinator.hub().subscribe();
    let mut state = coordinator.scan_state();

    coordinator.start()?;
    info!(duration = ?args.duration, "scan started");

    let deadline = tokio::time::sleep(args.duration);
    tokio::pin!(deadline);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let mut failure = None;
    loop {
        tokio::select! {
            biased;
            _ = &mut interrupt => {
                info!("interrupted, stopping scan");
                break;
            }
            () = &mut deadline => break,
            Ok(()) = state.changed() => {
                if *state.borrow_and_update() == ScanState::Idle {
                    failure = coordinator.last_error();
                    break;
                }
            }
            snapshot = published.changed() => {
                let Some(snapshot) = snapshot else { break };
                if args.watch {
                    let out = render(&global.output, &filters, &snapshot)?;
                    output::print_output(&out, global.quiet);
                }
            }
        }
    }

    if let Err(e) = coordinator.stop() {
        warn!(error = %e, "radio did not stop cleanly");
    }

    let result = match failure {
        Some(message) => Err(CliError::Radio { message }),
        None => {
            let snapshot = coordinator.hub().snapshot();
            let out = render(&global.output, &filters, &snapshot)?;
            output::print_output(&out, global.quiet);

            if !global.quiet {
                let stats = coordinator.hub().stats();
                eprintln!(
                    "{} device(s) published, {} publish(es), {} update(s) staged",
                    stats.cached, stats.published, stats.staged
                );
            }
            Ok(())
        }
    };

    coordinator.cleanup();
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use blescan_core::PairingState;
    use std::time::Duration;

    fn args(min_signal: Option<i16>, named: bool) -> ScanArgs {
        ScanArgs {
            duration: Duration::from_secs(1),
            track: Vec::new(),
            watch: false,
            min_signal,
            named,
        }
    }

    fn snapshot() -> DeviceSnapshot {
        Arc::new(vec![
            Arc::new(DeviceRecord::new("aa:01".into(), Some("Tag".into()), -40, PairingState::None)),
            Arc::new(DeviceRecord::new("aa:02".into(), None, -50, PairingState::None)),
            Arc::new(DeviceRecord::new("aa:03".into(), Some("Far".into()), -90, PairingState::None)),
        ])
    }

    #[test]
    fn view_filters_combine() {
        assert_eq!(visible(&view_filters(&args(None, false)), &snapshot()).len(), 3);
        assert_eq!(visible(&view_filters(&args(Some(-60), false)), &snapshot()).len(), 2);

        let both = visible(&view_filters(&args(Some(-60), true)), &snapshot());
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].identity.as_str(), "aa:01");
    }

    #[test]
    fn plain_output_lists_addresses() {
        let out = render(&OutputFormat::Plain, &[], &snapshot()).unwrap();
        assert_eq!(out, "aa:01\naa:02\naa:03");
    }
}
