//! Lifecycle orchestrator: configure, start, stop, telemetry.
//!
//! The host framework drives a module through [`LifecycleModule`] — an
//! explicit three-operation interface plus a telemetry pull, no
//! inheritance involved. [`TxModule`] implements it for one transmit
//! front-end: configuration attaches the device, validates the declared
//! topology against what the hardware reports, and only then mutates
//! registers; start and stop replay the set of links that configuration
//! accepted.

use crate::bus::{BusConnector, BusError};
use crate::config::ModuleConf;
use crate::control::controller::CoreController;
use crate::control::types::CoreError;
use crate::telemetry::{Counters, LinkRecord, TelemetrySnapshot};
use crate::validate::{validate_topology, ValidateError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Whether an error aborts the operation or is reported and survived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the in-progress lifecycle operation.
    Fatal,
    /// Reported at the poll boundary, never kills the owning process.
    Warning,
}

/// Errors escalated to the host framework.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// The device controller rejected an operation.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// The declared topology failed validation.
    #[error(transparent)]
    Validation(#[from] ValidateError),
    /// The connection descriptor did not produce a bus.
    #[error("cannot connect to device: {0}")]
    Connect(#[source] BusError),
    /// A telemetry read failed for one link.
    #[error("telemetry unavailable for link {link}: {source}")]
    TelemetryUnavailable {
        link: u32,
        #[source]
        source: CoreError,
    },
    /// Start or stop was requested before a successful configure.
    #[error("module is not configured")]
    NotConfigured,
}

impl ModuleError {
    /// Classification the host uses to decide between aborting and
    /// logging. Only telemetry failures are survivable.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::TelemetryUnavailable { .. } => Severity::Warning,
            _ => Severity::Fatal,
        }
    }
}

/// Host-facing lifecycle interface.
pub trait LifecycleModule {
    /// Applies the full configuration to the device. Re-drives the whole
    /// known-good sequence on every call.
    fn configure(&mut self) -> Result<(), ModuleError>;

    /// Enables every link accepted at configure time.
    fn start(&mut self) -> Result<(), ModuleError>;

    /// Disables every link accepted at configure time. The set is kept, so
    /// a later start without reconfiguration repeats it.
    fn stop(&mut self) -> Result<(), ModuleError>;

    /// Collects one telemetry snapshot. Per-link failures degrade to
    /// warnings; this never fails the caller.
    fn pull_telemetry(&mut self) -> TelemetrySnapshot;
}

/// Orchestrator for one transmit front-end.
pub struct TxModule<C: BusConnector> {
    conf: ModuleConf,
    connector: C,
    controller: Option<CoreController<C::Bus>>,
    /// Links accepted at configure time, ascending; consumed by start and
    /// stop, reset only by the next configure.
    enabled_links: Vec<u32>,
    counters: Counters,
    last_sent_total: u64,
}

impl<C: BusConnector> TxModule<C> {
    /// Creates an unconfigured module.
    #[must_use]
    pub fn new(conf: ModuleConf, connector: C) -> Self {
        Self {
            conf,
            connector,
            controller: None,
            enabled_links: Vec::new(),
            counters: Counters::default(),
            last_sent_total: 0,
        }
    }

    /// Links accepted by the last successful configure, ascending.
    #[must_use]
    pub fn enabled_links(&self) -> &[u32] {
        &self.enabled_links
    }

    /// The attached device controller, if configured.
    #[must_use]
    pub fn controller(&self) -> Option<&CoreController<C::Bus>> {
        self.controller.as_ref()
    }

    fn require_controller(&self) -> Result<&CoreController<C::Bus>, ModuleError> {
        self.controller.as_ref().ok_or(ModuleError::NotConfigured)
    }
}

impl<C: BusConnector> LifecycleModule for TxModule<C> {
    fn configure(&mut self) -> Result<(), ModuleError> {
        let bus = self
            .connector
            .connect(&self.conf.device)
            .map_err(ModuleError::Connect)?;
        let controller = CoreController::attach(bus)?;

        // Gate: no register write happens before the topology is proven
        // consistent with what the hardware reports.
        let validated = validate_topology(&self.conf, controller.info())?;

        // Known-good baseline: everything down, then a soft reset.
        for link in 0..controller.info().link_count {
            controller.set_link_enabled(link, false)?;
        }
        controller.reset(false)?;

        self.enabled_links.clear();
        for link in &validated {
            if !link.enabled {
                debug!(link = link.id, "administratively disabled, skipping");
                continue;
            }
            controller.configure_endpoint(link.id, &link.endpoint)?;
            controller.configure_geo_tag(link.id, link.geo)?;
            self.enabled_links.push(link.id);
        }

        info!(enabled = ?self.enabled_links, "module configured");
        self.controller = Some(controller);
        Ok(())
    }

    fn start(&mut self) -> Result<(), ModuleError> {
        let controller = self.require_controller()?;
        for &link in &self.enabled_links {
            controller.set_link_enabled(link, true)?;
        }
        // Second pass: a degraded link surfaces now, not at first data.
        for &link in &self.enabled_links {
            controller.read_health(link, true)?;
        }
        info!(links = ?self.enabled_links, "module started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ModuleError> {
        let controller = self.require_controller()?;
        for &link in &self.enabled_links {
            controller.set_link_enabled(link, false)?;
        }
        info!(links = ?self.enabled_links, "module stopped");
        Ok(())
    }

    fn pull_telemetry(&mut self) -> TelemetrySnapshot {
        let mut links = Vec::new();

        if let Some(controller) = &self.controller {
            if let Err(e) = controller.latch_counters() {
                warn!(error = %e, "counter latch failed");
            }
            for link in 0..controller.info().link_count {
                let record = controller
                    .read_geo_tag(link)
                    .and_then(|geo| {
                        controller.read_health(link, false).map(|health| LinkRecord {
                            link_id: link,
                            geo,
                            health,
                        })
                    })
                    .map_err(|source| ModuleError::TelemetryUnavailable { link, source });
                match record {
                    Ok(record) => links.push(record),
                    Err(e) => warn!(link, error = %e, "skipping link in this poll"),
                }
            }

            let sent_total: u64 = links.iter().map(|r| u64::from(r.health.sent.udp)).sum();
            let delta = sent_total.saturating_sub(self.last_sent_total);
            self.last_sent_total = sent_total;
            self.counters.record(delta);
        }

        TelemetrySnapshot {
            board: self.conf.geo_info,
            links,
            total_amount: self.counters.total(),
            amount_since_last_call: self.counters.take_since_last(),
        }
    }
}
