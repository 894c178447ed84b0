//! Control plane for a multi-link Ethernet transmit front-end.
//!
//! The device streams detector data over several physical links, each with
//! its own network endpoint, geography tag and health counters. All per-link
//! state is reached through a single shared selection register, so only one
//! link's sub-registers are addressable at a time. This crate owns the
//! addressing, sequencing and validation logic around that window:
//!
//! - [`bus`] — the register-bus boundary: queued reads/writes, one visible
//!   transaction per flush, plus an in-memory device double for tests.
//! - [`control`] — the capability snapshot, the select-then-access critical
//!   section, and the per-link lifecycle controller.
//! - [`config`] / [`validate`] — the host configuration schema and the
//!   topology validator that gates every hardware mutation.
//! - [`module`] — the configure/start/stop orchestrator and telemetry pull.
//!
//! The bus transport itself (connection setup, wire encoding, retries) is
//! external; implement [`bus::RegisterBus`] and [`bus::BusConnector`] to
//! attach a real device.

pub mod bus;
pub mod config;
pub mod control;
pub mod module;
pub mod regmap;
pub mod telemetry;
pub mod validate;

#[doc(inline)]
pub use bus::{BusConnector, BusError, ReadHandle, RegisterBus};
#[doc(inline)]
pub use config::ModuleConf;
#[doc(inline)]
pub use control::{CoreController, CoreError, CoreInfo, EndpointConfig, GeoTag, LinkHealth, MacAddr};
#[doc(inline)]
pub use module::{LifecycleModule, ModuleError, Severity, TxModule};

// Re-export serde traits for convenience
pub use serde::{Deserialize, Serialize};
