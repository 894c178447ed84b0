//! Device control: capability snapshot, link selection and lifecycle.
//!
//! Layered bottom-up: [`types`] holds the encoded data model (MAC words,
//! endpoint, geo tag, health), [`info`] reads the immutable capability
//! snapshot at attach, [`selector`] provides the locked select-then-access
//! critical section over the shared selection registers, and
//! [`controller`] sequences every per-link operation on top of it.

pub mod controller;
pub mod info;
pub mod selector;
pub mod types;

pub use controller::CoreController;
pub use info::{CoreInfo, Version};
pub use selector::CoreScope;
pub use types::{
    CoreError, EndpointConfig, GeoTag, LinkHealth, MacAddr, PacketCounters,
};
