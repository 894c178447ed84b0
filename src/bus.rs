//! Register-bus boundary.
//!
//! The hardware is reached over a synchronous request/response register bus
//! with batched dispatch: reads and writes queue up locally and nothing is
//! visible to the device until [`RegisterBus::flush`] runs the whole batch
//! as one bus transaction. Reads return a [`ReadHandle`] that resolves at
//! the flush which carried them.
//!
//! The transport itself (connection setup, wire encoding, retries and
//! timeouts) lives outside this crate; implement [`RegisterBus`] on top of
//! it and hand a [`BusConnector`] to the orchestrator. [`mock`] provides an
//! in-memory register-file implementation for tests.

pub mod mock;

use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Errors surfaced at the register-bus boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The register path is not present in the device's address table.
    #[error("no such register: {0}")]
    NoSuchRegister(String),
    /// The connection descriptor does not resolve to a reachable device.
    #[error("device {0} is unreachable")]
    Unreachable(String),
    /// The transport failed mid-transaction.
    #[error("bus transport failure: {0}")]
    Transport(String),
    /// A read handle was consumed before the flush that carries it.
    #[error("read handle used before flush")]
    Unresolved,
}

/// Deferred result of a queued register read.
///
/// The value becomes available once the bus flush that carried the read has
/// completed; [`get`](Self::get) before that point is a [`BusError::Unresolved`].
#[derive(Debug, Clone)]
pub struct ReadHandle(Arc<OnceLock<u32>>);

impl ReadHandle {
    /// Creates an unresolved handle. Bus implementations hold a clone and
    /// call [`resolve`](Self::resolve) during flush.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(OnceLock::new()))
    }

    /// Fills in the value read from hardware. Later calls are ignored; a
    /// handle resolves exactly once.
    pub fn resolve(&self, value: u32) {
        let _ = self.0.set(value);
    }

    /// Returns the value carried by the flush, or [`BusError::Unresolved`]
    /// if no flush has run since the read was queued.
    pub fn get(&self) -> Result<u32, BusError> {
        self.0.get().copied().ok_or(BusError::Unresolved)
    }
}

impl Default for ReadHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A queued register bus to one device.
///
/// `write` and `read` only enqueue; `flush` performs every queued operation
/// in issue order as a single bus transaction and resolves the pending read
/// handles. Implementations are driven from behind a lock (see
/// [`crate::control::CoreScope`]), so they need not be internally
/// synchronized, but must be `Send` so a controller can move between
/// threads.
pub trait RegisterBus: Send {
    /// Queues a write of `value` to the register at `path`.
    fn write(&mut self, path: &str, value: u32);

    /// Queues a read of the register at `path`.
    fn read(&mut self, path: &str) -> ReadHandle;

    /// Dispatches all queued operations and resolves their read handles.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the transaction fails; queued
    /// operations are dropped and their handles stay unresolved.
    fn flush(&mut self) -> Result<(), BusError>;
}

/// Maps a configuration connection descriptor to a live register bus.
///
/// Strategy seam for the host: production code plugs the real transport in
/// here, tests plug in [`mock::MockConnector`].
pub trait BusConnector {
    /// Bus type produced by this connector.
    type Bus: RegisterBus;

    /// Opens a bus to the device named by `descriptor`.
    ///
    /// # Errors
    ///
    /// [`BusError::Unreachable`] if the descriptor does not resolve to a
    /// device this connector knows about.
    fn connect(&mut self, descriptor: &str) -> Result<Self::Bus, BusError>;
}
