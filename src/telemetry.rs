//! Telemetry records and process counters.
//!
//! Per-link records pair the geography read back from the hardware with a
//! fresh health snapshot; nothing is cached between polls. The process
//! counter pair keeps a running total plus an amount-since-last-poll that
//! resets to zero every time it is sampled.

use crate::control::types::{GeoTag, LinkHealth};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Telemetry for one link, labeled by its self-described geography.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LinkRecord {
    pub link_id: u32,
    pub geo: GeoTag,
    pub health: LinkHealth,
}

/// One telemetry poll over the whole module.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    /// Geography of the board itself.
    pub board: GeoTag,
    /// Links that answered this poll; links whose bus read failed are
    /// reported as warnings and omitted.
    pub links: Vec<LinkRecord>,
    /// Running total of transmitted UDP packets observed.
    pub total_amount: u64,
    /// Amount observed since the previous poll.
    pub amount_since_last_call: u64,
}

/// Process-wide counter pair.
#[derive(Debug, Default)]
pub struct Counters {
    total: AtomicU64,
    since_last: AtomicU64,
}

impl Counters {
    /// Adds `n` to both counters.
    pub fn record(&self, n: u64) {
        self.total.fetch_add(n, Ordering::Relaxed);
        self.since_last.fetch_add(n, Ordering::Relaxed);
    }

    /// Running total.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Amount since the previous call; resets itself to zero.
    #[must_use]
    pub fn take_since_last(&self) -> u64 {
        self.since_last.swap(0, Ordering::Relaxed)
    }
}
