//! In-memory register-file double of the transmit front-end.
//!
//! `MockBus` emulates the device at the register level: a flat register
//! file plus the three aliased banks behind the selection registers
//! (transmit mux, source buffer, UDP core). Writes and reads queue exactly
//! like the real bus and become visible in issue order at flush, with bank
//! resolution performed against the selection values in force *when each
//! queued operation applies* — a mis-ordered select shows up as a write
//! landing in the wrong bank, just as on hardware.
//!
//! Every issued operation is journaled as a [`BusOp`], so tests can assert
//! exact write/flush sequencing. The handle is cheaply cloneable and all
//! clones share one device, which lets a test keep a probe on a bus it has
//! already handed to a controller.

use crate::bus::{BusConnector, BusError, ReadHandle, RegisterBus};
use crate::regmap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One journaled bus operation, recorded in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    /// A queued register write.
    Write { path: String, value: u32 },
    /// A queued register read.
    Read { path: String },
    /// A dispatch of everything queued since the previous flush.
    Flush,
}

enum Queued {
    Write { path: String, value: u32 },
    Read { path: String, handle: ReadHandle },
}

struct Inner {
    regs: HashMap<String, u32>,
    queue: Vec<Queued>,
    journal: Vec<BusOp>,
    failures_armed: u32,
}

impl Inner {
    /// Resolves a dotted path to its storage key, applying the selection
    /// values currently latched in the register file.
    fn key_for(&self, path: &str) -> String {
        if path.starts_with(regmap::BUF_BANK_PREFIX) {
            let link = self.regs.get(regmap::TX_MUX_SEL).copied().unwrap_or(0);
            let buf = self
                .regs
                .get(&format!("mgt{link}.{}", regmap::MUX_SEL_BUF))
                .copied()
                .unwrap_or(0);
            format!("mgt{link}.buf{buf}.{path}")
        } else if path.starts_with(regmap::MUX_BANK_PREFIX) {
            let link = self.regs.get(regmap::TX_MUX_SEL).copied().unwrap_or(0);
            format!("mgt{link}.{path}")
        } else if path.starts_with(regmap::UDP_BANK_PREFIX) {
            let core = self.regs.get(regmap::UDP_CORE_SEL).copied().unwrap_or(0);
            format!("udp{core}.{path}")
        } else {
            path.to_string()
        }
    }

    fn apply(&mut self) {
        for op in std::mem::take(&mut self.queue) {
            match op {
                Queued::Write { path, value } => {
                    let key = self.key_for(&path);
                    self.regs.insert(key, value);
                }
                Queued::Read { path, handle } => {
                    let key = self.key_for(&path);
                    handle.resolve(self.regs.get(&key).copied().unwrap_or(0));
                }
            }
        }
    }
}

/// Handle to an emulated device; clones share the same register file.
#[derive(Clone)]
pub struct MockBus {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for MockBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MockBus")
            .field("registers", &inner.regs.len())
            .field("queued", &inner.queue.len())
            .finish()
    }
}

impl MockBus {
    /// Creates a device with `link_count` links and `source_count` input
    /// buffers, identification registers seeded so that attach succeeds.
    #[must_use]
    pub fn new(link_count: u32, source_count: u32) -> Self {
        let mut regs = HashMap::new();
        regs.insert(regmap::INFO_MAGIC.to_string(), regmap::IDENT_MAGIC);
        regs.insert(regmap::INFO_N_MGTS.to_string(), link_count);
        regs.insert(regmap::INFO_N_SRCS.to_string(), source_count);
        regs.insert(regmap::INFO_REF_FREQ.to_string(), 62_500_000);
        regs.insert(regmap::INFO_DESIGN.to_string(), 0x2);
        regs.insert(regmap::INFO_MAJOR.to_string(), 1);
        regs.insert(regmap::INFO_MINOR.to_string(), 3);
        regs.insert(regmap::INFO_PATCH.to_string(), 0);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                regs,
                queue: Vec::new(),
                journal: Vec::new(),
                failures_armed: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Overwrites a globally addressed register, bypassing the queue.
    pub fn poke(&self, path: &str, value: u32) {
        self.lock().regs.insert(path.to_string(), value);
    }

    /// Overwrites a register in `link`'s transmit-mux bank.
    pub fn poke_link(&self, link: u32, path: &str, value: u32) {
        self.lock().regs.insert(format!("mgt{link}.{path}"), value);
    }

    /// Overwrites a register in `core`'s UDP-core bank.
    pub fn poke_udp(&self, core: u32, path: &str, value: u32) {
        self.lock().regs.insert(format!("udp{core}.{path}"), value);
    }

    /// Reads back a globally addressed register, `None` if never written.
    #[must_use]
    pub fn peek(&self, path: &str) -> Option<u32> {
        self.lock().regs.get(path).copied()
    }

    /// Reads back a register from `link`'s transmit-mux bank.
    #[must_use]
    pub fn peek_link(&self, link: u32, path: &str) -> Option<u32> {
        self.lock().regs.get(&format!("mgt{link}.{path}")).copied()
    }

    /// Reads back a register from `core`'s UDP-core bank.
    #[must_use]
    pub fn peek_udp(&self, core: u32, path: &str) -> Option<u32> {
        self.lock().regs.get(&format!("udp{core}.{path}")).copied()
    }

    /// Reads back a register from buffer `buf` of `link`'s buffer bank.
    #[must_use]
    pub fn peek_buf(&self, link: u32, buf: u32, path: &str) -> Option<u32> {
        self.lock()
            .regs
            .get(&format!("mgt{link}.buf{buf}.{path}"))
            .copied()
    }

    /// Marks `link` healthy: all ready flags set, error flag clear.
    pub fn set_link_healthy(&self, link: u32) {
        self.poke_link(link, regmap::STAT_ERR, 0);
        self.poke_link(link, regmap::STAT_ETH_RDY, 1);
        self.poke_link(link, regmap::STAT_SRC_RDY, 1);
        self.poke_link(link, regmap::STAT_UDP_RDY, 1);
    }

    /// Arms the next `n` flushes to fail with a transport error. Queued
    /// operations are dropped by a failing flush, as on a dead transport.
    pub fn fail_flushes(&self, n: u32) {
        self.lock().failures_armed = n;
    }

    /// Snapshot of the operation journal.
    #[must_use]
    pub fn journal(&self) -> Vec<BusOp> {
        self.lock().journal.clone()
    }

    /// Number of journaled writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock()
            .journal
            .iter()
            .filter(|op| matches!(op, BusOp::Write { .. }))
            .count()
    }

    /// Clears the journal; the register file is untouched.
    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }
}

impl RegisterBus for MockBus {
    fn write(&mut self, path: &str, value: u32) {
        let mut inner = self.lock();
        inner.journal.push(BusOp::Write {
            path: path.to_string(),
            value,
        });
        inner.queue.push(Queued::Write {
            path: path.to_string(),
            value,
        });
    }

    fn read(&mut self, path: &str) -> ReadHandle {
        let mut inner = self.lock();
        inner.journal.push(BusOp::Read {
            path: path.to_string(),
        });
        let handle = ReadHandle::new();
        inner.queue.push(Queued::Read {
            path: path.to_string(),
            handle: handle.clone(),
        });
        handle
    }

    fn flush(&mut self) -> Result<(), BusError> {
        let mut inner = self.lock();
        inner.journal.push(BusOp::Flush);
        if inner.failures_armed > 0 {
            inner.failures_armed -= 1;
            inner.queue.clear();
            return Err(BusError::Transport("injected flush failure".into()));
        }
        inner.apply();
        Ok(())
    }
}

/// Connector over a fixed set of named mock devices.
#[derive(Default)]
pub struct MockConnector {
    devices: HashMap<String, MockBus>,
}

impl MockConnector {
    /// Creates an empty connector; [`connect`](BusConnector::connect) will
    /// report every descriptor unreachable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bus` under `descriptor` and returns the connector.
    #[must_use]
    pub fn with_device(mut self, descriptor: &str, bus: MockBus) -> Self {
        self.devices.insert(descriptor.to_string(), bus);
        self
    }
}

impl BusConnector for MockConnector {
    type Bus = MockBus;

    fn connect(&mut self, descriptor: &str) -> Result<MockBus, BusError> {
        self.devices
            .get(descriptor)
            .cloned()
            .ok_or_else(|| BusError::Unreachable(descriptor.to_string()))
    }
}
