//! Locked select-then-access scope over the shared selection registers.
//!
//! Per-link registers are physically aliased: one index register decides
//! which link's bank is visible, so a select and its dependent accesses
//! form a critical section. [`CoreScope`] holds the bus lock for the whole
//! section; it is created per logical operation and dropped only after the
//! dependent flushes, which keeps two operations from interleaving their
//! selects. The hardware has no transactional memory — a second select
//! issued before the first access lands would silently redirect it.

use crate::bus::{BusError, ReadHandle, RegisterBus};
use crate::control::info::CoreInfo;
use crate::control::types::CoreError;
use crate::regmap;
use std::sync::MutexGuard;

/// Exclusive access to the register bus for one select-then-access
/// sequence.
///
/// Selection writes are flushed before the method returns, so dependent
/// accesses queued afterwards are guaranteed to land on the selected bank.
pub struct CoreScope<'a, B: RegisterBus> {
    bus: MutexGuard<'a, B>,
    info: &'a CoreInfo,
}

impl<'a, B: RegisterBus> CoreScope<'a, B> {
    pub(crate) fn new(bus: MutexGuard<'a, B>, info: &'a CoreInfo) -> Self {
        Self { bus, info }
    }

    /// Points the transmit-mux bank at `link` and flushes the selection.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkDoesNotExist`] before any register write when
    /// `link` is outside the hardware's range.
    pub fn select_link(&mut self, link: u32) -> Result<(), CoreError> {
        if link >= self.info.link_count {
            return Err(CoreError::LinkDoesNotExist(link));
        }
        self.bus.write(regmap::TX_MUX_SEL, link);
        self.bus.flush()?;
        Ok(())
    }

    /// Points the source-buffer bank of the selected link at `buffer` and
    /// flushes the selection.
    ///
    /// # Errors
    ///
    /// [`CoreError::SourceBufferDoesNotExist`] before any register write
    /// when `buffer` is outside the hardware's range.
    pub fn select_source_buffer(&mut self, buffer: u32) -> Result<(), CoreError> {
        if buffer >= self.info.source_count {
            return Err(CoreError::SourceBufferDoesNotExist(buffer));
        }
        self.bus.write(regmap::MUX_SEL_BUF, buffer);
        self.bus.flush()?;
        Ok(())
    }

    /// Points the UDP-core bank at `core` and flushes the selection.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkDoesNotExist`] before any register write when
    /// `core` is outside the hardware's range (one UDP core per link).
    pub fn select_udp_core(&mut self, core: u32) -> Result<(), CoreError> {
        if core >= self.info.link_count {
            return Err(CoreError::LinkDoesNotExist(core));
        }
        self.bus.write(regmap::UDP_CORE_SEL, core);
        self.bus.flush()?;
        Ok(())
    }

    /// Queues a write within the current selection.
    pub fn write(&mut self, path: &str, value: u32) {
        self.bus.write(path, value);
    }

    /// Queues a read within the current selection.
    pub fn read(&mut self, path: &str) -> ReadHandle {
        self.bus.read(path)
    }

    /// Dispatches everything queued in this scope.
    ///
    /// # Errors
    ///
    /// Propagates the transport's failure.
    pub fn flush(&mut self) -> Result<(), BusError> {
        self.bus.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{BusOp, MockBus};
    use std::sync::Mutex;

    fn info(links: u32, sources: u32) -> CoreInfo {
        CoreInfo {
            version: crate::control::info::Version {
                design: 2,
                major: 1,
                minor: 0,
                patch: 0,
            },
            link_count: links,
            source_count: sources,
            sources_per_link: sources / links,
            ref_freq: 62_500_000,
        }
    }

    #[test]
    fn select_link_flushes_before_returning() {
        let probe = MockBus::new(4, 16);
        let bus = Mutex::new(probe.clone());
        let info = info(4, 16);
        let mut scope = CoreScope::new(bus.lock().unwrap(), &info);

        scope.select_link(2).unwrap();
        assert_eq!(
            probe.journal(),
            vec![
                BusOp::Write {
                    path: regmap::TX_MUX_SEL.into(),
                    value: 2
                },
                BusOp::Flush,
            ]
        );
    }

    #[test]
    fn out_of_range_selects_issue_nothing() {
        let probe = MockBus::new(4, 16);
        let bus = Mutex::new(probe.clone());
        let info = info(4, 16);
        let mut scope = CoreScope::new(bus.lock().unwrap(), &info);

        assert_eq!(scope.select_link(4), Err(CoreError::LinkDoesNotExist(4)));
        assert_eq!(
            scope.select_source_buffer(16),
            Err(CoreError::SourceBufferDoesNotExist(16))
        );
        assert_eq!(scope.select_udp_core(7), Err(CoreError::LinkDoesNotExist(7)));
        assert!(probe.journal().is_empty());
    }
}
