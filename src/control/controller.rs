//! Per-link lifecycle controller.
//!
//! Every operation opens one [`CoreScope`] for its whole select-then-access
//! sequence, so concurrent callers serialize at the bus lock and no two
//! operations can interleave their selection writes. Bounds checks run
//! before anything is queued: an invalid index never reaches the wire.

use crate::bus::RegisterBus;
use crate::control::info::CoreInfo;
use crate::control::selector::CoreScope;
use crate::control::types::{CoreError, EndpointConfig, GeoTag, LinkHealth, PacketCounters};
use crate::regmap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// Minimum hold for the reset bits. The hardware requires the pulse to be
/// held, not just toggled within one dispatch.
const RESET_PULSE: Duration = Duration::from_millis(1);

/// Controller for one attached transmit front-end.
///
/// Owns the register bus exclusively; the capability snapshot is read once
/// at attach and never refreshed.
pub struct CoreController<B: RegisterBus> {
    bus: Mutex<B>,
    info: CoreInfo,
}

impl<B: RegisterBus> CoreController<B> {
    /// Attaches to the device behind `bus`: checks the identification
    /// register and captures the capability snapshot.
    ///
    /// # Errors
    ///
    /// [`CoreError::IdentityMismatch`] for an incompatible device,
    /// [`CoreError::UnevenSourcePartition`] for inconsistent generics, or
    /// a bus error.
    pub fn attach(mut bus: B) -> Result<Self, CoreError> {
        let info = CoreInfo::read(&mut bus)?;
        info!(
            links = info.link_count,
            sources = info.source_count,
            version = %info.version,
            "attached transmit front-end"
        );
        Ok(Self {
            bus: Mutex::new(bus),
            info,
        })
    }

    /// The capability snapshot captured at attach.
    #[must_use]
    pub fn info(&self) -> &CoreInfo {
        &self.info
    }

    /// Opens a select-then-access critical section.
    fn scope(&self) -> CoreScope<'_, B> {
        // A poisoned lock only means another caller panicked mid-section;
        // the bus itself is still usable.
        let guard = self.bus.lock().unwrap_or_else(|e| e.into_inner());
        CoreScope::new(guard, &self.info)
    }

    /// Resets the device. With `nuke` the destructive global reset is
    /// pulsed first, then the soft reset; each bit is held for
    /// [`RESET_PULSE`] between the set and the clear.
    ///
    /// # Errors
    ///
    /// Propagates bus failures.
    pub fn reset(&self, nuke: bool) -> Result<(), CoreError> {
        let mut scope = self.scope();
        if nuke {
            info!("pulsing destructive reset");
            scope.write(regmap::CTRL_NUKE, 1);
            scope.flush()?;
            std::thread::sleep(RESET_PULSE);
            scope.write(regmap::CTRL_NUKE, 0);
            scope.flush()?;
        }
        debug!("pulsing soft reset");
        scope.write(regmap::CTRL_SOFT_RST, 1);
        scope.flush()?;
        std::thread::sleep(RESET_PULSE);
        scope.write(regmap::CTRL_SOFT_RST, 0);
        scope.flush()?;
        Ok(())
    }

    /// Drives `link` to Enabled or Disabled.
    ///
    /// The three sub-enables are written one flushed step at a time, in an
    /// order that is a hardware contract: enabling goes block, transmit,
    /// buffers; disabling runs the exact reverse. Callers only ever observe
    /// the two end states.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkDoesNotExist`] before any write, or a bus error.
    pub fn set_link_enabled(&self, link: u32, enabled: bool) -> Result<(), CoreError> {
        let mut scope = self.scope();
        scope.select_link(link)?;

        let steps: [&str; 3] = if enabled {
            [regmap::MUX_EN, regmap::MUX_TX_EN, regmap::MUX_EN_BUF]
        } else {
            [regmap::MUX_EN_BUF, regmap::MUX_TX_EN, regmap::MUX_EN]
        };
        for reg in steps {
            scope.write(reg, u32::from(enabled));
            scope.flush()?;
        }
        debug!(link, enabled, "link enable sequence complete");
        Ok(())
    }

    /// Writes `link`'s network endpoint pair into its UDP core as one
    /// flushed batch: MAC halves, IP addresses, ports and the filter word.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkDoesNotExist`] before any write, or a bus error.
    pub fn configure_endpoint(&self, link: u32, ep: &EndpointConfig) -> Result<(), CoreError> {
        let mut scope = self.scope();
        scope.select_udp_core(link)?;

        scope.write(regmap::UDP_SRC_MAC_LO, ep.source_mac.lower());
        scope.write(regmap::UDP_SRC_MAC_HI, ep.source_mac.upper());
        scope.write(regmap::UDP_SRC_IP, u32::from(ep.source_ip));
        scope.write(regmap::UDP_SRC_PORT, u32::from(ep.source_port));
        scope.write(regmap::UDP_DST_MAC_LO, ep.dest_mac.lower());
        scope.write(regmap::UDP_DST_MAC_HI, ep.dest_mac.upper());
        scope.write(regmap::UDP_DST_IP, u32::from(ep.dest_ip));
        scope.write(regmap::UDP_DST_PORT, u32::from(ep.dest_port));
        scope.write(regmap::UDP_FILTER, ep.filter_mask);
        scope.flush()?;

        info!(
            link,
            src_ip = %ep.source_ip,
            src_port = ep.source_port,
            dst_ip = %ep.dest_ip,
            dst_port = ep.dest_port,
            "endpoint configured"
        );
        Ok(())
    }

    /// Writes `link`'s detector-geography tag.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkDoesNotExist`] before any write, or a bus error.
    pub fn configure_geo_tag(&self, link: u32, geo: GeoTag) -> Result<(), CoreError> {
        let mut scope = self.scope();
        scope.select_link(link)?;
        scope.write(regmap::MUX_DETID, u32::from(geo.detector_id));
        scope.write(regmap::MUX_CRATE, u32::from(geo.crate_id));
        scope.write(regmap::MUX_SLOT, u32::from(geo.slot_id));
        scope.flush()?;
        Ok(())
    }

    /// Reads back `link`'s detector-geography tag.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkDoesNotExist`] before any access, or a bus error.
    pub fn read_geo_tag(&self, link: u32) -> Result<GeoTag, CoreError> {
        let mut scope = self.scope();
        scope.select_link(link)?;
        let detid = scope.read(regmap::MUX_DETID);
        let crate_ = scope.read(regmap::MUX_CRATE);
        let slot = scope.read(regmap::MUX_SLOT);
        scope.flush()?;
        Ok(GeoTag {
            detector_id: detid.get()? as u16,
            crate_id: crate_.get()? as u16,
            slot_id: slot.get()? as u16,
        })
    }

    /// Configures `link`'s synthetic traffic generators: the first
    /// `active_count` source slots run with `data_length` words per block
    /// at the `rate` reduction setting, the remaining slots are explicitly
    /// disabled. Slots beyond the link's capacity are never touched.
    ///
    /// The link's buffer enable is cleared while generators are
    /// reconfigured and restored to its prior value afterwards.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkDoesNotExist`] or
    /// [`CoreError::GeneratorCountExceeded`] before any write, or a bus
    /// error.
    pub fn configure_synthetic_source(
        &self,
        link: u32,
        active_count: u32,
        data_length: u16,
        rate: u16,
    ) -> Result<(), CoreError> {
        if active_count > self.info.sources_per_link {
            return Err(CoreError::GeneratorCountExceeded {
                requested: active_count,
                available: self.info.sources_per_link,
            });
        }
        let mut scope = self.scope();
        scope.select_link(link)?;

        let prior = scope.read(regmap::MUX_EN_BUF);
        scope.flush()?;
        let prior = prior.get()?;

        // Buffers must be down while generators are reconfigured.
        scope.write(regmap::MUX_EN_BUF, 0);
        scope.flush()?;

        for slot in 0..self.info.sources_per_link {
            scope.select_source_buffer(slot)?;
            let active = slot < active_count;
            scope.write(regmap::BUF_FAKE_EN, u32::from(active));
            if active {
                scope.write(regmap::BUF_DLEN, u32::from(data_length));
                scope.write(regmap::BUF_RATE_RDX, u32::from(rate));
            }
            scope.flush()?;
        }

        scope.write(regmap::MUX_EN_BUF, prior);
        scope.flush()?;
        debug!(link, active_count, "synthetic sources configured");
        Ok(())
    }

    /// Reads `link`'s health: error/ready flags and both packet counter
    /// banks, gathered in a single flush after the two selections.
    ///
    /// In `strict` mode a degraded link is an error instead of a return
    /// value.
    ///
    /// # Errors
    ///
    /// [`CoreError::LinkDoesNotExist`] before any access,
    /// [`CoreError::LinkInError`] in strict mode, or a bus error.
    pub fn read_health(&self, link: u32, strict: bool) -> Result<LinkHealth, CoreError> {
        let mut scope = self.scope();
        scope.select_link(link)?;
        scope.select_udp_core(link)?;

        let err = scope.read(regmap::STAT_ERR);
        let eth = scope.read(regmap::STAT_ETH_RDY);
        let src = scope.read(regmap::STAT_SRC_RDY);
        let udp = scope.read(regmap::STAT_UDP_RDY);
        let rx_arp = scope.read(regmap::RX_ARP_COUNT);
        let rx_ping = scope.read(regmap::RX_PING_COUNT);
        let rx_udp = scope.read(regmap::RX_UDP_COUNT);
        let tx_arp = scope.read(regmap::TX_ARP_COUNT);
        let tx_ping = scope.read(regmap::TX_PING_COUNT);
        let tx_udp = scope.read(regmap::TX_UDP_COUNT);
        scope.flush()?;

        let health = LinkHealth {
            err: err.get()? != 0,
            eth_ready: eth.get()? != 0,
            src_ready: src.get()? != 0,
            udp_ready: udp.get()? != 0,
            received: PacketCounters {
                arp: rx_arp.get()?,
                ping: rx_ping.get()?,
                udp: rx_udp.get()?,
            },
            sent: PacketCounters {
                arp: tx_arp.get()?,
                ping: tx_ping.get()?,
                udp: tx_udp.get()?,
            },
        };

        if strict && health.is_error() {
            return Err(CoreError::LinkInError {
                link,
                err: health.err,
                eth_ready: health.eth_ready,
                src_ready: health.src_ready,
                udp_ready: health.udp_ready,
            });
        }
        Ok(health)
    }

    /// Pulses the sampling latch so the packet counters are captured
    /// coherently before a stats read.
    ///
    /// # Errors
    ///
    /// Propagates bus failures.
    pub fn latch_counters(&self) -> Result<(), CoreError> {
        let mut scope = self.scope();
        scope.write(regmap::SAMP_LATCH, 1);
        scope.write(regmap::SAMP_LATCH, 0);
        scope.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{BusOp, MockBus};
    use crate::control::types::MacAddr;
    use std::net::Ipv4Addr;

    fn write(path: &str, value: u32) -> BusOp {
        BusOp::Write {
            path: path.into(),
            value,
        }
    }

    fn attach(links: u32, sources: u32) -> (CoreController<MockBus>, MockBus) {
        let probe = MockBus::new(links, sources);
        let controller = CoreController::attach(probe.clone()).unwrap();
        probe.clear_journal();
        (controller, probe)
    }

    #[test]
    fn enable_sequence_block_tx_buffer() {
        let (controller, probe) = attach(4, 16);
        controller.set_link_enabled(1, true).unwrap();

        assert_eq!(
            probe.journal(),
            vec![
                write(regmap::TX_MUX_SEL, 1),
                BusOp::Flush,
                write(regmap::MUX_EN, 1),
                BusOp::Flush,
                write(regmap::MUX_TX_EN, 1),
                BusOp::Flush,
                write(regmap::MUX_EN_BUF, 1),
                BusOp::Flush,
            ]
        );
    }

    #[test]
    fn disable_sequence_is_exact_reverse() {
        let (controller, probe) = attach(4, 16);
        controller.set_link_enabled(1, false).unwrap();

        assert_eq!(
            probe.journal(),
            vec![
                write(regmap::TX_MUX_SEL, 1),
                BusOp::Flush,
                write(regmap::MUX_EN_BUF, 0),
                BusOp::Flush,
                write(regmap::MUX_TX_EN, 0),
                BusOp::Flush,
                write(regmap::MUX_EN, 0),
                BusOp::Flush,
            ]
        );
    }

    #[test]
    fn out_of_range_link_issues_no_writes() {
        let (controller, probe) = attach(4, 16);

        assert_eq!(
            controller.set_link_enabled(4, true),
            Err(CoreError::LinkDoesNotExist(4))
        );
        assert_eq!(
            controller.configure_geo_tag(9, GeoTag::default()),
            Err(CoreError::LinkDoesNotExist(9))
        );
        assert_eq!(
            controller.read_health(4, false),
            Err(CoreError::LinkDoesNotExist(4))
        );
        assert_eq!(
            controller.read_geo_tag(100),
            Err(CoreError::LinkDoesNotExist(100))
        );
        let ep = EndpointConfig {
            source_mac: MacAddr::new(0),
            source_ip: Ipv4Addr::UNSPECIFIED,
            source_port: 0,
            dest_mac: MacAddr::new(0),
            dest_ip: Ipv4Addr::UNSPECIFIED,
            dest_port: 0,
            filter_mask: 0,
        };
        assert_eq!(
            controller.configure_endpoint(4, &ep),
            Err(CoreError::LinkDoesNotExist(4))
        );

        assert_eq!(probe.write_count(), 0);
    }

    #[test]
    fn reset_pulses_soft_only_by_default() {
        let (controller, probe) = attach(4, 16);
        controller.reset(false).unwrap();

        assert_eq!(
            probe.journal(),
            vec![
                write(regmap::CTRL_SOFT_RST, 1),
                BusOp::Flush,
                write(regmap::CTRL_SOFT_RST, 0),
                BusOp::Flush,
            ]
        );
    }

    #[test]
    fn nuke_reset_pulses_both_in_order() {
        let (controller, probe) = attach(4, 16);
        controller.reset(true).unwrap();

        assert_eq!(
            probe.journal(),
            vec![
                write(regmap::CTRL_NUKE, 1),
                BusOp::Flush,
                write(regmap::CTRL_NUKE, 0),
                BusOp::Flush,
                write(regmap::CTRL_SOFT_RST, 1),
                BusOp::Flush,
                write(regmap::CTRL_SOFT_RST, 0),
                BusOp::Flush,
            ]
        );
    }

    #[test]
    fn endpoint_lands_in_selected_udp_bank() {
        let (controller, probe) = attach(4, 16);
        let ep = EndpointConfig {
            source_mac: MacAddr::new(0x0201_0304_0506),
            source_ip: "10.73.139.23".parse().unwrap(),
            source_port: 0x4444,
            dest_mac: MacAddr::new(0xaabb_ccdd_eeff),
            dest_ip: "10.73.139.99".parse().unwrap(),
            dest_port: 0x5555,
            filter_mask: 0x0740_0307,
        };
        controller.configure_endpoint(2, &ep).unwrap();

        assert_eq!(probe.peek_udp(2, regmap::UDP_SRC_MAC_LO), Some(0x0304_0506));
        assert_eq!(probe.peek_udp(2, regmap::UDP_SRC_MAC_HI), Some(0x0201));
        assert_eq!(probe.peek_udp(2, regmap::UDP_SRC_IP), Some(0x0a49_8b17));
        assert_eq!(probe.peek_udp(2, regmap::UDP_DST_MAC_LO), Some(0xccdd_eeff));
        assert_eq!(probe.peek_udp(2, regmap::UDP_DST_MAC_HI), Some(0xaabb));
        assert_eq!(probe.peek_udp(2, regmap::UDP_DST_PORT), Some(0x5555));
        assert_eq!(probe.peek_udp(2, regmap::UDP_FILTER), Some(0x0740_0307));
        // Nothing leaked into another core's bank.
        assert_eq!(probe.peek_udp(0, regmap::UDP_SRC_IP), None);

        // The whole batch rode a single flush after the selection flush.
        let flushes = probe
            .journal()
            .iter()
            .filter(|op| matches!(op, BusOp::Flush))
            .count();
        assert_eq!(flushes, 2);
    }

    #[test]
    fn geo_tag_roundtrip_isolated_per_link() {
        let (controller, _probe) = attach(4, 16);
        let geo2 = GeoTag {
            detector_id: 3,
            crate_id: 21,
            slot_id: 2,
        };
        let geo3 = GeoTag {
            detector_id: 3,
            crate_id: 21,
            slot_id: 7,
        };
        controller.configure_geo_tag(2, geo2).unwrap();
        controller.configure_geo_tag(3, geo3).unwrap();

        assert_eq!(controller.read_geo_tag(2).unwrap(), geo2);
        assert_eq!(controller.read_geo_tag(3).unwrap(), geo3);
    }

    #[test]
    fn synthetic_sources_enable_first_n_and_restore_buffers() {
        let (controller, probe) = attach(4, 16);
        // Link 1 had its buffers enabled before reconfiguration.
        probe.poke_link(1, regmap::MUX_EN_BUF, 1);

        controller.configure_synthetic_source(1, 2, 0x383, 0xa).unwrap();

        for slot in 0..4 {
            let expect = u32::from(slot < 2);
            assert_eq!(
                probe.peek_buf(1, slot, regmap::BUF_FAKE_EN),
                Some(expect),
                "slot {slot}"
            );
        }
        assert_eq!(probe.peek_buf(1, 0, regmap::BUF_DLEN), Some(0x383));
        assert_eq!(probe.peek_buf(1, 1, regmap::BUF_RATE_RDX), Some(0xa));
        // Disabled slots got no length/rate writes.
        assert_eq!(probe.peek_buf(1, 2, regmap::BUF_DLEN), None);
        // Buffer enable restored to its prior value.
        assert_eq!(probe.peek_link(1, regmap::MUX_EN_BUF), Some(1));
        // Slots beyond sources_per_link untouched.
        assert_eq!(probe.peek_buf(1, 4, regmap::BUF_FAKE_EN), None);
    }

    #[test]
    fn synthetic_sources_reject_excess_count() {
        let (controller, probe) = attach(4, 16);
        assert_eq!(
            controller.configure_synthetic_source(0, 5, 0x383, 0xa),
            Err(CoreError::GeneratorCountExceeded {
                requested: 5,
                available: 4
            })
        );
        assert_eq!(probe.write_count(), 0);
    }

    #[test]
    fn health_read_derives_error_flag() {
        let (controller, probe) = attach(4, 16);
        probe.set_link_healthy(0);
        probe.poke_udp(0, regmap::TX_UDP_COUNT, 1234);

        let health = controller.read_health(0, false).unwrap();
        assert!(!health.is_error());
        assert_eq!(health.sent.udp, 1234);

        // Drop one ready flag: non-strict still returns, strict raises.
        probe.poke_link(0, regmap::STAT_SRC_RDY, 0);
        let health = controller.read_health(0, false).unwrap();
        assert!(health.is_error());

        assert_eq!(
            controller.read_health(0, true),
            Err(CoreError::LinkInError {
                link: 0,
                err: false,
                eth_ready: true,
                src_ready: false,
                udp_ready: true,
            })
        );
    }

    #[test]
    fn health_read_uses_single_data_flush() {
        let (controller, probe) = attach(4, 16);
        probe.set_link_healthy(3);
        controller.read_health(3, true).unwrap();

        // Two selection flushes then exactly one carrying all ten reads.
        let flushes = probe
            .journal()
            .iter()
            .filter(|op| matches!(op, BusOp::Flush))
            .count();
        assert_eq!(flushes, 3);
    }
}
