//! Register address book for the transmit front-end.
//!
//! Registers are named by dotted paths resolved by the bus transport.
//! Three banks are aliased behind selection registers: the transmit-mux
//! bank (`tx_path.tx_mux.*`, selected by [`TX_MUX_SEL`]), the source-buffer
//! bank within the selected mux (`tx_path.tx_mux.buf.*`, selected by
//! [`MUX_SEL_BUF`]) and the UDP-core bank
//! (`tx_path.udp_core.udp_core_control.*`, selected by [`UDP_CORE_SEL`]).
//! Everything else is globally addressable.

/// Value the identification register must hold for a compatible device.
pub const IDENT_MAGIC: u32 = 0xdead_beef;

// Identification block (read-only)
pub const INFO_MAGIC: &str = "info.magic";
pub const INFO_DESIGN: &str = "info.versions.design";
pub const INFO_MAJOR: &str = "info.versions.major";
pub const INFO_MINOR: &str = "info.versions.minor";
pub const INFO_PATCH: &str = "info.versions.patch";
pub const INFO_N_MGTS: &str = "info.generics.n_mgts";
pub const INFO_N_SRCS: &str = "info.generics.n_srcs";
pub const INFO_REF_FREQ: &str = "info.generics.ref_freq";

// Global control
pub const CTRL_NUKE: &str = "csr.ctrl.nuke"; // [0] destructive reset, pulse
pub const CTRL_SOFT_RST: &str = "csr.ctrl.soft_rst"; // [0] soft reset, pulse
pub const SAMP_LATCH: &str = "samp.ctrl.samp"; // [0] latch packet counters

// Selection registers
pub const TX_MUX_SEL: &str = "tx_path.csr_tx_mux.ctrl.tx_mux_sel";
pub const UDP_CORE_SEL: &str = "tx_path.csr_udp_core.ctrl.udp_core_sel";
pub const MUX_SEL_BUF: &str = "tx_path.tx_mux.csr.ctrl.sel_buf";

// Transmit-mux bank (selected by TX_MUX_SEL)
pub const MUX_EN: &str = "tx_path.tx_mux.csr.ctrl.en"; // [0] block enable
pub const MUX_TX_EN: &str = "tx_path.tx_mux.csr.ctrl.tx_en"; // [0] transmit enable
pub const MUX_EN_BUF: &str = "tx_path.tx_mux.csr.ctrl.en_buf"; // [0] input buffer enable
pub const STAT_ERR: &str = "tx_path.tx_mux.csr.stat.err";
pub const STAT_ETH_RDY: &str = "tx_path.tx_mux.csr.stat.eth_rdy";
pub const STAT_SRC_RDY: &str = "tx_path.tx_mux.csr.stat.src_rdy";
pub const STAT_UDP_RDY: &str = "tx_path.tx_mux.csr.stat.udp_rdy";
pub const MUX_DETID: &str = "tx_path.tx_mux.mux.ctrl.detid"; // [5:0]
pub const MUX_CRATE: &str = "tx_path.tx_mux.mux.ctrl.crate"; // [9:0]
pub const MUX_SLOT: &str = "tx_path.tx_mux.mux.ctrl.slot"; // [3:0]

// Source-buffer bank (selected by TX_MUX_SEL + MUX_SEL_BUF)
pub const BUF_FAKE_EN: &str = "tx_path.tx_mux.buf.ctrl.fake_en"; // [0] synthetic generator
pub const BUF_DLEN: &str = "tx_path.tx_mux.buf.ctrl.dlen"; // [11:0] words per block
pub const BUF_RATE_RDX: &str = "tx_path.tx_mux.buf.ctrl.rate_rdx"; // [5:0] rate reduction exponent

// UDP-core bank (selected by UDP_CORE_SEL)
pub const UDP_SRC_IP: &str = "tx_path.udp_core.udp_core_control.src_addr_ctrl.src_ip_addr";
pub const UDP_SRC_MAC_LO: &str = "tx_path.udp_core.udp_core_control.src_addr_ctrl.src_mac_addr_lower";
pub const UDP_SRC_MAC_HI: &str = "tx_path.udp_core.udp_core_control.src_addr_ctrl.src_mac_addr_upper";
pub const UDP_SRC_PORT: &str = "tx_path.udp_core.udp_core_control.src_addr_ctrl.src_port";
pub const UDP_DST_IP: &str = "tx_path.udp_core.udp_core_control.ctrl.dst_ip_addr";
pub const UDP_DST_MAC_LO: &str = "tx_path.udp_core.udp_core_control.ctrl.dst_mac_addr_lower";
pub const UDP_DST_MAC_HI: &str = "tx_path.udp_core.udp_core_control.ctrl.dst_mac_addr_upper";
pub const UDP_DST_PORT: &str = "tx_path.udp_core.udp_core_control.ctrl.dst_port";
pub const UDP_FILTER: &str = "tx_path.udp_core.udp_core_control.ctrl.filter_control";
pub const RX_ARP_COUNT: &str = "tx_path.udp_core.udp_core_control.rx_packet_counters.arp_count";
pub const RX_PING_COUNT: &str = "tx_path.udp_core.udp_core_control.rx_packet_counters.ping_count";
pub const RX_UDP_COUNT: &str = "tx_path.udp_core.udp_core_control.rx_packet_counters.udp_count";
pub const TX_ARP_COUNT: &str = "tx_path.udp_core.udp_core_control.tx_packet_counters.arp_count";
pub const TX_PING_COUNT: &str = "tx_path.udp_core.udp_core_control.tx_packet_counters.ping_count";
pub const TX_UDP_COUNT: &str = "tx_path.udp_core.udp_core_control.tx_packet_counters.udp_count";

/// Prefix of every register aliased behind [`TX_MUX_SEL`].
pub const MUX_BANK_PREFIX: &str = "tx_path.tx_mux.";
/// Prefix of every register aliased behind [`TX_MUX_SEL`] + [`MUX_SEL_BUF`].
pub const BUF_BANK_PREFIX: &str = "tx_path.tx_mux.buf.";
/// Prefix of every register aliased behind [`UDP_CORE_SEL`].
pub const UDP_BANK_PREFIX: &str = "tx_path.udp_core.udp_core_control.";
