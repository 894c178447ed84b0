//! Host-framework configuration schema.
//!
//! The host delivers module configuration as JSON. The schema mirrors what
//! the operator declares: a connection descriptor for the device, a default
//! UDP port, the board's own geography, and one entry per link with its
//! endpoint pair and the detector streams it carries. Nothing here touches
//! hardware; [`crate::validate`] turns a `ModuleConf` into encoded register
//! values after checking it against the capability snapshot.

use crate::control::types::GeoTag;
use serde::{Deserialize, Serialize};

/// Packet filter word the firmware ships with (ARP + ICMP + UDP accept).
pub const DEFAULT_FILTER_CONTROL: u32 = 0x0740_0307;

/// Complete configuration for one transmit front-end module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConf {
    /// Connection descriptor resolved by the bus connector.
    pub device: String,
    /// Default UDP port for links that do not declare their own.
    pub port: u16,
    /// Geography of the board itself, used to label process telemetry.
    pub geo_info: GeoTag,
    /// One entry per physical link.
    pub links: Vec<LinkConf>,
}

impl ModuleConf {
    /// Parses a configuration from the host's JSON payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying decode error on schema mismatch.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Operator-declared configuration of one link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConf {
    /// Link index as cabled on the board.
    pub id: u32,
    /// Administratively disabled links are validated but never configured
    /// or started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Transmitting side of the link.
    pub source_endpoint: EndpointConf,
    /// Receiving host the link streams to.
    pub destination_endpoint: EndpointConf,
    /// Detector streams feeding this link, possibly grouped.
    #[serde(default)]
    pub sources: Vec<SourceResource>,
}

impl LinkConf {
    /// First concrete detector stream carried by this link, searching one
    /// level deep inside grouping resources.
    #[must_use]
    pub fn first_stream(&self) -> Option<&DetectorStream> {
        for resource in &self.sources {
            match resource {
                SourceResource::Stream(stream) => return Some(stream),
                SourceResource::Group { contains } => {
                    for nested in contains {
                        if let SourceResource::Stream(stream) = nested {
                            return Some(stream);
                        }
                    }
                }
            }
        }
        None
    }
}

/// One side of a link's network path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConf {
    /// Hardware address in `aa:bb:cc:dd:ee:ff` notation.
    pub mac: String,
    /// Candidate IPv4 addresses; exactly one must be declared.
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    /// UDP port override; the module default applies when absent.
    #[serde(default)]
    pub port: Option<u16>,
    /// Packet filter override for the UDP core.
    #[serde(default)]
    pub filter_control: Option<u32>,
}

/// A detector stream or a grouping of them, as the operator's resource
/// model nests them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceResource {
    /// A concrete detector stream.
    Stream(DetectorStream),
    /// A grouping construct containing streams.
    Group { contains: Vec<SourceResource> },
}

/// A concrete detector data stream and its geography.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorStream {
    pub source_id: u32,
    pub geo: GeoTag,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        r#"{
            "device": "flx-tx-0",
            "port": 17476,
            "geo_info": { "detector_id": 3, "crate_id": 21, "slot_id": 0 },
            "links": [
                {
                    "id": 0,
                    "source_endpoint": {
                        "mac": "00:11:22:33:44:55",
                        "ip_addresses": ["10.73.139.23"]
                    },
                    "destination_endpoint": {
                        "mac": "aa:bb:cc:dd:ee:ff",
                        "ip_addresses": ["10.73.139.99"],
                        "port": 21844
                    },
                    "sources": [
                        { "type": "stream", "source_id": 7,
                          "geo": { "detector_id": 3, "crate_id": 21, "slot_id": 4 } }
                    ]
                },
                {
                    "id": 1,
                    "enabled": false,
                    "source_endpoint": { "mac": "00:11:22:33:44:56", "ip_addresses": [] },
                    "destination_endpoint": { "mac": "aa:bb:cc:dd:ee:00", "ip_addresses": [] },
                    "sources": [
                        { "type": "group", "contains": [
                            { "type": "stream", "source_id": 9,
                              "geo": { "detector_id": 3, "crate_id": 21, "slot_id": 5 } }
                        ] }
                    ]
                }
            ]
        }"#
    }

    #[test]
    fn parses_host_json() {
        let conf = ModuleConf::from_json(sample()).unwrap();
        assert_eq!(conf.device, "flx-tx-0");
        assert_eq!(conf.links.len(), 2);
        assert!(conf.links[0].enabled, "enabled defaults to true");
        assert!(!conf.links[1].enabled);
        assert_eq!(conf.links[0].destination_endpoint.port, Some(21844));
        assert_eq!(conf.links[0].source_endpoint.port, None);
    }

    #[test]
    fn first_stream_resolves_direct_and_grouped() {
        let conf = ModuleConf::from_json(sample()).unwrap();
        assert_eq!(conf.links[0].first_stream().unwrap().source_id, 7);
        assert_eq!(conf.links[1].first_stream().unwrap().source_id, 9);
        assert_eq!(conf.links[1].first_stream().unwrap().geo.slot_id, 5);
    }

    #[test]
    fn missing_stream_is_none() {
        let link = LinkConf {
            id: 0,
            enabled: true,
            source_endpoint: EndpointConf {
                mac: "00:11:22:33:44:55".into(),
                ip_addresses: vec![],
                port: None,
                filter_control: None,
            },
            destination_endpoint: EndpointConf {
                mac: "aa:bb:cc:dd:ee:ff".into(),
                ip_addresses: vec![],
                port: None,
                filter_control: None,
            },
            sources: vec![SourceResource::Group { contains: vec![] }],
        };
        assert!(link.first_stream().is_none());
    }

    #[test]
    fn roundtrips_through_json() {
        let conf = ModuleConf::from_json(sample()).unwrap();
        let encoded = serde_json::to_string(&conf).unwrap();
        let again = ModuleConf::from_json(&encoded).unwrap();
        assert_eq!(again.links.len(), conf.links.len());
        assert_eq!(again.geo_info, conf.geo_info);
    }
}
