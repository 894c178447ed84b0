//! Link topology validator.
//!
//! Runs once per configuration cycle, after the capability snapshot is
//! read and before the first register write. The checks run in a fixed
//! order and the first failure aborts, so a rejected configuration leaves
//! the hardware exactly as it was found.
//!
//! Check order: link count against firmware, duplicate ids, dense id
//! coverage, endpoint address resolution, detector stream resolution.

use crate::config::{LinkConf, ModuleConf, DEFAULT_FILTER_CONTROL};
use crate::control::info::CoreInfo;
use crate::control::types::{EndpointConfig, GeoTag, MacAddr};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Which side of a link an endpoint error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSide {
    Source,
    Destination,
}

impl std::fmt::Display for EndpointSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// A configuration rejected before any hardware mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidateError {
    /// The operator declared a different number of links than the firmware
    /// instantiates.
    #[error("configuration declares {configured} links but firmware has {firmware}")]
    LinkCountMismatch { configured: usize, firmware: u32 },
    /// Two or more link entries share an id.
    #[error("duplicated link ids: {configured} links declared, only {unique} unique ids")]
    DuplicatedLinkIds { configured: usize, unique: usize },
    /// The id set does not densely cover the firmware's link range.
    #[error("last link id {last} does not match expected {expected}")]
    LinkIdGap { last: u32, expected: u32 },
    /// An endpoint declares zero or several candidate addresses where
    /// exactly one is required.
    #[error("link {link} {side} endpoint declares {found} ip addresses, expected 1")]
    AmbiguousIpAddress {
        link: u32,
        side: EndpointSide,
        found: usize,
    },
    /// An endpoint's hardware address does not parse.
    #[error("link {link} {side} endpoint mac {mac:?} is invalid")]
    InvalidMacAddress {
        link: u32,
        side: EndpointSide,
        mac: String,
    },
    /// An endpoint's candidate address does not parse as IPv4.
    #[error("link {link} {side} endpoint address {addr:?} is invalid")]
    InvalidIpAddress {
        link: u32,
        side: EndpointSide,
        addr: String,
    },
    /// A link carries no resolvable detector stream.
    #[error("link {link} configuration does not contain a detector stream")]
    InvalidSourceStream { link: u32 },
}

/// One link that passed validation: encoded endpoint, resolved geography,
/// and the operator's administrative enable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLink {
    pub id: u32,
    pub enabled: bool,
    pub endpoint: EndpointConfig,
    pub geo: GeoTag,
}

/// Validates the operator's topology against the capability snapshot.
///
/// Returns the validated links in ascending id order; nothing has touched
/// the hardware when this returns, on either path.
///
/// # Errors
///
/// The specific [`ValidateError`] for the first check that fails.
pub fn validate_topology(
    conf: &ModuleConf,
    info: &CoreInfo,
) -> Result<Vec<ValidatedLink>, ValidateError> {
    if conf.links.len() != info.link_count as usize {
        return Err(ValidateError::LinkCountMismatch {
            configured: conf.links.len(),
            firmware: info.link_count,
        });
    }

    if conf.links.is_empty() {
        return Ok(Vec::new());
    }

    let ids: BTreeSet<u32> = conf.links.iter().map(|l| l.id).collect();
    if ids.len() != conf.links.len() {
        return Err(ValidateError::DuplicatedLinkIds {
            configured: conf.links.len(),
            unique: ids.len(),
        });
    }

    // With the two checks above, max id == link_count - 1 is equivalent to
    // dense coverage of [0, link_count).
    let last = ids.iter().next_back().copied().unwrap_or(0);
    if last != info.link_count - 1 {
        return Err(ValidateError::LinkIdGap {
            last,
            expected: info.link_count - 1,
        });
    }

    let mut validated = Vec::with_capacity(conf.links.len());
    for link in &conf.links {
        let (src_mac, src_ip) = resolve_endpoint(link, EndpointSide::Source)?;
        let (dst_mac, dst_ip) = resolve_endpoint(link, EndpointSide::Destination)?;

        let stream = link
            .first_stream()
            .ok_or(ValidateError::InvalidSourceStream { link: link.id })?;

        validated.push(ValidatedLink {
            id: link.id,
            enabled: link.enabled,
            endpoint: EndpointConfig {
                source_mac: src_mac,
                source_ip: src_ip,
                source_port: link.source_endpoint.port.unwrap_or(conf.port),
                dest_mac: dst_mac,
                dest_ip: dst_ip,
                dest_port: link.destination_endpoint.port.unwrap_or(conf.port),
                filter_mask: link
                    .destination_endpoint
                    .filter_control
                    .unwrap_or(DEFAULT_FILTER_CONTROL),
            },
            geo: stream.geo,
        });
    }

    validated.sort_by_key(|l| l.id);
    Ok(validated)
}

fn resolve_endpoint(
    link: &LinkConf,
    side: EndpointSide,
) -> Result<(MacAddr, Ipv4Addr), ValidateError> {
    let endpoint = match side {
        EndpointSide::Source => &link.source_endpoint,
        EndpointSide::Destination => &link.destination_endpoint,
    };

    if endpoint.ip_addresses.len() != 1 {
        return Err(ValidateError::AmbiguousIpAddress {
            link: link.id,
            side,
            found: endpoint.ip_addresses.len(),
        });
    }

    let mac: MacAddr = endpoint
        .mac
        .parse()
        .map_err(|_| ValidateError::InvalidMacAddress {
            link: link.id,
            side,
            mac: endpoint.mac.clone(),
        })?;

    let addr = &endpoint.ip_addresses[0];
    let ip: Ipv4Addr = addr.parse().map_err(|_| ValidateError::InvalidIpAddress {
        link: link.id,
        side,
        addr: addr.clone(),
    })?;

    Ok((mac, ip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectorStream, EndpointConf, SourceResource};
    use crate::control::info::Version;

    fn info(links: u32) -> CoreInfo {
        CoreInfo {
            version: Version {
                design: 2,
                major: 1,
                minor: 0,
                patch: 0,
            },
            link_count: links,
            source_count: links * 4,
            sources_per_link: 4,
            ref_freq: 62_500_000,
        }
    }

    fn endpoint(mac: &str, ip: &str) -> EndpointConf {
        EndpointConf {
            mac: mac.into(),
            ip_addresses: vec![ip.into()],
            port: None,
            filter_control: None,
        }
    }

    fn link(id: u32) -> LinkConf {
        LinkConf {
            id,
            enabled: true,
            source_endpoint: endpoint("00:11:22:33:44:55", "10.73.139.23"),
            destination_endpoint: endpoint("aa:bb:cc:dd:ee:ff", "10.73.139.99"),
            sources: vec![SourceResource::Stream(DetectorStream {
                source_id: id,
                geo: GeoTag {
                    detector_id: 3,
                    crate_id: 21,
                    slot_id: id as u16,
                },
            })],
        }
    }

    fn conf(links: Vec<LinkConf>) -> ModuleConf {
        ModuleConf {
            device: "flx-tx-0".into(),
            port: 0x4444,
            geo_info: GeoTag::default(),
            links,
        }
    }

    #[test]
    fn accepts_dense_unique_ids() {
        let conf = conf((0..4).map(link).collect());
        let validated = validate_topology(&conf, &info(4)).unwrap();
        assert_eq!(validated.len(), 4);
        assert_eq!(
            validated.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(validated[2].geo.slot_id, 2);
        assert_eq!(validated[0].endpoint.source_port, 0x4444);
        assert_eq!(validated[0].endpoint.filter_mask, DEFAULT_FILTER_CONTROL);
    }

    #[test]
    fn output_sorted_even_if_declared_unordered() {
        let conf = conf(vec![link(2), link(0), link(3), link(1)]);
        let validated = validate_topology(&conf, &info(4)).unwrap();
        assert_eq!(
            validated.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn rejects_count_mismatch() {
        let conf = conf((0..3).map(link).collect());
        assert_eq!(
            validate_topology(&conf, &info(4)),
            Err(ValidateError::LinkCountMismatch {
                configured: 3,
                firmware: 4
            })
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut links: Vec<LinkConf> = (0..12).map(link).collect();
        links[7].id = 5; // duplicate of link 5, id 7 now missing
        let conf = conf(links);
        assert_eq!(
            validate_topology(&conf, &info(12)),
            Err(ValidateError::DuplicatedLinkIds {
                configured: 12,
                unique: 11
            })
        );
    }

    #[test]
    fn rejects_gap_in_id_coverage() {
        // Unique ids, right count, but 0..3 shifted to leave a hole.
        let mut links: Vec<LinkConf> = (0..4).map(link).collect();
        links[3].id = 7;
        let conf = conf(links);
        assert_eq!(
            validate_topology(&conf, &info(4)),
            Err(ValidateError::LinkIdGap {
                last: 7,
                expected: 3
            })
        );
    }

    #[test]
    fn rejects_zero_candidate_addresses() {
        let mut links: Vec<LinkConf> = (0..4).map(link).collect();
        links[2].destination_endpoint.ip_addresses.clear();
        let conf = conf(links);
        assert_eq!(
            validate_topology(&conf, &info(4)),
            Err(ValidateError::AmbiguousIpAddress {
                link: 2,
                side: EndpointSide::Destination,
                found: 0
            })
        );
    }

    #[test]
    fn rejects_multiple_candidate_addresses() {
        let mut links: Vec<LinkConf> = (0..4).map(link).collect();
        links[1]
            .source_endpoint
            .ip_addresses
            .push("10.73.139.24".into());
        let conf = conf(links);
        assert_eq!(
            validate_topology(&conf, &info(4)),
            Err(ValidateError::AmbiguousIpAddress {
                link: 1,
                side: EndpointSide::Source,
                found: 2
            })
        );
    }

    #[test]
    fn rejects_unparseable_mac_and_ip() {
        let mut links: Vec<LinkConf> = (0..4).map(link).collect();
        links[0].source_endpoint.mac = "not-a-mac".into();
        let conf_bad_mac = conf(links);
        assert!(matches!(
            validate_topology(&conf_bad_mac, &info(4)),
            Err(ValidateError::InvalidMacAddress { link: 0, .. })
        ));

        let mut links: Vec<LinkConf> = (0..4).map(link).collect();
        links[0].destination_endpoint.ip_addresses = vec!["300.1.2.3".into()];
        let conf_bad_ip = conf(links);
        assert!(matches!(
            validate_topology(&conf_bad_ip, &info(4)),
            Err(ValidateError::InvalidIpAddress { link: 0, .. })
        ));
    }

    #[test]
    fn rejects_link_without_stream() {
        let mut links: Vec<LinkConf> = (0..4).map(link).collect();
        links[3].sources = vec![SourceResource::Group { contains: vec![] }];
        let conf = conf(links);
        assert_eq!(
            validate_topology(&conf, &info(4)),
            Err(ValidateError::InvalidSourceStream { link: 3 })
        );
    }

    #[test]
    fn resolves_stream_nested_in_group() {
        let mut links: Vec<LinkConf> = (0..4).map(link).collect();
        links[1].sources = vec![SourceResource::Group {
            contains: vec![SourceResource::Stream(DetectorStream {
                source_id: 42,
                geo: GeoTag {
                    detector_id: 3,
                    crate_id: 22,
                    slot_id: 9,
                },
            })],
        }];
        let conf = conf(links);
        let validated = validate_topology(&conf, &info(4)).unwrap();
        assert_eq!(validated[1].geo.crate_id, 22);
        assert_eq!(validated[1].geo.slot_id, 9);
    }
}
