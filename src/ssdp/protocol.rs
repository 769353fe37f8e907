/*!
NT/ST/USN construction (§1 Discovery, Tables 1-1/1-2/1-3): the fixed set
of notification-type triples a root device must advertise and a search
target must be checked against.

Grounded on the teacher's `ssdp/search.rs` `SearchTarget` enum and its
regex-based `FromStr`; extended here with the USN-formatting and
per-device advertisement enumeration the teacher's stub `notify.rs`
never implemented.
*/
use crate::description::device::DeviceDesc;
use crate::description::{parse_type_id, TypeID};
use crate::error::MessageFormatError;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::{self, Display, Formatter};

lazy_static! {
    static ref DOMAIN_URN: Regex = Regex::new(r"^urn:[^:]+:(device|service):[^:]+:[0-9]+$").unwrap();
}

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A parsed `ST`/`NT` header value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchTarget {
    All,
    RootDevice,
    Uuid(String),
    DeviceType(TypeID),
    ServiceType(TypeID),
}

impl Display for SearchTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SearchTarget::All => write!(f, "ssdp:all"),
            SearchTarget::RootDevice => write!(f, "upnp:rootdevice"),
            SearchTarget::Uuid(uuid) => write!(f, "{}", uuid),
            SearchTarget::DeviceType(t) | SearchTarget::ServiceType(t) => write!(f, "{}", t),
        }
    }
}

impl std::str::FromStr for SearchTarget {
    type Err = MessageFormatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "ssdp:all" {
            Ok(SearchTarget::All)
        } else if value == "upnp:rootdevice" {
            Ok(SearchTarget::RootDevice)
        } else if value.starts_with("uuid:") {
            Ok(SearchTarget::Uuid(value.to_string()))
        } else if DOMAIN_URN.is_match(value) {
            match parse_type_id(value)? {
                t @ TypeID::Device { .. } => Ok(SearchTarget::DeviceType(t)),
                t @ TypeID::Service { .. } => Ok(SearchTarget::ServiceType(t)),
            }
        } else {
            Err(crate::error::invalid_header_value("ST", value))
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Format the `USN` value for a given UDN and the triple it advertises,
/// e.g. `"{udn}::upnp:rootdevice"` or plain `"{udn}"` for the bare
/// device-uuid triple.
pub fn format_usn(udn: &str, target: &SearchTarget) -> String {
    match target {
        SearchTarget::Uuid(_) => udn.to_string(),
        _ => format!("{}::{}", udn, target),
    }
}

/// Does an advertised `(nt, usn)` pair satisfy the given search target?
/// `ssdp:all` matches everything; `upnp:rootdevice`/a bare uuid/a type
/// URN match only their own kind, and type URNs match modulo the
/// trailing version component as required by §4.4.
pub fn matches_target(target: &SearchTarget, nt: &str, usn: &str) -> bool {
    match target {
        SearchTarget::All => true,
        SearchTarget::RootDevice => nt == "upnp:rootdevice",
        SearchTarget::Uuid(uuid) => usn.starts_with(uuid.as_str()),
        SearchTarget::DeviceType(t) | SearchTarget::ServiceType(t) => parse_type_id(nt)
            .map(|parsed| parsed.matches_modulo_version(t))
            .unwrap_or(false),
    }
}

/// The full set of `(NT, USN)` pairs a root device (and its embedded
/// devices and services) must advertise on `ssdp:alive`/`ssdp:byebye`
/// (§1, Table 1-1 for the root, Table 1-2 for embedded devices).
pub fn advertisement_set(root: &DeviceDesc) -> Vec<(String, String)> {
    let mut out = Vec::new();
    collect_advertisements(root, true, &mut out);
    out
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn collect_advertisements(device: &DeviceDesc, is_root: bool, out: &mut Vec<(String, String)>) {
    if is_root {
        out.push((
            "upnp:rootdevice".to_string(),
            format!("{}::upnp:rootdevice", device.udn),
        ));
    }
    out.push((device.udn.clone(), device.udn.clone()));
    out.push((
        device.device_type.to_string(),
        format!("{}::{}", device.udn, device.device_type),
    ));
    for service in &device.service_list {
        out.push((
            service.service_type.to_string(),
            format!("{}::{}", device.udn, service.service_type),
        ));
    }
    for child in &device.device_list {
        collect_advertisements(child, false, out);
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_well_known_targets() {
        assert_eq!(SearchTarget::from_str("ssdp:all").unwrap(), SearchTarget::All);
        assert_eq!(
            SearchTarget::from_str("upnp:rootdevice").unwrap(),
            SearchTarget::RootDevice
        );
        assert_eq!(
            SearchTarget::from_str("uuid:abc").unwrap(),
            SearchTarget::Uuid("uuid:abc".to_string())
        );
    }

    #[test]
    fn parses_type_urn_targets() {
        let target = SearchTarget::from_str("urn:schemas-upnp-org:device:MediaServer:1").unwrap();
        assert!(matches!(target, SearchTarget::DeviceType(_)));
    }

    #[test]
    fn unrecognized_target_is_rejected() {
        assert!(SearchTarget::from_str("not-a-target").is_err());
    }

    #[test]
    fn all_matches_any_advertisement() {
        assert!(matches_target(&SearchTarget::All, "upnp:rootdevice", "uuid:x::upnp:rootdevice"));
    }

    #[test]
    fn type_target_matches_modulo_version() {
        let target =
            SearchTarget::from_str("urn:schemas-upnp-org:device:MediaServer:2").unwrap();
        assert!(matches_target(
            &target,
            "urn:schemas-upnp-org:device:MediaServer:1",
            "uuid:x::urn:schemas-upnp-org:device:MediaServer:1"
        ));
    }

    #[test]
    fn usn_for_uuid_target_has_no_suffix() {
        assert_eq!(
            format_usn("uuid:x", &SearchTarget::Uuid("uuid:x".to_string())),
            "uuid:x"
        );
    }
}
