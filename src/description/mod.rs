/*!
Description parser (component C): the device/service type identifiers
shared by both the description document and SSDP search targets, plus
the XML parse/serialize entry points in [`device`] and [`service`].

Grounded on the teacher's `description/mod.rs` `SpecVersion`/`TypeID`
pair, generalized with a reader side (the teacher only ever wrote
descriptions; the runtime here must also parse one, both to validate a
registered description and to serve it back with host:port rewritten).
*/
use crate::error::{missing_xml_value, Error, MessageFormatError};
use crate::syntax::UPNP_DOMAIN;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

pub mod device;
pub mod service;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// The `<specVersion>` pair carried by both device and service
/// descriptions.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SpecVersion {
    pub major: u8,
    pub minor: u8,
}

impl Default for SpecVersion {
    fn default() -> Self {
        SpecVersion { major: 1, minor: 0 }
    }
}

/// A device or service type URN, e.g.
/// `urn:schemas-upnp-org:device:MediaServer:1`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum TypeID {
    Device {
        domain: String,
        name: String,
        version: String,
    },
    Service {
        domain: String,
        name: String,
        version: String,
    },
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Parse a `urn:{domain}:{device|service}:{name}:{version}` type URN.
pub fn parse_type_id(value: &str) -> Result<TypeID, MessageFormatError> {
    let parts: Vec<&str> = value.splitn(5, ':').collect();
    if parts.len() != 5 || parts[0] != "urn" {
        return Err(crate::error::invalid_xml_value("deviceType/serviceType", value));
    }
    let (domain, kind, name, version) = (parts[1], parts[2], parts[3], parts[4]);
    match kind {
        "device" => Ok(TypeID::new_device_with_domain(
            domain.to_string(),
            name.to_string(),
            version.to_string(),
        )),
        "service" => Ok(TypeID::new_service_with_domain(
            domain.to_string(),
            name.to_string(),
            version.to_string(),
        )),
        _ => Err(crate::error::invalid_xml_value("deviceType/serviceType", value)),
    }
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl TypeID {
    pub fn new_device(name: String, version: String) -> Self {
        TypeID::Device {
            domain: UPNP_DOMAIN.to_string(),
            name,
            version,
        }
    }

    pub fn new_device_with_domain(domain: String, name: String, version: String) -> Self {
        TypeID::Device {
            domain,
            name,
            version,
        }
    }

    pub fn new_service(name: String, version: String) -> Self {
        TypeID::Service {
            domain: UPNP_DOMAIN.to_string(),
            name,
            version,
        }
    }

    pub fn new_service_with_domain(domain: String, name: String, version: String) -> Self {
        TypeID::Service {
            domain,
            name,
            version,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TypeID::Device { name, .. } | TypeID::Service { name, .. } => name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            TypeID::Device { version, .. } | TypeID::Service { version, .. } => version,
        }
    }

    /// Compare two type URNs ignoring the trailing version component, as
    /// required when matching a SOAPACTION header's serviceType against
    /// the service table (§4.4: "modulo trailing version component").
    pub fn matches_modulo_version(&self, other: &TypeID) -> bool {
        match (self, other) {
            (
                TypeID::Device { domain: d1, name: n1, .. },
                TypeID::Device { domain: d2, name: n2, .. },
            ) => d1 == d2 && n1 == n2,
            (
                TypeID::Service { domain: d1, name: n1, .. },
                TypeID::Service { domain: d2, name: n2, .. },
            ) => d1 == d2 && n1 == n2,
            _ => false,
        }
    }

    pub fn default_id(&self) -> String {
        match self {
            TypeID::Device { name, .. } => format!("urn:upnp-org:deviceId:{}", name),
            TypeID::Service { name, .. } => format!("urn:upnp-org:serviceId:{}", name),
        }
    }
}

impl Display for TypeID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeID::Device { domain, name, version } => {
                write!(f, "urn:{}:device:{}:{}", domain, name, version)
            }
            TypeID::Service { domain, name, version } => {
                write!(f, "urn:{}:service:{}:{}", domain, name, version)
            }
        }
    }
}

impl SpecVersion {
    pub fn parse(major: &str, minor: &str) -> Result<Self, Error> {
        Ok(SpecVersion {
            major: major
                .parse()
                .map_err(|_| missing_xml_value("specVersion/major"))?,
            minor: minor
                .parse()
                .map_err(|_| missing_xml_value("specVersion/minor"))?,
        })
    }
}
