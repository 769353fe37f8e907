/*!
M-SEARCH: the control-point side that sends a search and parses the
resulting responses (§1 Discovery), and the device side that decides
whether an inbound M-SEARCH matches one of its own advertisements.

Grounded on the teacher's `ssdp/search.rs`: its `Options::validate()`
MX-clamping and its `TryFrom<MulticastResponse> for Response` header
validation are reproduced here against this crate's own `httpu`/
`description` types rather than the teacher's half-built `httpu`
module.
*/
use crate::description::device::DeviceDesc;
use crate::error::Error;
use crate::ssdp::httpu::{self, Options};
use crate::ssdp::protocol::{advertisement_set, matches_target, SearchTarget};
use crate::syntax::*;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MAX_AGE: Regex = Regex::new(r"max-age\s*=\s*(\d+)").unwrap();
}

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// One parsed M-SEARCH response.
#[derive(Clone, Debug)]
pub struct SearchResponse {
    pub usn: String,
    pub st: String,
    pub location: String,
    pub max_age: u64,
    pub server: String,
    pub boot_id: Option<u64>,
    pub config_id: Option<u64>,
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Clamp a caller-requested MX (max search wait, seconds) to the
/// configured bounds (§6 Configuration's `searchTimeout` range).
pub fn clamp_mx(requested: u8) -> u8 {
    requested.clamp(MIN_SEARCH_TIME_SECS, MAX_SEARCH_TIME_SECS)
}

/// Build the multicast M-SEARCH request for `target`.
pub fn build_search_message(target: &SearchTarget, mx: u8, user_agent: &str) -> String {
    httpu::build_request(
        METHOD_SEARCH,
        HTTP_MATCH_ANY_RESOURCE,
        &[
            (HEAD_HOST, SSDP_MULTICAST_ADDR_V4.to_string()),
            (HEAD_MAN, HTTP_EXTENSION.to_string()),
            (HEAD_MX, clamp_mx(mx).to_string()),
            (HEAD_ST, target.to_string()),
            (HEAD_USER_AGENT, user_agent.to_string()),
        ],
    )
}

/// Send a search and collect every response that arrives within `mx`
/// seconds, each parsed into a [`SearchResponse`] (malformed replies are
/// logged and skipped rather than failing the whole search, matching
/// `multicast_using`'s tolerance of unrelated multicast traffic).
pub fn search(target: &SearchTarget, mx: u8, user_agent: &str) -> Result<Vec<SearchResponse>, Error> {
    let mx = clamp_mx(mx);
    let message = build_search_message(target, mx, user_agent);
    let options = Options {
        read_timeout: std::time::Duration::from_secs(mx as u64),
        ..Options::default()
    };
    let replies = httpu::multicast(&message, &options)?;
    let mut out = Vec::new();
    for reply in replies {
        match parse_search_response(&reply.message) {
            Ok(response) => out.push(response),
            Err(e) => tracing::warn!("search - discarding malformed response: {}", e),
        }
    }
    Ok(out)
}

/// Parse one received HTTPU message into a [`SearchResponse`], as the
/// teacher's `TryFrom<MulticastResponse> for Response` validated its
/// required headers.
pub fn parse_search_response(message: &httpu::Message) -> Result<SearchResponse, Error> {
    let usn = message.require_header(HEAD_USN)?.to_string();
    let st = message.require_header(HEAD_ST)?.to_string();
    let location = message.require_header(HEAD_LOCATION)?.to_string();
    let cache_control = message.require_header(HEAD_CACHE_CONTROL)?;
    let max_age = parse_max_age(cache_control)?;
    let server = message.header(HEAD_SERVER).unwrap_or("").to_string();
    let boot_id = message.header(HEAD_BOOTID).and_then(|v| v.parse().ok());
    let config_id = message.header(HEAD_CONFIGID).and_then(|v| v.parse().ok());
    Ok(SearchResponse {
        usn,
        st,
        location,
        max_age,
        server,
        boot_id,
        config_id,
    })
}

/// Does a registered root device (or one of its embedded devices or
/// services) have an advertisement matching an inbound M-SEARCH's
/// target? Used by the mini-server to decide whether, and with which
/// `(NT, USN)` pairs, to answer.
pub fn matching_advertisements(root: &DeviceDesc, target: &SearchTarget) -> Vec<(String, String)> {
    advertisement_set(root)
        .into_iter()
        .filter(|(nt, usn)| matches_target(target, nt, usn))
        .collect()
}

/// Build the unicast M-SEARCH response for one matching `(NT, USN)`
/// pair, carrying the same `BOOTID.UPNP.ORG`/`CONFIGID.UPNP.ORG` headers
/// a NOTIFY for the same device carries.
pub fn build_search_response(
    nt: &str,
    usn: &str,
    location: &str,
    server: &str,
    max_age: u64,
    boot_id: u64,
    config_id: u64,
) -> String {
    httpu::build_response(
        200,
        "OK",
        &[
            (HEAD_CACHE_CONTROL, format!("max-age={}", max_age)),
            (HEAD_EXT, String::new()),
            (HEAD_LOCATION, location.to_string()),
            (HEAD_SERVER, server.to_string()),
            (HEAD_ST, nt.to_string()),
            (HEAD_USN, usn.to_string()),
            (HEAD_BOOTID, boot_id.to_string()),
            (HEAD_CONFIGID, config_id.to_string()),
        ],
    )
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn parse_max_age(cache_control: &str) -> Result<u64, Error> {
    MAX_AGE
        .captures(cache_control)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| crate::error::invalid_header_value(HEAD_CACHE_CONTROL, cache_control).into())
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::TypeID;
    use std::str::FromStr;

    #[test]
    fn mx_is_clamped_to_configured_bounds() {
        assert_eq!(clamp_mx(0), MIN_SEARCH_TIME_SECS);
        assert_eq!(clamp_mx(200), MAX_SEARCH_TIME_SECS);
        assert_eq!(clamp_mx(5), 5);
    }

    #[test]
    fn search_message_carries_man_and_st() {
        let target = SearchTarget::from_str("ssdp:all").unwrap();
        let message = build_search_message(&target, 3, "test/1.0");
        let parsed = httpu::parse_message(&message).unwrap();
        assert_eq!(parsed.header(HEAD_MAN), Some(HTTP_EXTENSION));
        assert_eq!(parsed.header(HEAD_ST), Some("ssdp:all"));
    }

    #[test]
    fn response_is_parsed_from_required_headers() {
        let raw = httpu::build_response(
            200,
            "OK",
            &[
                (HEAD_USN, "uuid:x::upnp:rootdevice".to_string()),
                (HEAD_ST, "upnp:rootdevice".to_string()),
                (HEAD_LOCATION, "http://127.0.0.1/desc.xml".to_string()),
                (HEAD_CACHE_CONTROL, "max-age=1800".to_string()),
            ],
        );
        let message = httpu::parse_message(&raw).unwrap();
        let response = parse_search_response(&message).unwrap();
        assert_eq!(response.max_age, 1800);
        assert_eq!(response.usn, "uuid:x::upnp:rootdevice");
    }

    #[test]
    fn response_missing_a_required_header_is_rejected() {
        let raw = httpu::build_response(200, "OK", &[(HEAD_USN, "uuid:x".to_string())]);
        let message = httpu::parse_message(&raw).unwrap();
        assert!(parse_search_response(&message).is_err());
    }

    #[test]
    fn matching_advertisements_filters_by_target() {
        let device = DeviceDesc {
            device_type: TypeID::new_device("MediaServer".to_string(), "1".to_string()),
            friendly_name: "Test".to_string(),
            manufacturer: "Test".to_string(),
            manufacturer_url: None,
            model_description: None,
            model_name: "Test".to_string(),
            model_number: None,
            model_url: None,
            serial_number: None,
            udn: "uuid:abc".to_string(),
            upc: None,
            icon_list: Vec::new(),
            service_list: Vec::new(),
            device_list: Vec::new(),
            presentation_url: None,
        };
        let target = SearchTarget::from_str("upnp:rootdevice").unwrap();
        let matches = matching_advertisements(&device, &target);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, "upnp:rootdevice");
    }
}
