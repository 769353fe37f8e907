/*!
Device-side advertisement (component I, §1 Discovery): building and
sending the `ssdp:alive`/`ssdp:byebye` NOTIFY multicasts a registered
root device must emit at registration, at unregistration, and on a
repeating auto-advertisement interval.

The teacher's `ssdp/notify.rs` left `device_available`/`device_update`
as no-op stubs and only `device_unavailable` actually built and sent a
message; this module implements all three in the same
`RequestBuilder`-style header list, multicast-once idiom the teacher
used for that one working case.
*/
use crate::ssdp::httpu::{self, Options};
use crate::ssdp::protocol::advertisement_set;
use crate::description::device::DeviceDesc;
use crate::error::Error;
use crate::syntax::*;

/// The advertisement-wide state carried across every NOTIFY a device
/// sends: the boot/config counters a control point uses to detect a
/// device restart (§1 Redesign: BOOTID/CONFIGID survive a reboot check)
/// and the `max-age` it promises to honour until the next advertisement.
#[derive(Clone, Copy, Debug)]
pub struct AdvertiseState {
    pub boot_id: u64,
    pub config_id: u64,
    pub max_age_secs: u64,
}

impl AdvertiseState {
    pub fn new(max_age_secs: u64) -> Self {
        AdvertiseState {
            boot_id: 1,
            config_id: 1,
            max_age_secs,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Build every `ssdp:alive` NOTIFY a root device (and its embedded
/// devices/services) must emit, per the table in `advertisement_set`.
pub fn build_alive_messages(
    root: &DeviceDesc,
    location: &str,
    server: &str,
    state: &AdvertiseState,
) -> Vec<String> {
    advertisement_set(root)
        .into_iter()
        .map(|(nt, usn)| build_alive(location, &usn, &nt, server, state))
        .collect()
}

/// Build every `ssdp:byebye` NOTIFY for an unregistering root device.
pub fn build_byebye_messages(root: &DeviceDesc, state: &AdvertiseState) -> Vec<String> {
    advertisement_set(root)
        .into_iter()
        .map(|(nt, usn)| build_byebye(&usn, &nt, state))
        .collect()
}

/// Send every message in `messages` over the SSDP multicast group, best
/// effort: a single failed send is logged and does not abort the rest,
/// since advertisement is background noise rather than a caller-facing
/// operation.
pub fn send_all(messages: &[String]) -> Result<(), Error> {
    let options = Options::default();
    for message in messages {
        if let Err(e) = httpu::multicast_once(message, &options) {
            tracing::warn!("send_all - advertisement send failed: {}", e);
        }
    }
    Ok(())
}

/// Clamp a configured `max-age` to the UPnP-recommended floor of 5
/// minutes, avoiding a cache-control value so small a control point
/// would treat the device as expiring almost immediately.
pub fn clamp_max_age(max_age_secs: u64) -> u64 {
    max_age_secs.max(300)
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn build_alive(location: &str, usn: &str, nt: &str, server: &str, state: &AdvertiseState) -> String {
    httpu::build_request(
        METHOD_NOTIFY,
        HTTP_MATCH_ANY_RESOURCE,
        &[
            (HEAD_HOST, SSDP_MULTICAST_ADDR_V4.to_string()),
            (HEAD_CACHE_CONTROL, format!("max-age={}", clamp_max_age(state.max_age_secs))),
            (HEAD_LOCATION, location.to_string()),
            (HEAD_SERVER, server.to_string()),
            (HEAD_NT, nt.to_string()),
            (HEAD_NTS, NTS_ALIVE.to_string()),
            (HEAD_USN, usn.to_string()),
            (HEAD_BOOTID, state.boot_id.to_string()),
            (HEAD_CONFIGID, state.config_id.to_string()),
        ],
    )
}

fn build_byebye(usn: &str, nt: &str, state: &AdvertiseState) -> String {
    httpu::build_request(
        METHOD_NOTIFY,
        HTTP_MATCH_ANY_RESOURCE,
        &[
            (HEAD_HOST, SSDP_MULTICAST_ADDR_V4.to_string()),
            (HEAD_NT, nt.to_string()),
            (HEAD_NTS, NTS_BYEBYE.to_string()),
            (HEAD_USN, usn.to_string()),
            (HEAD_BOOTID, state.boot_id.to_string()),
        ],
    )
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::TypeID;
    use crate::ssdp::httpu::parse_message;

    fn simple_device() -> DeviceDesc {
        DeviceDesc {
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
        }
    }

    #[test]
    fn alive_messages_include_every_advertisement() {
        let device = simple_device();
        let state = AdvertiseState::new(1800);
        let messages = build_alive_messages(&device, "http://127.0.0.1:80/desc.xml", "test/1.0", &state);
        assert_eq!(messages.len(), 3);
        let parsed = parse_message(&messages[0]).unwrap();
        assert_eq!(parsed.header(HEAD_NTS), Some(NTS_ALIVE));
        assert_eq!(parsed.header(HEAD_LOCATION), Some("http://127.0.0.1:80/desc.xml"));
    }

    #[test]
    fn byebye_messages_carry_no_location() {
        let device = simple_device();
        let state = AdvertiseState::new(1800);
        let messages = build_byebye_messages(&device, &state);
        let parsed = parse_message(&messages[0]).unwrap();
        assert_eq!(parsed.header(HEAD_NTS), Some(NTS_BYEBYE));
        assert!(parsed.header(HEAD_LOCATION).is_none());
    }

    #[test]
    fn max_age_is_clamped_to_the_recommended_floor() {
        assert_eq!(clamp_max_age(10), 300);
        assert_eq!(clamp_max_age(3600), 3600);
    }
}
