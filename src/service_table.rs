/*!
Service table (component B): the per-device registry of services and
their subscriptions, built once from a parsed description and shared
between GENA (writer on subscribe/unsubscribe) and SOAP/web server
(readers for URL-to-service lookup).

Grounded on the teacher's absence of an equivalent module (the teacher
never implemented eventing) — the shape here follows the service/
subscription data model in §3 and §4.3, built with the same owned-value-
plus-small-integer-id style the teacher uses for its `Handle` type.
*/
use crate::description::device::{DeviceDesc, ServiceDesc};
use crate::description::TypeID;
use crate::uri::parse_uri;
use std::time::{SystemTime, UNIX_EPOCH};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A registered GENA subscription on one service.
#[derive(Clone, Debug)]
pub struct Subscription {
    pub sid: String,
    pub event_key: u32,
    /// Absolute unix timestamp; 0 means infinite.
    pub expiry: u64,
    pub active: bool,
    pub delivery_urls: Vec<String>,
}

impl Subscription {
    pub fn new(sid: String, delivery_urls: Vec<String>, expiry: u64) -> Self {
        Subscription {
            sid,
            event_key: 0,
            expiry,
            active: false,
            delivery_urls,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry != 0 && self.expiry <= now
    }

    /// Advance the event key, wrapping to 1 rather than 0 (§3: "the
    /// event-key is never 0 after the first notification").
    pub fn advance_key(&mut self) -> u32 {
        self.event_key = self.event_key.wrapping_add(1);
        if self.event_key == 0 {
            self.event_key = 1;
        }
        self.event_key
    }
}

/// A service entry in the table: the resolved `ServiceDesc` fields plus
/// the owning UDN and live subscription list.
#[derive(Clone, Debug)]
pub struct ServiceEntry {
    pub udn: String,
    pub service_type: TypeID,
    pub service_id: String,
    pub scpd_url: String,
    pub control_url: String,
    pub event_sub_url: String,
    pub active: bool,
    pub subscriptions: Vec<Subscription>,
}

impl ServiceEntry {
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn prune_expired(&mut self) {
        let now = now_secs();
        self.subscriptions.retain(|s| !s.is_expired(now));
    }

    pub fn get_by_sid(&mut self, sid: &str) -> Option<&mut Subscription> {
        self.prune_expired();
        self.subscriptions.iter_mut().find(|s| s.sid == sid)
    }

    pub fn first_active(&mut self) -> Option<&Subscription> {
        self.prune_expired();
        self.subscriptions.iter().find(|s| s.active)
    }

    pub fn next_active<'a>(&'a mut self, after_sid: &str) -> Option<&'a Subscription> {
        self.prune_expired();
        let pos = self.subscriptions.iter().position(|s| s.sid == after_sid)?;
        self.subscriptions[pos + 1..].iter().find(|s| s.active)
    }

    pub fn remove_by_sid(&mut self, sid: &str) -> Option<Subscription> {
        let pos = self.subscriptions.iter().position(|s| s.sid == sid)?;
        Some(self.subscriptions.remove(pos))
    }
}

/// Per-device table of services, indexed by lookup path as the real
/// traffic arrives: service id, control-URL path, event-URL path.
#[derive(Clone, Debug, Default)]
pub struct ServiceTable {
    entries: Vec<ServiceEntry>,
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Build a `ServiceTable` from a parsed, URL-resolved `DeviceDesc`,
/// walking embedded devices too.
pub fn init_from_description(device: &DeviceDesc) -> ServiceTable {
    let mut entries = Vec::new();
    collect_services(device, &mut entries);
    ServiceTable { entries }
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl ServiceTable {
    pub fn find_by_service_id(&mut self, service_id: &str, udn: &str) -> Option<&mut ServiceEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.service_id == service_id && e.udn == udn)
    }

    pub fn find_by_control_path(&mut self, path: &str) -> Option<&mut ServiceEntry> {
        find_by_path(&mut self.entries, path, |e| &e.control_url)
    }

    pub fn find_by_event_path(&mut self, path: &str) -> Option<&mut ServiceEntry> {
        find_by_path(&mut self.entries, path, |e| &e.event_sub_url)
    }

    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [ServiceEntry] {
        &mut self.entries
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn collect_services(device: &DeviceDesc, out: &mut Vec<ServiceEntry>) {
    for service in &device.service_list {
        out.push(to_entry(service, &device.udn));
    }
    for child in &device.device_list {
        collect_services(child, out);
    }
}

fn to_entry(service: &ServiceDesc, udn: &str) -> ServiceEntry {
    ServiceEntry {
        udn: udn.to_string(),
        service_type: service.service_type.clone(),
        service_id: service.service_id.clone(),
        scpd_url: service.scpd_url.clone(),
        control_url: service.control_url.clone(),
        event_sub_url: service.event_sub_url.clone(),
        active: true,
        subscriptions: Vec::new(),
    }
}

/// Compare `path` (and query) to an entry's absolute URL's path+query,
/// per §4.3: "path comparisons compare the parsed path and query
/// components separately".
fn find_by_path<'a, F>(
    entries: &'a mut [ServiceEntry],
    path: &str,
    field: F,
) -> Option<&'a mut ServiceEntry>
where
    F: Fn(&ServiceEntry) -> &String,
{
    let wanted = parse_uri(path).ok()?;
    entries.iter_mut().find(|e| {
        parse_uri(field(e))
            .map(|u| u.path == wanted.path && u.query == wanted.query)
            .unwrap_or(false)
    })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::device::{DeviceDesc, ServiceDesc};

    fn device() -> DeviceDesc {
        DeviceDesc {
            device_type: TypeID::new_device("MediaServer".to_string(), "1".to_string()),
            friendly_name: "x".to_string(),
            manufacturer: "x".to_string(),
            manufacturer_url: None,
            model_description: None,
            model_name: "x".to_string(),
            model_number: None,
            model_url: None,
            serial_number: None,
            udn: "uuid:1-2-3".to_string(),
            upc: None,
            icon_list: vec![],
            service_list: vec![ServiceDesc {
                service_type: TypeID::new_service("RenderingControl".to_string(), "1".to_string()),
                service_id: "urn:upnp-org:serviceId:RenderingControl".to_string(),
                scpd_url: "http://h/scpd.xml".to_string(),
                control_url: "http://h/control?x=1".to_string(),
                event_sub_url: "http://h/event".to_string(),
            }],
            device_list: vec![],
            presentation_url: None,
        }
    }

    #[test]
    fn finds_by_control_path_ignoring_host() {
        let mut table = init_from_description(&device());
        let found = table.find_by_control_path("/control?x=1");
        assert!(found.is_some());
    }

    #[test]
    fn finds_by_service_id_and_udn() {
        let mut table = init_from_description(&device());
        let found = table.find_by_service_id("urn:upnp-org:serviceId:RenderingControl", "uuid:1-2-3");
        assert!(found.is_some());
    }

    #[test]
    fn subscriber_count_matches_subscription_list() {
        let mut table = init_from_description(&device());
        let entry = table.entries_mut().first_mut().unwrap();
        entry.subscriptions.push(Subscription::new(
            "uuid:aaa".to_string(),
            vec!["http://cp/event".to_string()],
            0,
        ));
        assert_eq!(entry.subscriber_count(), 1);
    }

    #[test]
    fn advance_key_skips_zero_on_wrap() {
        let mut sub = Subscription::new("uuid:aaa".to_string(), vec![], 0);
        sub.event_key = u32::MAX;
        assert_eq!(sub.advance_key(), 1);
    }

    #[test]
    fn remove_by_sid_drops_subscription() {
        let mut entry = to_entry(&device().service_list[0], "uuid:1-2-3");
        entry.subscriptions.push(Subscription::new("uuid:aaa".to_string(), vec![], 0));
        assert!(entry.remove_by_sid("uuid:aaa").is_some());
        assert_eq!(entry.subscriber_count(), 0);
    }
}
