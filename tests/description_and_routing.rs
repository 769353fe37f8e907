//! Exercises device description parsing/URL resolution together with
//! service-table routing, the way two devices registered against the
//! same runtime would each get their own prefix (§4.1, §4.3).

use upnp_core::description::device::{self, DeviceDesc, ServiceDesc};
use upnp_core::description::TypeID;
use upnp_core::service_table;

fn sample_device(udn: &str) -> DeviceDesc {
    DeviceDesc {
        device_type: TypeID::new_device("MediaServer".to_string(), "1".to_string()),
        friendly_name: "Test Server".to_string(),
        manufacturer: "Acme".to_string(),
        manufacturer_url: None,
        model_description: None,
        model_name: "Model X".to_string(),
        model_number: None,
        model_url: None,
        serial_number: None,
        udn: udn.to_string(),
        upc: None,
        icon_list: vec![],
        service_list: vec![ServiceDesc {
            service_type: TypeID::new_service("ContentDirectory".to_string(), "1".to_string()),
            service_id: "urn:upnp-org:serviceId:ContentDirectory".to_string(),
            scpd_url: "cd_scpd.xml".to_string(),
            control_url: "control".to_string(),
            event_sub_url: "event".to_string(),
        }],
        device_list: vec![],
        presentation_url: None,
    }
}

/// Two devices registered against the same host:port, each under its
/// own numbered prefix, must resolve to distinct, non-colliding service
/// URLs -- the bug a base URI without a trailing slash produces, since
/// RFC 3986 relative resolution drops the base's last path segment
/// before appending a relative reference that doesn't start with `/`.
#[test]
fn two_devices_resolve_to_distinct_non_colliding_urls() {
    let mut device_a = sample_device("uuid:device-a");
    let mut device_b = sample_device("uuid:device-b");

    device::resolve_urls(&mut device_a, "http://192.168.1.5:49152/upnp/1/").unwrap();
    device::resolve_urls(&mut device_b, "http://192.168.1.5:49152/upnp/2/").unwrap();

    assert_eq!(
        device_a.service_list[0].control_url,
        "http://192.168.1.5:49152/upnp/1/control"
    );
    assert_eq!(
        device_b.service_list[0].control_url,
        "http://192.168.1.5:49152/upnp/2/control"
    );
    assert_ne!(device_a.service_list[0].control_url, device_b.service_list[0].control_url);

    let mut table_a = service_table::init_from_description(&device_a);
    let mut table_b = service_table::init_from_description(&device_b);

    assert!(table_a.find_by_control_path("/upnp/2/control").is_none());
    assert!(table_b.find_by_control_path("/upnp/1/control").is_none());
    assert!(table_a.find_by_control_path("/upnp/1/control").is_some());
    assert!(table_b.find_by_control_path("/upnp/2/control").is_some());
}

/// A base URI missing the trailing slash would instead drop the
/// prefix's numeric segment, making both devices resolve to the same
/// path and letting `find_by_control_path` route device A's SOAP
/// traffic to device B.
#[test]
fn base_uri_without_trailing_slash_would_collide() {
    let mut device_a = sample_device("uuid:device-a");
    let mut device_b = sample_device("uuid:device-b");

    device::resolve_urls(&mut device_a, "http://192.168.1.5:49152/upnp/1").unwrap();
    device::resolve_urls(&mut device_b, "http://192.168.1.5:49152/upnp/2").unwrap();

    assert_eq!(device_a.service_list[0].control_url, device_b.service_list[0].control_url);
}

#[test]
fn embedded_devices_contribute_their_own_service_entries() {
    let mut root = sample_device("uuid:root");
    root.device_list.push(sample_device("uuid:child"));
    device::resolve_urls(&mut root, "http://h:80/upnp/1/").unwrap();

    let table = service_table::init_from_description(&root);
    assert_eq!(table.entries().len(), 2, "root plus one embedded device");
    assert!(table.entries().iter().any(|e| e.udn == "uuid:root"));
    assert!(table.entries().iter().any(|e| e.udn == "uuid:child"));
}

#[test]
fn description_document_round_trips_through_parse() {
    let device = sample_device("uuid:device-a");
    let root = device::DeviceDescRoot {
        spec_version: Default::default(),
        url_base: String::new(),
        device,
    };
    let xml = device::to_string(&root).unwrap();
    let parsed = device::parse(&xml).unwrap();
    assert_eq!(parsed.device.udn, "uuid:device-a");
    assert_eq!(parsed.device.service_list[0].control_url, "control");
}
