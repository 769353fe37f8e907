//! SSDP advertisement enumeration against a real (root + embedded)
//! device description, then checked through the same target-matching
//! logic an incoming M-SEARCH would be checked against (§1).

use std::str::FromStr;

use upnp_core::description::device::{DeviceDesc, ServiceDesc};
use upnp_core::description::TypeID;
use upnp_core::ssdp::protocol::{advertisement_set, format_usn, matches_target, SearchTarget};

fn media_server_with_embedded_child() -> DeviceDesc {
    let child = DeviceDesc {
        device_type: TypeID::new_device("MediaServer".to_string(), "1".to_string()),
        friendly_name: "Child".to_string(),
        manufacturer: "Acme".to_string(),
        manufacturer_url: None,
        model_description: None,
        model_name: "x".to_string(),
        model_number: None,
        model_url: None,
        serial_number: None,
        udn: "uuid:child".to_string(),
        upc: None,
        icon_list: vec![],
        service_list: vec![],
        device_list: vec![],
        presentation_url: None,
    };

    DeviceDesc {
        device_type: TypeID::new_device("MediaServer".to_string(), "1".to_string()),
        friendly_name: "Root".to_string(),
        manufacturer: "Acme".to_string(),
        manufacturer_url: None,
        model_description: None,
        model_name: "x".to_string(),
        model_number: None,
        model_url: None,
        serial_number: None,
        udn: "uuid:root".to_string(),
        upc: None,
        icon_list: vec![],
        service_list: vec![ServiceDesc {
            service_type: TypeID::new_service("ContentDirectory".to_string(), "1".to_string()),
            service_id: "urn:upnp-org:serviceId:ContentDirectory".to_string(),
            scpd_url: "http://h/cd.xml".to_string(),
            control_url: "http://h/control".to_string(),
            event_sub_url: "http://h/event".to_string(),
        }],
        device_list: vec![child],
        presentation_url: None,
    }
}

#[test]
fn root_device_advertises_rootdevice_uuid_type_and_each_service_but_the_child_does_not() {
    let root = media_server_with_embedded_child();
    let ads = advertisement_set(&root);

    assert!(ads
        .iter()
        .any(|(nt, usn)| nt == "upnp:rootdevice" && usn == "uuid:root::upnp:rootdevice"));
    assert!(ads.iter().any(|(nt, usn)| nt == "uuid:root" && usn == "uuid:root"));
    assert!(ads
        .iter()
        .any(|(nt, _)| nt == "urn:upnp-org:serviceId:ContentDirectory"
            || nt.contains("ContentDirectory")));

    // the embedded device gets its own uuid/type pair, but no
    // upnp:rootdevice advertisement of its own
    assert!(ads.iter().any(|(nt, usn)| nt == "uuid:child" && usn == "uuid:child"));
    assert!(!ads.iter().any(|(_, usn)| usn.contains("uuid:child::upnp:rootdevice")));
}

#[test]
fn an_ssdp_all_search_matches_every_advertisement_produced_for_the_device() {
    let root = media_server_with_embedded_child();
    let target = SearchTarget::from_str("ssdp:all").unwrap();
    for (nt, usn) in advertisement_set(&root) {
        assert!(matches_target(&target, &nt, &usn));
    }
}

#[test]
fn a_device_type_search_with_a_newer_version_matches_the_advertised_older_one() {
    let root = media_server_with_embedded_child();
    let target = SearchTarget::from_str("urn:schemas-upnp-org:device:MediaServer:3").unwrap();
    let ads = advertisement_set(&root);
    let (nt, usn) = ads
        .iter()
        .find(|(nt, _)| nt.contains(":device:MediaServer:"))
        .expect("device type advertisement present");
    assert!(matches_target(&target, nt, usn));
}

#[test]
fn a_uuid_search_matches_only_its_own_devices_usn_entries() {
    let root = media_server_with_embedded_child();
    let target = SearchTarget::from_str("uuid:root").unwrap();
    let ads = advertisement_set(&root);

    let root_matches: Vec<_> = ads
        .iter()
        .filter(|(_, usn)| matches_target(&target, "ignored", usn))
        .collect();
    assert!(!root_matches.is_empty());
    assert!(root_matches.iter().all(|(_, usn)| usn.starts_with("uuid:root")));
    assert!(!root_matches.iter().any(|(_, usn)| usn.starts_with("uuid:child")));
}

#[test]
fn format_usn_matches_what_advertisement_set_produces_for_the_rootdevice_triple() {
    let root = media_server_with_embedded_child();
    let expected = format_usn(&root.udn, &SearchTarget::RootDevice);
    assert!(advertisement_set(&root)
        .iter()
        .any(|(_, usn)| usn == &expected));
}
