//! Embedded web server composed with a mounted virtual directory the
//! way `register_root_device` publishes a rewritten description
//! document under a per-device prefix, plus byte-range serving and
//! address gating (§4.1, §4.6).

use upnp_core::interface::SelectedInterface;
use upnp_core::webserver::{
    AddressGate, MemoryVirtualDir, OpenMode, RangeOutcome, WebServer,
};

fn mounted_server() -> WebServer {
    let mut server = WebServer::new(AddressGate::unrestricted());
    let docs = MemoryVirtualDir::new();
    docs.put(
        "/upnp/1/desc.xml",
        "text/xml",
        b"<root>device description</root>".to_vec(),
    );
    server.virtual_dirs.mount("/upnp/1", Box::new(docs));
    server
}

#[test]
fn a_document_mounted_under_a_device_prefix_is_found_by_stat_and_served_whole() {
    let server = mounted_server();
    let info = server.stat("/upnp/1/desc.xml").unwrap();
    assert_eq!(info.content_type, "text/xml");
    assert!(!info.is_directory);
    assert_eq!(info.size, 31);

    let body = server.read("/upnp/1/desc.xml", RangeOutcome::Full).unwrap();
    assert_eq!(body, b"<root>device description</root>".to_vec());
}

#[test]
fn a_path_outside_any_mounted_prefix_and_with_no_disk_root_configured_is_not_found() {
    let server = mounted_server();
    assert!(server.stat("/upnp/2/desc.xml").is_err());
}

#[test]
fn a_satisfiable_range_request_serves_only_the_requested_span() {
    let server = mounted_server();
    let info = server.stat("/upnp/1/desc.xml").unwrap();
    let range = upnp_core::webserver::parse_range_header(Some("bytes=0-5"), info.size);
    let body = server.read("/upnp/1/desc.xml", range).unwrap();
    assert_eq!(body, b"<root>".to_vec());
}

#[test]
fn two_devices_mounted_at_distinct_prefixes_do_not_shadow_each_others_documents() {
    let mut server = mounted_server();
    let other_docs = MemoryVirtualDir::new();
    other_docs.put(
        "/upnp/2/desc.xml",
        "text/xml",
        b"<root>other device</root>".to_vec(),
    );
    server.virtual_dirs.mount("/upnp/2", Box::new(other_docs));

    let first = server.read("/upnp/1/desc.xml", RangeOutcome::Full).unwrap();
    let second = server.read("/upnp/2/desc.xml", RangeOutcome::Full).unwrap();
    assert_ne!(first, second);
}

#[test]
fn unmounting_a_device_prefix_makes_its_documents_unreachable_again() {
    let mut server = mounted_server();
    assert!(server.virtual_dirs.unmount("/upnp/1"));
    assert!(server.stat("/upnp/1/desc.xml").is_err());
}

#[test]
fn an_address_gate_restricted_to_one_interface_rejects_every_other_peer() {
    let iface = SelectedInterface {
        name: "eth0".to_string(),
        ipv4: Some("192.168.1.10".parse().unwrap()),
        ipv6: None,
    };
    let server = WebServer::new(AddressGate::restricted_to(&[iface]));
    assert!(server.gate.is_allowed("192.168.1.10".parse().unwrap()));
    assert!(!server.gate.is_allowed("192.168.1.20".parse().unwrap()));
}

#[test]
fn writing_through_the_virtual_directory_handlers_trait_is_visible_to_a_subsequent_read() {
    use upnp_core::webserver::VirtualDirHandlers;

    let docs = MemoryVirtualDir::new();
    docs.put("/x.bin", "application/octet-stream", b"aaaa".to_vec());
    let cookie = docs.open("/x.bin", OpenMode::Write).unwrap();
    docs.write(cookie, b"bb").unwrap();
    docs.close(cookie).unwrap();

    let cookie = docs.open("/x.bin", OpenMode::Read).unwrap();
    let mut buf = [0u8; 4];
    docs.read(cookie, &mut buf).unwrap();
    assert_eq!(&buf, b"bbaa");
}
