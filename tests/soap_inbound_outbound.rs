//! SOAP envelope build/parse against a service resolved from a real
//! service table, mirroring the path `handle_soap` takes in the
//! runtime: resolve by control URL, validate the SOAPACTION header,
//! then parse the envelope (§4.4).

use upnp_core::description::TypeID;
use upnp_core::service_table::{self, ServiceEntry};
use upnp_core::soap::codec::{build_inbound_response, parse_inbound_request};
use upnp_core::soap::{build_action_envelope, parse_soap_action_header, soap_action_header};
use upnp_core::syntax::SOAP_CONTENT_TYPE;

fn entry(version: &str) -> ServiceEntry {
    ServiceEntry {
        udn: "uuid:1-2-3".to_string(),
        service_type: TypeID::new_service("RenderingControl".to_string(), version.to_string()),
        service_id: "urn:upnp-org:serviceId:RenderingControl".to_string(),
        scpd_url: "http://h/scpd.xml".to_string(),
        control_url: "http://h/control".to_string(),
        event_sub_url: "http://h/event".to_string(),
        active: true,
        subscriptions: vec![],
    }
}

#[test]
fn action_call_matches_a_service_with_a_different_version_in_the_table() {
    let caller_service_type = TypeID::new_service("RenderingControl".to_string(), "1".to_string());
    let body = build_action_envelope(
        &caller_service_type,
        "SetVolume",
        &[("InstanceID".to_string(), "0".to_string()), ("DesiredVolume".to_string(), "20".to_string())],
    )
    .unwrap();
    let header = soap_action_header(&caller_service_type, "SetVolume");

    // table carries version 2 of the same service -- §4.4 requires the
    // match to ignore the trailing version component.
    let parsed = parse_inbound_request(&entry("2"), SOAP_CONTENT_TYPE, &header, &body).unwrap();
    assert_eq!(parsed.action_name, "SetVolume");
    assert_eq!(parsed.args, vec![("InstanceID".to_string(), "0".to_string()), ("DesiredVolume".to_string(), "20".to_string())]);
}

#[test]
fn action_call_against_an_unrelated_service_type_is_rejected() {
    let wrong_service = TypeID::new_service("AVTransport".to_string(), "1".to_string());
    let body = build_action_envelope(&wrong_service, "Play", &[]).unwrap();
    let header = soap_action_header(&wrong_service, "Play");
    assert!(parse_inbound_request(&entry("1"), SOAP_CONTENT_TYPE, &header, &body).is_err());
}

#[test]
fn soapaction_header_round_trips_through_parse() {
    let service = TypeID::new_service("RenderingControl".to_string(), "1".to_string());
    let header = soap_action_header(&service, "GetVolume");
    let (service_type_str, action_name) = parse_soap_action_header(&header).unwrap();
    assert_eq!(action_name, "GetVolume");
    assert_eq!(service_type_str, service.to_string());
}

#[test]
fn successful_action_result_and_upnp_error_fault_produce_the_documented_status_codes() {
    let service = TypeID::new_service("RenderingControl".to_string(), "1".to_string());
    let (status, body) =
        build_inbound_response(&service, "SetVolume", 0, "", &[("CurrentVolume".to_string(), "20".to_string())]).unwrap();
    assert_eq!(status, 200);
    assert!(body.contains("SetVolumeResponse"));

    let (status, body) = build_inbound_response(&service, "SetVolume", 402, "Invalid Args", &[]).unwrap();
    assert_eq!(status, 500);
    assert!(body.contains("402"));
    assert!(body.contains("UPnPError"));
}

#[test]
fn action_built_then_routed_by_a_service_table_resolves_to_the_registered_entry() {
    use upnp_core::description::device::{DeviceDesc, ServiceDesc};

    let device = DeviceDesc {
        device_type: TypeID::new_device("MediaRenderer".to_string(), "1".to_string()),
        friendly_name: "Renderer".to_string(),
        manufacturer: "Acme".to_string(),
        manufacturer_url: None,
        model_description: None,
        model_name: "x".to_string(),
        model_number: None,
        model_url: None,
        serial_number: None,
        udn: "uuid:renderer".to_string(),
        upc: None,
        icon_list: vec![],
        service_list: vec![ServiceDesc {
            service_type: TypeID::new_service("RenderingControl".to_string(), "1".to_string()),
            service_id: "urn:upnp-org:serviceId:RenderingControl".to_string(),
            scpd_url: "http://h:1/rc.xml".to_string(),
            control_url: "http://h:1/upnp/1/control".to_string(),
            event_sub_url: "http://h:1/upnp/1/event".to_string(),
        }],
        device_list: vec![],
        presentation_url: None,
    };

    let mut table = service_table::init_from_description(&device);
    let entry = table.find_by_control_path("/upnp/1/control").expect("control path resolves");

    let service = TypeID::new_service("RenderingControl".to_string(), "1".to_string());
    let body = build_action_envelope(&service, "GetVolume", &[("InstanceID".to_string(), "0".to_string())]).unwrap();
    let header = soap_action_header(&service, "GetVolume");
    let parsed = parse_inbound_request(entry, SOAP_CONTENT_TYPE, &header, &body).unwrap();
    assert_eq!(parsed.action_name, "GetVolume");
}
