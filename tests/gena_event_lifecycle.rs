//! End-to-end GENA device-side lifecycle against a service table built
//! from a parsed description: subscribe, initial dump, notify-all,
//! queue-cap enforcement, renew, and unsubscribe (§4.5, §8).

use upnp_core::description::device::{DeviceDesc, ServiceDesc};
use upnp_core::description::TypeID;
use upnp_core::gena::device::{self as gena_device, EventQueues};
use upnp_core::service_table;

fn rendering_control_device() -> DeviceDesc {
    DeviceDesc {
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
            scpd_url: "http://h/rc.xml".to_string(),
            control_url: "http://h/control".to_string(),
            event_sub_url: "http://h/event".to_string(),
        }],
        device_list: vec![],
        presentation_url: None,
    }
}

#[test]
fn subscribe_then_accept_delivers_the_initial_dump_before_any_state_change() {
    let device = rendering_control_device();
    let mut table = service_table::init_from_description(&device);
    let entry = table.find_by_service_id("urn:upnp-org:serviceId:RenderingControl", "uuid:renderer").unwrap();
    let mut queues = EventQueues::new(8, 3600);

    let accepted = gena_device::handle_subscribe(entry, "<http://cp/event>", Some(300), None, None).unwrap();
    assert_eq!(accepted.timeout, Some(300));

    gena_device::accept_subscription(entry, &mut queues, &accepted.sid, &[("Volume".to_string(), "10".to_string())]).unwrap();
    let job = gena_device::build_notify_job(entry, &mut queues, &accepted.sid).unwrap();
    assert_eq!(job.seq, 1);
    assert!(job.body.contains("Volume"));
    assert!(job.body.contains("10"));
    assert_eq!(job.delivery_urls, vec!["http://cp/event".to_string()]);

    // queue drained; no job pending until the next notify
    assert!(gena_device::build_notify_job(entry, &mut queues, &accepted.sid).is_none());
}

#[test]
fn notify_all_reaches_only_active_subscriptions_and_advances_the_event_key() {
    let device = rendering_control_device();
    let mut table = service_table::init_from_description(&device);
    let entry = table.find_by_service_id("urn:upnp-org:serviceId:RenderingControl", "uuid:renderer").unwrap();
    let mut queues = EventQueues::new(8, 3600);

    let pending = gena_device::handle_subscribe(entry, "<http://cp/pending>", None, None, None).unwrap();
    let active = gena_device::handle_subscribe(entry, "<http://cp/active>", None, None, None).unwrap();
    gena_device::accept_subscription(entry, &mut queues, &active.sid, &[]).unwrap();
    gena_device::build_notify_job(entry, &mut queues, &active.sid); // drain the initial dump

    let needs_dispatch = gena_device::notify_all(entry, &mut queues, &[("Mute".to_string(), "1".to_string())]).unwrap();
    // `pending` never had accept_subscription called, so it is not active yet
    assert_eq!(needs_dispatch, vec![active.sid.clone()]);
    assert!(!needs_dispatch.contains(&pending.sid));

    let job = gena_device::build_notify_job(entry, &mut queues, &active.sid).unwrap();
    assert_eq!(job.seq, 2, "second event for this subscription");
}

#[test]
fn queue_cap_drops_the_oldest_event_once_max_len_is_exceeded() {
    let device = rendering_control_device();
    let mut table = service_table::init_from_description(&device);
    let entry = table.find_by_service_id("urn:upnp-org:serviceId:RenderingControl", "uuid:renderer").unwrap();
    let mut queues = EventQueues::new(2, 3600);

    let accepted = gena_device::handle_subscribe(entry, "<http://cp/event>", None, None, None).unwrap();
    gena_device::accept_subscription(entry, &mut queues, &accepted.sid, &[]).unwrap(); // seq 1

    for vol in ["5", "6", "7"] {
        gena_device::notify_all(entry, &mut queues, &[("Volume".to_string(), vol.to_string())]).unwrap();
    }
    // seq 1 (initial dump) and seq 2 (vol=5) should have been pruned,
    // leaving only the two most recent (vol=6, vol=7) under a cap of 2.
    let first = gena_device::build_notify_job(entry, &mut queues, &accepted.sid).unwrap();
    assert_eq!(first.seq, 3);
    let second = gena_device::build_notify_job(entry, &mut queues, &accepted.sid).unwrap();
    assert_eq!(second.seq, 4);
    assert!(gena_device::build_notify_job(entry, &mut queues, &accepted.sid).is_none());
}

#[test]
fn renew_extends_expiry_without_changing_the_sid_and_unsubscribe_drops_the_queue() {
    let device = rendering_control_device();
    let mut table = service_table::init_from_description(&device);
    let entry = table.find_by_service_id("urn:upnp-org:serviceId:RenderingControl", "uuid:renderer").unwrap();
    let mut queues = EventQueues::new(8, 3600);

    let accepted = gena_device::handle_subscribe(entry, "<http://cp/event>", Some(60), None, Some(3600)).unwrap();
    let renewed = gena_device::handle_renew(entry, &accepted.sid, Some(120), Some(3600)).unwrap();
    assert_eq!(renewed.timeout, Some(120));
    assert_eq!(entry.subscriber_count(), 1);

    gena_device::accept_subscription(entry, &mut queues, &accepted.sid, &[]).unwrap();
    gena_device::handle_unsubscribe(entry, &mut queues, &accepted.sid).unwrap();
    assert_eq!(entry.subscriber_count(), 0);
    assert!(gena_device::build_notify_job(entry, &mut queues, &accepted.sid).is_none());
}

#[test]
fn subscribe_requested_timeout_is_clamped_to_the_configured_maximum() {
    let device = rendering_control_device();
    let mut table = service_table::init_from_description(&device);
    let entry = table.find_by_service_id("urn:upnp-org:serviceId:RenderingControl", "uuid:renderer").unwrap();

    let accepted = gena_device::handle_subscribe(entry, "<http://cp/event>", Some(99_999), None, Some(1800)).unwrap();
    assert_eq!(accepted.timeout, Some(1800));
}
