//! Control-point side subscription table composed with the property-set
//! codec, at the level a NOTIFY handler on an embedder's HTTP callback
//! would actually see it (§4.5, §4.6).

use upnp_core::gena::control_point::{ClientSubscription, ClientSubscriptions, NotifyReceipt};
use upnp_core::gena::propertyset::build_propertyset;
use upnp_core::gena::{format_timeout_header, parse_timeout_header};

fn subscription(sid: &str) -> ClientSubscription {
    ClientSubscription {
        actual_sid: sid.to_string(),
        event_sub_url: "http://device/event".to_string(),
        callback_url: "http://cp/event".to_string(),
        timeout: Some(1801),
        last_key: None,
    }
}

#[test]
fn a_notify_that_beats_the_subscribe_response_is_buffered_then_replayed_in_order() {
    let mut table = ClientSubscriptions::new();
    let first = build_propertyset(&[("Volume".to_string(), "3".to_string())]).unwrap();
    let second = build_propertyset(&[("Volume".to_string(), "4".to_string())]).unwrap();

    assert_eq!(
        table.handle_notify("uuid:race", 1, &first).unwrap(),
        NotifyReceipt::Buffered
    );
    assert_eq!(
        table.handle_notify("uuid:race", 2, &second).unwrap(),
        NotifyReceipt::Buffered
    );

    let replayed = table.register(subscription("uuid:race"));
    assert_eq!(replayed, vec![(1, first), (2, second)]);

    // once registered, later NOTIFYs deliver immediately and update last_key
    let third = build_propertyset(&[("Volume".to_string(), "5".to_string())]).unwrap();
    match table.handle_notify("uuid:race", 3, &third).unwrap() {
        NotifyReceipt::Delivered(vars) => {
            assert_eq!(vars, vec![("Volume".to_string(), "5".to_string())])
        }
        other => panic!("expected delivery, got {:?}", other),
    }
    assert_eq!(table.get("uuid:race").unwrap().last_key, Some(3));
}

#[test]
fn renew_at_schedules_ahead_of_expiry_by_the_auto_renew_margin_and_reschedule_updates_it() {
    let mut table = ClientSubscriptions::new();
    table.register(subscription("uuid:sched"));

    let sub = table.get("uuid:sched").unwrap();
    let subscribed_at = 1_000_000u64;
    let first_renew_at = sub.renew_at(subscribed_at).unwrap();
    assert!(first_renew_at < subscribed_at + sub.timeout.unwrap());

    // a RENEW response shortens the timeout; reschedule should reflect it
    table.reschedule("uuid:sched", Some(300));
    let sub = table.get("uuid:sched").unwrap();
    let second_renew_at = sub.renew_at(subscribed_at).unwrap();
    assert!(second_renew_at < first_renew_at);
}

#[test]
fn an_infinite_timeout_subscription_never_schedules_a_renewal() {
    let mut sub = subscription("uuid:forever");
    sub.timeout = None;
    assert_eq!(sub.renew_at(1_000_000), None);
}

#[test]
fn unsubscribing_drops_both_the_live_entry_and_any_buffered_backlog() {
    let mut table = ClientSubscriptions::new();
    let body = build_propertyset(&[("Mute".to_string(), "1".to_string())]).unwrap();
    table.handle_notify("uuid:gone", 1, &body).unwrap();
    table.register(subscription("uuid:gone"));

    assert!(table.remove("uuid:gone").is_some());
    assert!(table.get("uuid:gone").is_none());

    // a NOTIFY arriving after removal is buffered again rather than
    // delivered against stale state
    assert_eq!(
        table.handle_notify("uuid:gone", 2, &body).unwrap(),
        NotifyReceipt::Buffered
    );
}

#[test]
fn timeout_header_format_matches_what_parse_timeout_header_accepts() {
    for requested in [None, Some(0u64), Some(1801), Some(86400)] {
        let header = format_timeout_header(requested);
        assert_eq!(parse_timeout_header(&header).unwrap(), requested);
    }
}
