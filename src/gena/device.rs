/*!
GENA device side (component E): accepting SUBSCRIBE/RENEW/UNSUBSCRIBE
requests against a [`ServiceEntry`], queuing outgoing NOTIFY bodies per
subscription, and delivering them.

No teacher equivalent (the teacher never implemented eventing); the
per-subscription FIFO follows §4.5's size- and age-cap pruning rules,
and the outbound NOTIFY follows the same blocking-`reqwest` shape used
by [`crate::soap::codec::send_action`].
*/
use crate::error::Error;
use crate::gena::{bad_sid, format_timeout_header, generate_sid, parse_callback_header, propertyset};
use crate::service_table::{ServiceEntry, Subscription};
use crate::syntax::*;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// Result of accepting a SUBSCRIBE request.
#[derive(Clone, Debug)]
pub struct SubscribeAccepted {
    pub sid: String,
    pub timeout: Option<u64>,
}

/// Result of accepting a RENEW request.
#[derive(Clone, Debug)]
pub struct RenewAccepted {
    pub timeout: Option<u64>,
}

/// A single queued NOTIFY body awaiting delivery.
#[derive(Clone, Debug)]
struct QueuedEvent {
    key: u32,
    body: String,
    enqueued_at: u64,
}

/// Per-subscription FIFO of pending NOTIFY bodies, capped by both count
/// and age (§4.5).
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<QueuedEvent>,
    max_len: usize,
    max_age_secs: u64,
}

impl EventQueue {
    pub fn new(max_len: usize, max_age_secs: u64) -> Self {
        EventQueue {
            events: VecDeque::new(),
            max_len,
            max_age_secs,
        }
    }

    fn prune(&mut self, now: u64) {
        while let Some(front) = self.events.front() {
            if now.saturating_sub(front.enqueued_at) > self.max_age_secs {
                self.events.pop_front();
            } else {
                break;
            }
        }
        while self.events.len() > self.max_len {
            self.events.pop_front();
        }
    }

    /// Push a new event, then prune. Returns `true` if the queue was
    /// empty before the push (the caller should submit a delivery job).
    /// Pruning after the push, not before, is what makes the length cap
    /// apply to the queue the push just produced rather than lagging it
    /// by one event.
    fn push(&mut self, key: u32, body: String, now: u64) -> bool {
        let was_empty = self.events.is_empty();
        self.events.push_back(QueuedEvent {
            key,
            body,
            enqueued_at: now,
        });
        self.prune(now);
        was_empty
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn pop_front(&mut self) -> Option<(u32, String)> {
        self.events.pop_front().map(|e| (e.key, e.body))
    }
}

/// All live per-subscription queues for one device, keyed by SID.
#[derive(Debug, Default)]
pub struct EventQueues {
    by_sid: HashMap<String, EventQueue>,
    max_len: usize,
    max_age_secs: u64,
}

impl EventQueues {
    pub fn new(max_len: usize, max_age_secs: u64) -> Self {
        EventQueues {
            by_sid: HashMap::new(),
            max_len,
            max_age_secs,
        }
    }

    fn queue_for(&mut self, sid: &str) -> &mut EventQueue {
        self.by_sid
            .entry(sid.to_string())
            .or_insert_with(|| EventQueue::new(self.max_len, self.max_age_secs))
    }

    pub fn remove(&mut self, sid: &str) {
        self.by_sid.remove(sid);
    }

    pub fn pop_front(&mut self, sid: &str) -> Option<(u32, String)> {
        self.by_sid.get_mut(sid).and_then(|q| q.pop_front())
    }
}

/// A NOTIFY ready to send: one subscription's delivery URLs, in order,
/// plus the body and headers to attach.
#[derive(Clone, Debug)]
pub struct NotifyJob {
    pub sid: String,
    pub seq: u32,
    pub delivery_urls: Vec<String>,
    pub body: String,
}

/// Outcome of attempting delivery of one [`NotifyJob`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Delivered; the subscription's event key should advance.
    Delivered,
    /// The peer returned 412 Precondition Failed; the subscription
    /// should be dropped.
    Gone,
    /// Every delivery URL failed or returned an unexpected status; the
    /// subscription is left unchanged.
    Failed,
}

// ------------------------------------------------------------------------------------------------
// Public Functions — subscription lifecycle
// ------------------------------------------------------------------------------------------------

/// Accept an inbound SUBSCRIBE for a fresh subscription (no SID on the
/// request). `max_subscriptions` is the configured cap, if any;
/// `max_timeout` the configured ceiling on requested timeouts.
pub fn handle_subscribe(
    entry: &mut ServiceEntry,
    callback_header: &str,
    requested_timeout: Option<u64>,
    max_subscriptions: Option<usize>,
    max_timeout: Option<u64>,
) -> Result<SubscribeAccepted, Error> {
    let delivery_urls = parse_callback_header(callback_header);
    if delivery_urls.is_empty() {
        return Err(Error::BadRequest(
            "CALLBACK header carried no usable URL".to_string(),
        ));
    }

    if let Some(max) = max_subscriptions {
        if entry.subscriber_count() >= max {
            return Err(Error::TooManySubscriptions);
        }
    }

    let timeout = clamp_timeout(requested_timeout, max_timeout);
    let sid = generate_sid();
    let expiry = expiry_from(timeout);
    entry
        .subscriptions
        .push(Subscription::new(sid.clone(), delivery_urls, expiry));

    debug!("handle_subscribe - accepted sid `{}`", sid);
    Ok(SubscribeAccepted { sid, timeout })
}

/// Accept an inbound SUBSCRIBE that carries an existing SID: a RENEW.
pub fn handle_renew(
    entry: &mut ServiceEntry,
    sid: &str,
    requested_timeout: Option<u64>,
    max_timeout: Option<u64>,
) -> Result<RenewAccepted, Error> {
    let timeout = clamp_timeout(requested_timeout, max_timeout);
    let expiry = expiry_from(timeout);
    let subscription = entry.get_by_sid(sid).ok_or_else(|| bad_sid(sid))?;
    subscription.expiry = expiry;
    Ok(RenewAccepted { timeout })
}

/// Accept an inbound UNSUBSCRIBE.
pub fn handle_unsubscribe(
    entry: &mut ServiceEntry,
    queues: &mut EventQueues,
    sid: &str,
) -> Result<(), Error> {
    entry.remove_by_sid(sid).ok_or_else(|| bad_sid(sid))?;
    queues.remove(sid);
    Ok(())
}

/// Enqueue the initial state dump for a newly accepted subscription and
/// mark it active. Returns the event key assigned to the initial event.
pub fn accept_subscription(
    entry: &mut ServiceEntry,
    queues: &mut EventQueues,
    sid: &str,
    vars: &[(String, String)],
) -> Result<u32, Error> {
    let body = propertyset::build_propertyset(vars)?;
    let now = now_secs();
    let subscription = entry.get_by_sid(sid).ok_or_else(|| bad_sid(sid))?;
    subscription.active = true;
    let key = subscription.advance_key();
    queues.queue_for(sid).push(key, body, now);
    Ok(key)
}

/// Queue a NOTIFY for every active subscription on this service. Returns
/// the SIDs whose queue was empty before this push (these need a
/// delivery job submitted).
pub fn notify_all(
    entry: &mut ServiceEntry,
    queues: &mut EventQueues,
    vars: &[(String, String)],
) -> Result<Vec<String>, Error> {
    let body = propertyset::build_propertyset(vars)?;
    let now = now_secs();
    let mut needs_dispatch = Vec::new();
    for subscription in entry.subscriptions.iter_mut().filter(|s| s.active) {
        let key = subscription.advance_key();
        let was_empty = queues.queue_for(&subscription.sid).push(key, body.clone(), now);
        if was_empty {
            needs_dispatch.push(subscription.sid.clone());
        }
    }
    Ok(needs_dispatch)
}

/// Pop the next queued event for `sid` and build the job to deliver it.
pub fn build_notify_job(
    entry: &ServiceEntry,
    queues: &mut EventQueues,
    sid: &str,
) -> Option<NotifyJob> {
    let subscription = entry.subscriptions.iter().find(|s| s.sid == sid)?;
    let (key, body) = queues.pop_front(sid)?;
    Some(NotifyJob {
        sid: sid.to_string(),
        seq: key,
        delivery_urls: subscription.delivery_urls.clone(),
        body,
    })
}

// ------------------------------------------------------------------------------------------------
// Public Functions — delivery
// ------------------------------------------------------------------------------------------------

/// Build the headers for one NOTIFY attempt.
pub fn notify_headers(job: &NotifyJob) -> Vec<(&'static str, String)> {
    vec![
        (CONTENT_TYPE.as_str(), SOAP_CONTENT_TYPE.to_string()),
        (HEAD_NT, NT_EVENT.to_string()),
        (HEAD_NTS, NTS_PROPCHANGE.to_string()),
        (HEAD_SID, job.sid.clone()),
        (HEAD_SEQ, job.seq.to_string()),
    ]
}

/// Deliver `job` to its delivery URLs in order, stopping at the first
/// that accepts it. A 412 response removes the subscription outright;
/// any other failure leaves state unchanged so the next `notify_all`
/// attempt resends the same key.
pub fn send_notify(job: &NotifyJob) -> Result<NotifyOutcome, Error> {
    let client = Client::builder()
        .timeout(Duration::from_secs(DEFAULT_SOAP_TIMEOUT_SECS))
        .build()?;
    let notify = Method::from_bytes(METHOD_NOTIFY.as_bytes())
        .map_err(|e| Error::InternalError(e.to_string()))?;

    for url in &job.delivery_urls {
        let mut headers = HeaderMap::new();
        for (name, value) in notify_headers(job) {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                headers.insert(name, value);
            }
        }

        let result = client
            .request(notify.clone(), url)
            .headers(headers)
            .body(job.body.clone())
            .send();

        match result {
            Ok(response) if response.status().as_u16() == 200 => return Ok(NotifyOutcome::Delivered),
            Ok(response) if response.status().as_u16() == 412 => return Ok(NotifyOutcome::Gone),
            Ok(response) => warn!(
                "send_notify - `{}` rejected sid `{}` with status {}",
                url,
                job.sid,
                response.status()
            ),
            Err(e) => warn!("send_notify - delivery to `{}` failed: {}", url, e),
        }
    }
    Ok(NotifyOutcome::Failed)
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn clamp_timeout(requested: Option<u64>, max: Option<u64>) -> Option<u64> {
    let requested = requested.unwrap_or(DEFAULT_SUBSCRIPTION_TIMEOUT);
    match max {
        Some(max) => Some(requested.min(max)),
        None => Some(requested),
    }
}

fn expiry_from(timeout: Option<u64>) -> u64 {
    match timeout {
        None => 0,
        Some(secs) => now_secs() + secs,
    }
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
    use crate::description::TypeID;

    fn entry() -> ServiceEntry {
        ServiceEntry {
            udn: "uuid:1-2-3".to_string(),
            service_type: TypeID::new_service("RenderingControl".to_string(), "1".to_string()),
            service_id: "urn:upnp-org:serviceId:RenderingControl".to_string(),
            scpd_url: "http://h/scpd.xml".to_string(),
            control_url: "http://h/control".to_string(),
            event_sub_url: "http://h/event".to_string(),
            active: true,
            subscriptions: vec![],
        }
    }

    #[test]
    fn subscribe_requires_a_callback_url() {
        let mut e = entry();
        let result = handle_subscribe(&mut e, "", None, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn subscribe_clamps_timeout_to_configured_max() {
        let mut e = entry();
        let accepted =
            handle_subscribe(&mut e, "<http://cp/event>", Some(99999), None, Some(3600)).unwrap();
        assert_eq!(accepted.timeout, Some(3600));
        assert_eq!(e.subscriber_count(), 1);
    }

    #[test]
    fn subscribe_rejects_when_at_capacity() {
        let mut e = entry();
        handle_subscribe(&mut e, "<http://cp/event1>", None, Some(1), None).unwrap();
        let result = handle_subscribe(&mut e, "<http://cp/event2>", None, Some(1), None);
        assert!(result.is_err());
    }

    #[test]
    fn renew_updates_expiry_without_new_sid() {
        let mut e = entry();
        let accepted = handle_subscribe(&mut e, "<http://cp/event>", Some(60), None, None).unwrap();
        let renewed = handle_renew(&mut e, &accepted.sid, Some(120), None).unwrap();
        assert_eq!(renewed.timeout, Some(120));
    }

    #[test]
    fn renew_unknown_sid_fails() {
        let mut e = entry();
        assert!(handle_renew(&mut e, "uuid:none", Some(60), None).is_err());
    }

    #[test]
    fn unsubscribe_removes_subscription_and_queue() {
        let mut e = entry();
        let mut queues = EventQueues::new(10, 10);
        let accepted = handle_subscribe(&mut e, "<http://cp/event>", None, None, None).unwrap();
        handle_unsubscribe(&mut e, &mut queues, &accepted.sid).unwrap();
        assert_eq!(e.subscriber_count(), 0);
    }

    #[test]
    fn accept_subscription_enqueues_initial_dump() {
        let mut e = entry();
        let mut queues = EventQueues::new(10, 10);
        let accepted = handle_subscribe(&mut e, "<http://cp/event>", None, None, None).unwrap();
        let key = accept_subscription(
            &mut e,
            &mut queues,
            &accepted.sid,
            &[("Volume".to_string(), "10".to_string())],
        )
        .unwrap();
        assert_eq!(key, 1);
        let job = build_notify_job(&e, &mut queues, &accepted.sid).unwrap();
        assert!(job.body.contains("Volume"));
        assert_eq!(job.seq, 1);
    }

    #[test]
    fn notify_all_only_reaches_active_subscriptions() {
        let mut e = entry();
        let mut queues = EventQueues::new(10, 10);
        let accepted = handle_subscribe(&mut e, "<http://cp/event>", None, None, None).unwrap();
        // not yet marked active by accept_subscription
        let needing_dispatch =
            notify_all(&mut e, &mut queues, &[("Volume".to_string(), "5".to_string())]).unwrap();
        assert!(needing_dispatch.is_empty());
        accept_subscription(&mut e, &mut queues, &accepted.sid, &[]).unwrap();
        let needing_dispatch =
            notify_all(&mut e, &mut queues, &[("Volume".to_string(), "5".to_string())]).unwrap();
        assert_eq!(needing_dispatch, vec![accepted.sid]);
    }

    #[test]
    fn queue_caps_by_length_dropping_oldest() {
        let mut queue = EventQueue::new(2, 3600);
        queue.push(1, "a".to_string(), 0);
        queue.push(2, "b".to_string(), 0);
        queue.push(3, "c".to_string(), 0);
        assert_eq!(queue.pop_front(), Some((2, "b".to_string())));
        assert_eq!(queue.pop_front(), Some((3, "c".to_string())));
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn queue_prunes_by_age() {
        let mut queue = EventQueue::new(10, 5);
        queue.push(1, "a".to_string(), 0);
        queue.push(2, "b".to_string(), 10);
        assert_eq!(queue.pop_front(), Some((2, "b".to_string())));
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn notify_headers_carry_sid_and_seq() {
        let job = NotifyJob {
            sid: "uuid:x".to_string(),
            seq: 7,
            delivery_urls: vec!["http://cp/event".to_string()],
            body: "<e:propertyset/>".to_string(),
        };
        let headers = notify_headers(&job);
        assert!(headers.iter().any(|(n, v)| *n == HEAD_SID && v == "uuid:x"));
        assert!(headers.iter().any(|(n, v)| *n == HEAD_SEQ && v == "7"));
    }

    #[test]
    fn timeout_is_formatted_for_the_response_header() {
        assert_eq!(format_timeout_header(Some(1801)), "Second-1801");
    }
}
