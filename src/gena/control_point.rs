/*!
GENA control-point side (component F): issuing SUBSCRIBE/RENEW/
UNSUBSCRIBE against a remote event URL and reconciling inbound NOTIFY
traffic against the local subscription table.

No teacher equivalent; outbound requests follow the same blocking
`reqwest` shape as [`crate::soap::codec::send_action`] and
[`crate::gena::device::send_notify`].
*/
use crate::error::Error;
use crate::gena::{format_timeout_header, parse_timeout_header, propertyset};
use crate::syntax::*;
use reqwest::blocking::Client;
use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A locally-held subscription to a remote service's events.
#[derive(Clone, Debug)]
pub struct ClientSubscription {
    pub actual_sid: String,
    pub event_sub_url: String,
    pub callback_url: String,
    pub timeout: Option<u64>,
    pub last_key: Option<u32>,
}

impl ClientSubscription {
    /// The absolute unix timestamp at which this subscription should be
    /// renewed, `AUTO_RENEW_MARGIN_SECS` ahead of expiry. `None` for an
    /// infinite-duration subscription (never renews).
    pub fn renew_at(&self, subscribed_at: u64) -> Option<u64> {
        self.timeout
            .map(|t| subscribed_at + t.saturating_sub(AUTO_RENEW_MARGIN_SECS))
    }
}

/// Outcome of reconciling an inbound NOTIFY against the local table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifyReceipt {
    /// SID was known; the property-set is ready for the caller to act on.
    Delivered(Vec<(String, String)>),
    /// SID is not yet known locally because the matching SUBSCRIBE
    /// response has not been processed; the event was buffered and will
    /// be replayed once [`ClientSubscriptions::register`] runs.
    Buffered,
}

/// The process-wide table of outstanding client subscriptions, keyed by
/// the SID the remote device assigned.
#[derive(Debug, Default)]
pub struct ClientSubscriptions {
    by_sid: HashMap<String, ClientSubscription>,
    // Buffers NOTIFY bodies that arrive before `register` runs for their
    // SID (the event-0 race: a fast device can NOTIFY before our
    // SUBSCRIBE response has been processed).
    pending: HashMap<String, Vec<(u32, String)>>,
}

impl ClientSubscriptions {
    pub fn new() -> Self {
        ClientSubscriptions::default()
    }

    /// Record a subscription once the SUBSCRIBE response has been
    /// processed, replaying any NOTIFY bodies buffered for its SID in
    /// the meantime.
    pub fn register(&mut self, subscription: ClientSubscription) -> Vec<(u32, String)> {
        let sid = subscription.actual_sid.clone();
        self.by_sid.insert(sid.clone(), subscription);
        self.pending.remove(&sid).unwrap_or_default()
    }

    pub fn get(&self, sid: &str) -> Option<&ClientSubscription> {
        self.by_sid.get(sid)
    }

    pub fn remove(&mut self, sid: &str) -> Option<ClientSubscription> {
        self.pending.remove(sid);
        self.by_sid.remove(sid)
    }

    pub fn reschedule(&mut self, sid: &str, timeout: Option<u64>) {
        if let Some(sub) = self.by_sid.get_mut(sid) {
            sub.timeout = timeout;
        }
    }

    /// Reconcile an inbound NOTIFY. If `sid` is unknown, the body is
    /// buffered rather than dropped.
    pub fn handle_notify(&mut self, sid: &str, seq: u32, body: &str) -> Result<NotifyReceipt, Error> {
        if let Some(sub) = self.by_sid.get_mut(sid) {
            sub.last_key = Some(seq);
            let vars = propertyset::parse_propertyset(body)?;
            Ok(NotifyReceipt::Delivered(vars))
        } else {
            self.pending
                .entry(sid.to_string())
                .or_default()
                .push((seq, body.to_string()));
            Ok(NotifyReceipt::Buffered)
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Public Functions — outbound
// ------------------------------------------------------------------------------------------------

/// Issue a SUBSCRIBE for a new subscription.
pub fn subscribe(
    event_sub_url: &str,
    callback_url: &str,
    requested_timeout: Option<u64>,
) -> Result<ClientSubscription, Error> {
    let client = request_client()?;
    let response = client
        .request(subscribe_method()?, event_sub_url)
        .header(HEAD_CALLBACK, format!("<{}>", callback_url))
        .header(HEAD_NT, NT_EVENT)
        .header(HEAD_TIMEOUT, format_timeout_header(requested_timeout))
        .send()?;

    if response.status().as_u16() != 200 {
        return Err(Error::SubscribeUnaccepted(response.status().as_u16()));
    }

    let sid = header_value(&response, HEAD_SID)?;
    let timeout = response
        .headers()
        .get(HEAD_TIMEOUT)
        .and_then(|v| v.to_str().ok())
        .map(parse_timeout_header)
        .transpose()?
        .flatten();

    Ok(ClientSubscription {
        actual_sid: sid,
        event_sub_url: event_sub_url.to_string(),
        callback_url: callback_url.to_string(),
        timeout,
        last_key: None,
    })
}

/// Issue a SUBSCRIBE carrying an existing SID: a RENEW. Returns the new
/// timeout.
pub fn renew(
    event_sub_url: &str,
    sid: &str,
    requested_timeout: Option<u64>,
) -> Result<Option<u64>, Error> {
    let client = request_client()?;
    let response = client
        .request(subscribe_method()?, event_sub_url)
        .header(HEAD_SID, sid)
        .header(HEAD_TIMEOUT, format_timeout_header(requested_timeout))
        .send()?;

    if response.status().as_u16() != 200 {
        return Err(Error::SubscribeUnaccepted(response.status().as_u16()));
    }

    response
        .headers()
        .get(HEAD_TIMEOUT)
        .and_then(|v| v.to_str().ok())
        .map(parse_timeout_header)
        .transpose()
        .map(|o| o.flatten())
        .map_err(Error::from)
}

/// Issue an UNSUBSCRIBE. Local state should be dropped regardless of
/// the outcome here.
pub fn unsubscribe(event_sub_url: &str, sid: &str) -> Result<(), Error> {
    let client = request_client()?;
    let method =
        Method::from_bytes(METHOD_UNSUBSCRIBE.as_bytes()).map_err(|e| Error::InternalError(e.to_string()))?;
    let response = client.request(method, event_sub_url).header(HEAD_SID, sid).send()?;
    if response.status().as_u16() != 200 {
        return Err(Error::UnsubscribeUnaccepted(response.status().as_u16()));
    }
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn request_client() -> Result<Client, Error> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_SOAP_TIMEOUT_SECS))
        .build()
        .map_err(Error::from)
}

fn subscribe_method() -> Result<Method, Error> {
    Method::from_bytes(METHOD_SUBSCRIBE.as_bytes()).map_err(|e| Error::InternalError(e.to_string()))
}

fn header_value(response: &reqwest::blocking::Response, name: &str) -> Result<String, Error> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .ok_or_else(|| Error::BadResponse(format!("missing `{}` header", name)))
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> ClientSubscription {
        ClientSubscription {
            actual_sid: "uuid:aaa".to_string(),
            event_sub_url: "http://dev/event".to_string(),
            callback_url: "http://cp/event".to_string(),
            timeout: Some(1801),
            last_key: None,
        }
    }

    #[test]
    fn renew_at_applies_the_auto_renew_margin() {
        let sub = subscription();
        assert_eq!(sub.renew_at(1_000), Some(1_000 + 1801 - AUTO_RENEW_MARGIN_SECS));
    }

    #[test]
    fn infinite_timeout_never_renews() {
        let mut sub = subscription();
        sub.timeout = None;
        assert_eq!(sub.renew_at(1_000), None);
    }

    #[test]
    fn notify_before_register_is_buffered_then_replayed() {
        let mut table = ClientSubscriptions::new();
        let body = propertyset::build_propertyset(&[("Volume".to_string(), "3".to_string())]).unwrap();

        let receipt = table.handle_notify("uuid:aaa", 1, &body).unwrap();
        assert_eq!(receipt, NotifyReceipt::Buffered);

        let replayed = table.register(subscription());
        assert_eq!(replayed, vec![(1, body)]);
    }

    #[test]
    fn notify_after_register_delivers_immediately() {
        let mut table = ClientSubscriptions::new();
        table.register(subscription());
        let body = propertyset::build_propertyset(&[("Volume".to_string(), "7".to_string())]).unwrap();
        let receipt = table.handle_notify("uuid:aaa", 2, &body).unwrap();
        match receipt {
            NotifyReceipt::Delivered(vars) => {
                assert_eq!(vars, vec![("Volume".to_string(), "7".to_string())]);
            }
            _ => panic!("expected delivery"),
        }
        assert_eq!(table.get("uuid:aaa").unwrap().last_key, Some(2));
    }

    #[test]
    fn remove_clears_both_table_and_pending_buffer() {
        let mut table = ClientSubscriptions::new();
        table.register(subscription());
        table.remove("uuid:aaa");
        assert!(table.get("uuid:aaa").is_none());
    }
}
