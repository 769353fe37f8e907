/*!
Request dispatch (component H): classifies an inbound HTTP request by
method and headers into the component that should handle it, decodes
the legacy M-POST SOAP framing back into a plain SOAPACTION lookup, and
provides the stop-signal the mini-server's accept loop polls on
shutdown.

No teacher equivalent (the teacher never ran an HTTP daemon); routing
table shaped after the method/header dispatch table described in §4
rather than anything in the example pack, since none of the examples
implement a UPnP-specific HTTP front door.
*/
use crate::syntax::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// Which component should handle an inbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// POST with a `SOAPACTION` header.
    Soap,
    /// `M-POST` framing; the SOAPACTION-equivalent header name must
    /// still be resolved via the `MAN` header before the body can be
    /// routed, see [`mpost_soapaction_header_name`].
    SoapDeprecated,
    /// `NOTIFY`, routed to the control-point side.
    Notify,
    /// `SUBSCRIBE` without a `SID` header: a new subscription.
    SubscribeNew,
    /// `SUBSCRIBE` carrying a `SID` header: a renewal.
    SubscribeRenew,
    /// `UNSUBSCRIBE`.
    Unsubscribe,
    /// `GET`/`HEAD`, routed to the web server.
    Web,
    /// Anything else: respond 501.
    Unsupported,
}

/// A minimal, transport-agnostic HTTP response the dispatcher's callers
/// build for every route.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header<S1: Into<String>, S2: Into<String>>(mut self, name: S1, value: S2) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

/// A handle the HTTP daemon's accept loop polls (via tiny_http's
/// `recv_timeout`) to learn it should stop. tiny_http blocks inside
/// libc accept() with no exposed wakeup fd, so a short poll interval
/// stands in for the self-pipe trick used by servers with raw socket
/// access.
#[derive(Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        StopSignal(Arc::new(AtomicBool::new(false)))
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        StopSignal::new()
    }
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Classify a request by method and the presence of a couple of
/// distinguishing headers.
pub fn route_request(method: &str, has_soap_action: bool, has_sid: bool) -> Route {
    match method.to_ascii_uppercase().as_str() {
        "POST" if has_soap_action => Route::Soap,
        m if m == METHOD_MPOST => Route::SoapDeprecated,
        m if m == METHOD_NOTIFY => Route::Notify,
        m if m == METHOD_SUBSCRIBE => {
            if has_sid {
                Route::SubscribeRenew
            } else {
                Route::SubscribeNew
            }
        }
        m if m == METHOD_UNSUBSCRIBE => Route::Unsubscribe,
        "GET" | "HEAD" => Route::Web,
        _ => Route::Unsupported,
    }
}

/// Parse the `ns=NN` parameter out of an M-POST request's `MAN` header,
/// e.g. `"http://schemas.xmlsoap.org/soap/envelope/"; ns=01`.
pub fn parse_man_namespace(man_header: &str) -> Option<String> {
    man_header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("ns=").map(|ns| ns.trim().to_string()))
}

/// Build the header name carrying the SOAPACTION-equivalent for an
/// M-POST request: `"{ns}-SOAPACTION"`.
pub fn mpost_soapaction_header_name(man_header: &str) -> Option<String> {
    parse_man_namespace(man_header).map(|ns| format!("{}-SOAPACTION", ns))
}

/// The standard 501 response for an unrecognized method.
pub fn not_implemented() -> HttpResponse {
    HttpResponse::new(501).with_header("Content-Length", "0")
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_with_soapaction_routes_to_soap() {
        assert_eq!(route_request("POST", true, false), Route::Soap);
    }

    #[test]
    fn mpost_routes_to_soap_deprecated() {
        assert_eq!(route_request("M-POST", false, false), Route::SoapDeprecated);
    }

    #[test]
    fn subscribe_without_sid_is_new() {
        assert_eq!(route_request("SUBSCRIBE", false, false), Route::SubscribeNew);
    }

    #[test]
    fn subscribe_with_sid_is_renew() {
        assert_eq!(route_request("SUBSCRIBE", false, true), Route::SubscribeRenew);
    }

    #[test]
    fn notify_routes_to_control_point() {
        assert_eq!(route_request("NOTIFY", false, false), Route::Notify);
    }

    #[test]
    fn get_and_head_route_to_web() {
        assert_eq!(route_request("GET", false, false), Route::Web);
        assert_eq!(route_request("HEAD", false, false), Route::Web);
    }

    #[test]
    fn unknown_method_is_unsupported() {
        assert_eq!(route_request("TRACE", false, false), Route::Unsupported);
    }

    #[test]
    fn man_namespace_is_extracted() {
        let man = "\"http://schemas.xmlsoap.org/soap/envelope/\"; ns=01";
        assert_eq!(parse_man_namespace(man).as_deref(), Some("01"));
        assert_eq!(
            mpost_soapaction_header_name(man).as_deref(),
            Some("01-SOAPACTION")
        );
    }

    #[test]
    fn stop_signal_starts_clear_and_latches() {
        let signal = StopSignal::new();
        assert!(!signal.is_set());
        signal.trigger();
        assert!(signal.is_set());
    }
}
