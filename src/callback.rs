/*!
The event model (§3, §7): every asynchronous occurrence the runtime
surfaces to the embedding application arrives as an [`Event`] through a
registered [`Callback`], rather than through a return value, since
discovery, subscription, and delivery are all driven by network
traffic the caller does not directly initiate.

No teacher equivalent (the teacher was a synchronous CLI demo with no
callback surface); shaped after the scoped event-enum-plus-trait
pattern used in `other_examples/echelon-wemo.rs` for device event
dispatch.
*/
use crate::description::TypeID;
use crate::soap::codec::ActionOutcome;
use std::sync::{Arc, Mutex};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// The out-parameter slot a [`Callback`] writes an action's outcome
/// into. `ControlActionRequest` is delivered synchronously (§4.4: "the
/// handler blocks while the application callback is in flight") and the
/// dispatcher reads this after `Callback::handle` returns, rather than
/// via a return value, since the callback ABI is otherwise uniform
/// across every event type.
#[derive(Clone, Debug, Default)]
pub struct ActionResponder(Arc<Mutex<Option<ActionOutcome>>>);

impl ActionResponder {
    pub fn new() -> Self {
        ActionResponder::default()
    }

    /// Record the action's outcome. A second call overwrites the first.
    pub fn respond(&self, outcome: ActionOutcome) {
        *self.0.lock().unwrap() = Some(outcome);
    }

    /// Take the recorded outcome, if the callback set one.
    pub fn take(&self) -> Option<ActionOutcome> {
        self.0.lock().unwrap().take()
    }
}

/// One asynchronous occurrence reported to a registered [`Callback`].
#[derive(Clone, Debug)]
pub enum Event {
    /// A SOAP action request has arrived for a registered device. The
    /// application writes the result through `response` before
    /// `Callback::handle` returns.
    ControlActionRequest {
        udn: String,
        service_id: String,
        action_name: String,
        args: Vec<(String, String)>,
        response: ActionResponder,
    },
    /// An `ssdp:alive` advertisement was observed by a control point.
    DiscoveryAdvertisementAlive {
        usn: String,
        device_type: Option<TypeID>,
        location: String,
        max_age: u64,
    },
    /// An `ssdp:byebye` advertisement was observed by a control point.
    DiscoveryAdvertisementByeBye { usn: String },
    /// One M-SEARCH response has been received.
    DiscoverySearchResult {
        usn: String,
        st: String,
        location: String,
        max_age: u64,
    },
    /// The MX window for a search has elapsed.
    DiscoverySearchTimeout { search_id: u64 },
    /// A SUBSCRIBE has been accepted for one of this process's devices.
    EventSubscriptionRequest {
        udn: String,
        service_id: String,
        sid: String,
    },
    /// A NOTIFY has been received and parsed for an active client
    /// subscription.
    EventReceived {
        sid: String,
        seq: u32,
        changed_vars: Vec<(String, String)>,
    },
    /// An auto-renewal attempt for a client subscription failed.
    EventAutorenewalFailed { sid: String, status: Option<u16> },
    /// A client subscription expired without a successful renewal.
    EventSubscriptionExpired { sid: String },
}

/// Implemented by the embedding application to receive [`Event`]s.
/// `handle` is called synchronously on whichever worker thread observed
/// the occurrence; long-running work should be handed off rather than
/// performed inline.
pub trait Callback: Send + Sync {
    fn handle(&self, event: Event);
}

impl<F> Callback for F
where
    F: Fn(Event) + Send + Sync,
{
    fn handle(&self, event: Event) {
        self(event)
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
