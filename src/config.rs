/*!
Runtime configuration (§6): the knobs passed to [`crate::runtime::Runtime::init`],
each with the default the spec pins when the caller leaves it unset.

No teacher equivalent (the teacher's demo hardcoded everything); shaped
like a plain builder-friendly struct rather than the teacher's CLI-flag
approach, since this is a library entry point rather than a binary.
*/
use crate::syntax::*;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// Configuration for one runtime instance.
#[derive(Clone, Debug)]
pub struct Config {
    /// `"*"` (all eligible interfaces), empty (first eligible), or a
    /// comma-separated list of interface names.
    pub interface_spec: String,
    /// Preferred port for the HTTP daemon; `0` lets the OS choose.
    pub port: u16,
    /// Whether to also bind an IPv6 socket and join the IPv6 SSDP group.
    pub ipv6: bool,
    /// How long `init` waits for the requested interfaces to appear.
    pub network_wait_secs: u64,
    /// Maximum accepted request body size, in bytes.
    pub max_content_length: usize,
    /// Per-subscription pending-event cap.
    pub event_queue_max_len: usize,
    /// Per-subscription pending-event age cap, in seconds.
    pub event_queue_max_age_secs: u64,
    /// Maximum concurrent subscriptions per service; `None` is
    /// unlimited.
    pub max_subscriptions: Option<usize>,
    /// Ceiling applied to a subscriber's requested TIMEOUT; `None`
    /// leaves the requested value unclamped.
    pub max_subscription_timeout: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interface_spec: String::new(),
            port: 0,
            ipv6: false,
            network_wait_secs: DEFAULT_NETWORK_WAIT_SECS,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            event_queue_max_len: DEFAULT_EVENT_QUEUE_MAX_LEN,
            event_queue_max_age_secs: DEFAULT_EVENT_QUEUE_MAX_AGE_SECS,
            max_subscriptions: None,
            max_subscription_timeout: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    pub fn with_interface_spec<S: Into<String>>(mut self, spec: S) -> Self {
        self.interface_spec = spec.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }

    pub fn with_network_wait_secs(mut self, secs: u64) -> Self {
        self.network_wait_secs = secs;
        self
    }

    pub fn with_max_content_length(mut self, bytes: usize) -> Self {
        self.max_content_length = bytes;
        self
    }

    pub fn with_event_queue_max_len(mut self, len: usize) -> Self {
        self.event_queue_max_len = len;
        self
    }

    pub fn with_event_queue_max_age_secs(mut self, secs: u64) -> Self {
        self.event_queue_max_age_secs = secs;
        self
    }

    pub fn with_max_subscriptions(mut self, max: Option<usize>) -> Self {
        self.max_subscriptions = max;
        self
    }

    pub fn with_max_subscription_timeout(mut self, max: Option<u64>) -> Self {
        self.max_subscription_timeout = max;
        self
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = Config::default();
        assert_eq!(config.event_queue_max_len, DEFAULT_EVENT_QUEUE_MAX_LEN);
        assert_eq!(config.event_queue_max_age_secs, DEFAULT_EVENT_QUEUE_MAX_AGE_SECS);
        assert_eq!(config.max_content_length, DEFAULT_MAX_CONTENT_LENGTH);
        assert_eq!(config.network_wait_secs, DEFAULT_NETWORK_WAIT_SECS);
        assert!(config.max_subscriptions.is_none());
    }

    #[test]
    fn builder_overrides_apply() {
        let config = Config::new().with_port(49152).with_ipv6(true).with_max_subscriptions(Some(32));
        assert_eq!(config.port, 49152);
        assert!(config.ipv6);
        assert_eq!(config.max_subscriptions, Some(32));
    }
}
