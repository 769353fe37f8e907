/*!
GENA (General Event Notification Architecture): subscription lifecycle
and event delivery, split into the device side ([`device`], component
E) and the control-point side ([`control_point`], component F), sharing
the property-set codec ([`propertyset`]) and the header parsing helpers
below.

No equivalent exists in the teacher (it never implemented eventing);
header parsing follows the same lazy_static-regex style the teacher
uses in `ssdp/search.rs` for SSDP headers.
*/
use crate::error::{invalid_header_value, Error, MessageFormatError};
use crate::syntax::{TIMEOUT_INFINITE, TIMEOUT_SECOND_PREFIX};
use uuid::Uuid;

pub mod control_point;
pub mod device;
pub mod propertyset;

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Generate a fresh SID of the form `"uuid:" + 36-char hex/dash UUID`.
pub fn generate_sid() -> String {
    format!("uuid:{}", Uuid::new_v4())
}

/// Parse a `TIMEOUT: Second-N` or `TIMEOUT: Second-infinite` header
/// value. Returns `None` for infinite.
pub fn parse_timeout_header(value: &str) -> Result<Option<u64>, MessageFormatError> {
    let trimmed = value.trim();
    let rest = trimmed
        .strip_prefix(TIMEOUT_SECOND_PREFIX)
        .ok_or_else(|| invalid_header_value("TIMEOUT", value))?;
    if rest == TIMEOUT_INFINITE {
        Ok(None)
    } else {
        rest.parse()
            .map(Some)
            .map_err(|_| invalid_header_value("TIMEOUT", value))
    }
}

/// Format a timeout value for the `TIMEOUT` header.
pub fn format_timeout_header(seconds: Option<u64>) -> String {
    match seconds {
        None => format!("{}{}", TIMEOUT_SECOND_PREFIX, TIMEOUT_INFINITE),
        Some(n) => format!("{}{}", TIMEOUT_SECOND_PREFIX, n),
    }
}

/// Parse a `CALLBACK` header: a lenient scan for `<...>` pairs,
/// skipping anything malformed, per §9 Design Notes' resolution of the
/// CALLBACK-parsing open question.
pub fn parse_callback_header(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = value;
    while let Some(start) = rest.find('<') {
        rest = &rest[start + 1..];
        match rest.find('>') {
            Some(end) => {
                let url = rest[..end].trim();
                if !url.is_empty() {
                    out.push(url.to_string());
                }
                rest = &rest[end + 1..];
            }
            None => break,
        }
    }
    out
}

pub(crate) fn bad_sid(sid: &str) -> Error {
    Error::InvalidSid(sid.to_string())
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sid_has_expected_shape() {
        let sid = generate_sid();
        assert!(sid.starts_with("uuid:"));
        assert_eq!(sid.len(), 5 + 36);
    }

    #[test]
    fn timeout_header_round_trips() {
        assert_eq!(parse_timeout_header("Second-1801").unwrap(), Some(1801));
        assert_eq!(parse_timeout_header("Second-infinite").unwrap(), None);
        assert_eq!(format_timeout_header(Some(1801)), "Second-1801");
        assert_eq!(format_timeout_header(None), "Second-infinite");
    }

    #[test]
    fn callback_header_skips_malformed_entries() {
        let urls = parse_callback_header("< http://a/event>, <b");
        assert_eq!(urls, vec!["http://a/event".to_string()]);
    }

    #[test]
    fn callback_header_parses_multiple_well_formed() {
        let urls = parse_callback_header("<http://a/event><http://b/event>");
        assert_eq!(
            urls,
            vec!["http://a/event".to_string(), "http://b/event".to_string()]
        );
    }
}
