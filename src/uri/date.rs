/*!
RFC 1123 GMT date strings, as used in the `DATE` header of SSDP and web
server responses.
*/
use std::time::{Duration, SystemTime};

/// Format `t` (seconds since the epoch) as an RFC 1123 GMT date string.
/// `t == 0` defaults to the current time.
pub fn make_date_string(t: u64) -> String {
    let time = if t == 0 {
        SystemTime::now()
    } else {
        SystemTime::UNIX_EPOCH + Duration::from_secs(t)
    };
    httpdate::fmt_http_date(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_fixed_epoch() {
        // 2000-01-01T00:00:00Z
        let s = make_date_string(946_684_800);
        assert_eq!(s, "Sat, 01 Jan 2000 00:00:00 GMT");
    }

    #[test]
    fn default_is_now() {
        let s = make_date_string(0);
        assert!(s.ends_with("GMT"));
    }
}
