/*!
HTTP status-code reason phrases (§4 web server / dispatcher responses).

Grounded on `original_source/src/utils/statcodes.cpp`'s `httpcodes` map:
the same fixed code -> phrase table, reused by the web server and
dispatcher instead of hand-writing the string at each call site.
*/
use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref REASON_PHRASES: HashMap<u16, &'static str> = {
    let mut m = HashMap::new();
    m.insert(100, "Continue");
    m.insert(101, "Switching Protocols");
    m.insert(200, "OK");
    m.insert(201, "Created");
    m.insert(202, "Accepted");
    m.insert(203, "Non-Authoritative Information");
    m.insert(204, "No Content");
    m.insert(205, "Reset Content");
    m.insert(206, "Partial Content");
    m.insert(300, "Multiple Choices");
    m.insert(301, "Moved Permanently");
    m.insert(302, "Found");
    m.insert(303, "See Other");
    m.insert(304, "Not Modified");
    m.insert(305, "Use Proxy");
    m.insert(307, "Temporary Redirect");
    m.insert(400, "Bad Request");
    m.insert(401, "Unauthorized");
    m.insert(402, "Payment Required");
    m.insert(403, "Forbidden");
    m.insert(404, "Not Found");
    m.insert(405, "Method Not Allowed");
    m.insert(406, "Not Acceptable");
    m.insert(407, "Proxy Authentication Required");
    m.insert(408, "Request Timeout");
    m.insert(409, "Conflict");
    m.insert(410, "Gone");
    m.insert(411, "Length Required");
    m.insert(412, "Precondition Failed");
    m.insert(413, "Request Entity Too Large");
    m.insert(414, "Request-URI Too Long");
    m.insert(415, "Unsupported Media Type");
    m.insert(416, "Requested Range Not Satisfiable");
    m.insert(417, "Expectation Failed");
    m.insert(500, "Internal Server Error");
    m.insert(501, "Not Implemented");
    m.insert(502, "Bad Gateway");
    m.insert(503, "Service Unavailable");
    m.insert(504, "Gateway Timeout");
    m.insert(505, "HTTP Version Not Supported");
    m.insert(506, "Variant Also Negotiates");
    m.insert(507, "Insufficient Storage");
    m.insert(508, "Loop Detected");
    m.insert(510, "Not Extended");
    m
    };
}

/// The reason phrase for a status code, or `""` for one outside the
/// table, matching `http_get_code_text`'s fallback.
pub fn reason_phrase(status: u16) -> &'static str {
    REASON_PHRASES.get(&status).copied().unwrap_or("")
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(404), "Not Found");
        assert_eq!(reason_phrase(413), "Request Entity Too Large");
    }

    #[test]
    fn unknown_code_is_empty() {
        assert_eq!(reason_phrase(599), "");
    }
}
