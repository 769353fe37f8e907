/*!
HTTP Multicast/Unicast UDP framing (HTTPMU/HTTPU, §1 Discovery): every
SSDP datagram is an HTTP-like request or response line plus headers and
an empty body, sent over UDP rather than a TCP connection.

Grounded on the teacher's `httpu` module (`Request`/`Response`/
`RequestBuilder`/`create_multicast_socket`), generalized with a response
parser the teacher left as `Err(Error::MessageFormat)` (its
`TryFrom<&[u8]> for Response` was never finished) and unicast helpers
the teacher's device side never needed.
*/
use crate::error::{missing_required_header, Error, MessageFormatError};
use crate::syntax::*;
use std::io::ErrorKind as IoErrorKind;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{trace, warn};

const RECV_BUFFER_SIZE: usize = 1500;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A parsed HTTPU/HTTPMU message: the request or status line plus its
/// headers, lookup case-insensitively as SSDP requires.
#[derive(Clone, Debug)]
pub struct Message {
    pub start_line: String,
    headers: Vec<(String, String)>,
}

impl Message {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn require_header(&self, name: &str) -> Result<&str, MessageFormatError> {
        self.header(name).ok_or_else(|| missing_required_header(name))
    }
}

/// One response received in reply to a multicast or unicast send, along
/// with the peer that sent it.
#[derive(Clone, Debug)]
pub struct Reply {
    pub peer: SocketAddr,
    pub message: Message,
}

/// Socket setup shared by every SSDP sender: which local interface to
/// bind, how long to keep listening for unicast replies, and the
/// multicast TTL/loopback behaviour.
#[derive(Clone, Debug)]
pub struct Options {
    pub local_address: Option<IpAddr>,
    pub read_timeout: Duration,
    pub multicast_ttl: u32,
    pub multicast_loop: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            local_address: None,
            read_timeout: Duration::from_secs(2),
            multicast_ttl: 4,
            multicast_loop: false,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Build an HTTPU request message: `"{method} {resource} HTTP/1.1\r\n" +
/// headers + "\r\n"`.
pub fn build_request(method: &str, resource: &str, headers: &[(&str, String)]) -> String {
    let mut out = format!(
        "{} {} {}/{}{}",
        method, resource, HTTP_PROTOCOL_NAME, HTTP_PROTOCOL_VERSION, HTTP_LINE_SEP
    );
    append_headers(&mut out, headers);
    out
}

/// Build an HTTPU response message: `"HTTP/1.1 {status} {reason}\r\n" +
/// headers + "\r\n"`.
pub fn build_response(status: u16, reason: &str, headers: &[(&str, String)]) -> String {
    let mut out = format!(
        "{}/{} {} {}{}",
        HTTP_PROTOCOL_NAME, HTTP_PROTOCOL_VERSION, status, reason, HTTP_LINE_SEP
    );
    append_headers(&mut out, headers);
    out
}

/// Parse a raw HTTPU/HTTPMU datagram into its start line and headers.
/// Blank and malformed header lines are skipped rather than rejected,
/// since SSDP traffic on a shared multicast group routinely carries
/// chatter from unrelated devices.
pub fn parse_message(raw: &str) -> Result<Message, Error> {
    let mut lines = raw.split(HTTP_LINE_SEP);
    let start_line = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| Error::BadHttpMsg("empty datagram".to_string()))?
        .to_string();
    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some(idx) = line.find(HTTP_HEADER_SEP) {
            let name = line[..idx].trim().to_string();
            let value = line[idx + 1..].trim().to_string();
            if !name.is_empty() {
                headers.push((name, value));
            }
        }
    }
    Ok(Message { start_line, headers })
}

/// Bind a socket joined to the SSDP IPv4 multicast group, ready to send
/// and to receive unicast replies for `options.read_timeout`.
pub fn bind_multicast_v4(options: &Options) -> Result<UdpSocket, Error> {
    let bind_addr: IpAddr = "0.0.0.0".parse().unwrap();
    let socket = UdpSocket::bind((bind_addr, 0)).map_err(|e| Error::SocketBind(e.to_string()))?;
    socket
        .set_read_timeout(Some(options.read_timeout))
        .map_err(Error::from)?;
    let group: std::net::Ipv4Addr = "239.255.255.250".parse().unwrap();
    let iface: std::net::Ipv4Addr = match options.local_address {
        Some(IpAddr::V4(addr)) => addr,
        _ => std::net::Ipv4Addr::UNSPECIFIED,
    };
    socket
        .join_multicast_v4(&group, &iface)
        .map_err(Error::from)?;
    socket
        .set_multicast_ttl_v4(options.multicast_ttl)
        .map_err(Error::from)?;
    socket
        .set_multicast_loop_v4(options.multicast_loop)
        .map_err(Error::from)?;
    Ok(socket)
}

/// Send `message` to the SSDP multicast group and collect every reply
/// that arrives before `options.read_timeout` elapses.
pub fn multicast(message: &str, options: &Options) -> Result<Vec<Reply>, Error> {
    let socket = bind_multicast_v4(options)?;
    multicast_using(message, &socket)
}

/// Send `message` to the SSDP multicast group without waiting for
/// replies (used for outbound NOTIFY, which expects none).
pub fn multicast_once(message: &str, options: &Options) -> Result<(), Error> {
    let socket = bind_multicast_v4(options)?;
    send_to(&socket, message, SSDP_MULTICAST_ADDR_V4)
}

/// Send on an already-bound socket and collect replies, used by the
/// control point so repeated searches can share one socket.
pub fn multicast_using(message: &str, socket: &UdpSocket) -> Result<Vec<Reply>, Error> {
    send_to(socket, message, SSDP_MULTICAST_ADDR_V4)?;

    let mut replies = Vec::new();
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    loop {
        match socket.recv_from(&mut buf) {
            Ok((received, peer)) => {
                let text = std::str::from_utf8(&buf[..received])
                    .map_err(MessageFormatError::from)
                    .map_err(Error::from)?;
                match parse_message(text) {
                    Ok(message) => replies.push(Reply { peer, message }),
                    Err(e) => warn!("multicast_using - discarding malformed datagram: {}", e),
                }
            }
            Err(e) if e.kind() == IoErrorKind::WouldBlock || e.kind() == IoErrorKind::TimedOut => {
                trace!("multicast_using - read timed out, no more replies");
                break;
            }
            Err(e) => return Err(Error::SocketRead(e.to_string())),
        }
    }
    Ok(replies)
}

/// Send `message` directly to a single peer (a unicast M-SEARCH
/// response, or a SID-bound NOTIFY is sent over plain TCP HTTP instead
/// and does not use this path).
pub fn unicast(message: &str, peer: SocketAddr) -> Result<(), Error> {
    let bind_addr: IpAddr = if peer.is_ipv4() {
        "0.0.0.0".parse().unwrap()
    } else {
        "::".parse().unwrap()
    };
    let socket = UdpSocket::bind((bind_addr, 0)).map_err(|e| Error::SocketBind(e.to_string()))?;
    socket
        .send_to(message.as_bytes(), peer)
        .map_err(|e| Error::SocketWrite(e.to_string()))?;
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn append_headers(out: &mut String, headers: &[(&str, String)]) {
    for (name, value) in headers {
        out.push_str(name);
        out.push_str(HTTP_HEADER_SEP);
        out.push(' ');
        out.push_str(value);
        out.push_str(HTTP_LINE_SEP);
    }
    out.push_str(HTTP_LINE_SEP);
}

fn send_to(socket: &UdpSocket, message: &str, addr: &str) -> Result<(), Error> {
    socket
        .send_to(message.as_bytes(), addr)
        .map_err(|e| Error::SocketWrite(e.to_string()))?;
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_parse() {
        let raw = build_request(
            METHOD_SEARCH,
            HTTP_MATCH_ANY_RESOURCE,
            &[(HEAD_HOST, SSDP_MULTICAST_ADDR_V4.to_string()), (HEAD_MX, "3".to_string())],
        );
        let parsed = parse_message(&raw).unwrap();
        assert_eq!(parsed.start_line, format!("{} * HTTP/1.1", METHOD_SEARCH));
        assert_eq!(parsed.header(HEAD_MX), Some("3"));
        assert_eq!(parsed.header("host"), Some(SSDP_MULTICAST_ADDR_V4));
    }

    #[test]
    fn response_round_trips_through_parse() {
        let raw = build_response(200, "OK", &[(HEAD_ST, "upnp:rootdevice".to_string())]);
        let parsed = parse_message(&raw).unwrap();
        assert_eq!(parsed.start_line, "HTTP/1.1 200 OK");
        assert_eq!(parsed.header(HEAD_ST), Some("upnp:rootdevice"));
    }

    #[test]
    fn missing_header_is_reported() {
        let parsed = parse_message(&build_request(METHOD_NOTIFY, "*", &[])).unwrap();
        assert!(parsed.require_header(HEAD_USN).is_err());
    }

    #[test]
    fn malformed_header_line_is_skipped_not_rejected() {
        let raw = format!("NOTIFY * HTTP/1.1\r\nnot-a-header-line\r\nUSN: uuid:x\r\n\r\n");
        let parsed = parse_message(&raw).unwrap();
        assert_eq!(parsed.header(HEAD_USN), Some("uuid:x"));
    }

    #[test]
    fn empty_datagram_is_rejected() {
        assert!(parse_message("").is_err());
    }
}
