/*!
Network interface enumeration and selection (part of component J, §4.1).

Wraps `pnet::datalink` the way the teacher's `utils/interface.rs` did, and
adds the selection algorithm the handle registry needs at `init` time:
resolving the caller's `interfaceSpec` ("*" / names / empty) into a
concrete list of interfaces to bind sockets on, retrying while none are
available.
*/
use crate::error::Error;
use ipnetwork::IpNetwork;
use pnet::datalink;
use std::net::IpAddr;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A selected network interface and the addresses the runtime will bind
/// and advertise on.
#[derive(Clone, Debug)]
pub struct SelectedInterface {
    pub name: String,
    pub ipv4: Option<IpAddr>,
    pub ipv6: Option<IpAddr>,
}

const RETRY_INTERVAL: Duration = Duration::from_secs(2);

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Resolve an `interfaceSpec` (`"*"`, empty, or a comma/space separated
/// list of names) into concrete interfaces, retrying every 2s until
/// `wait_secs` elapses.
pub fn select_interfaces(spec: &str, wait_secs: u64) -> Result<Vec<SelectedInterface>, Error> {
    let deadline = Instant::now() + Duration::from_secs(wait_secs.max(1));
    loop {
        let candidates = eligible_interfaces();
        let selected = if spec == "*" {
            candidates
        } else if spec.trim().is_empty() {
            candidates.into_iter().take(1).collect()
        } else {
            let names: Vec<&str> = spec
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            let mut out = Vec::new();
            let mut all_found = true;
            for name in &names {
                match candidates.iter().find(|c| &c.name == name) {
                    Some(found) => out.push(found.clone()),
                    None => {
                        all_found = false;
                        warn!("select_interfaces - named interface `{}` not found", name);
                    }
                }
            }
            if !all_found {
                Vec::new()
            } else {
                out
            }
        };

        if !selected.is_empty() {
            debug!("select_interfaces - selected {:?}", selected);
            return Ok(selected);
        }

        if Instant::now() >= deadline {
            warn!("select_interfaces - no usable interface within wait window");
            return Err(Error::InvalidInterface);
        }
        trace!("select_interfaces - no interfaces ready yet, retrying");
        thread::sleep(RETRY_INTERVAL);
    }
}

/// All UP, multicast-capable, non-loopback interfaces with at least one
/// IPv4 address.
pub fn eligible_interfaces() -> Vec<SelectedInterface> {
    datalink::interfaces()
        .into_iter()
        .filter(|ni| ni.is_up() && !ni.is_loopback())
        .filter_map(|ni| {
            let ipv4 = ni
                .ips
                .iter()
                .find_map(|ip| ipv4_of(ip))
                .map(IpAddr::V4);
            ipv4.as_ref()?;
            let ipv6 = ni.ips.iter().find_map(|ip| ipv6_of(ip)).map(IpAddr::V6);
            Some(SelectedInterface {
                name: ni.name.clone(),
                ipv4,
                ipv6,
            })
        })
        .collect()
}

fn ipv4_of(ip: &IpNetwork) -> Option<std::net::Ipv4Addr> {
    match ip.ip() {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    }
}

fn ipv6_of(ip: &IpNetwork) -> Option<std::net::Ipv6Addr> {
    match ip.ip() {
        IpAddr::V6(v6) => Some(v6),
        IpAddr::V4(_) => None,
    }
}
