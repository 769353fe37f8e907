/*!
Embedded web server (component G): serves description documents, SCPD,
and any other content a device publishes, either from an on-disk root
directory or from an application-supplied virtual directory, with byte
range support and address gating when the runtime was bound to a
restricted interface set.

No teacher equivalent (the teacher demo served nothing); the virtual
directory split into `get_info`/`open`/`read`/`write`/`seek`/`close`
follows libupnp's callback-table shape, re-expressed here as a Rust
trait over an opaque cookie rather than raw function pointers.
*/
use crate::error::Error;
use crate::interface::SelectedInterface;
use crate::syntax::*;
use crate::uri::{date, mime};
use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// Metadata the server needs before it can answer a GET/HEAD: size,
/// last-modified time, and content type.
#[derive(Clone, Debug)]
pub struct FileInfo {
    pub size: u64,
    pub last_modified: u64,
    pub is_directory: bool,
    pub content_type: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
    End,
}

/// Opaque handle returned by [`VirtualDirHandlers::open`] and threaded
/// through subsequent `read`/`write`/`seek`/`close` calls.
pub type VDirCookie = u64;

/// The capability set an application implements to back a mounted
/// virtual directory with content from anywhere (memory, a generator,
/// another process).
pub trait VirtualDirHandlers: Send + Sync {
    fn get_info(&self, full_path: &str) -> Option<FileInfo>;
    fn open(&self, full_path: &str, mode: OpenMode) -> Result<VDirCookie, Error>;
    fn read(&self, cookie: VDirCookie, buf: &mut [u8]) -> Result<usize, Error>;
    fn write(&self, cookie: VDirCookie, buf: &[u8]) -> Result<usize, Error>;
    fn seek(&self, cookie: VDirCookie, offset: i64, origin: SeekOrigin) -> Result<u64, Error>;
    fn close(&self, cookie: VDirCookie) -> Result<(), Error>;
}

/// An in-memory [`VirtualDirHandlers`], the common case of publishing a
/// handful of generated or buffer-supplied documents (a description
/// rewritten with the live host:port, for instance).
#[derive(Default)]
pub struct MemoryVirtualDir {
    docs: Mutex<HashMap<String, (String, Vec<u8>)>>,
    open_files: Mutex<HashMap<VDirCookie, OpenFile>>,
    next_cookie: AtomicU64,
}

struct OpenFile {
    path: String,
    position: u64,
}

impl MemoryVirtualDir {
    pub fn new() -> Self {
        MemoryVirtualDir::default()
    }

    pub fn put(&self, path: &str, content_type: &str, content: Vec<u8>) {
        self.docs
            .lock()
            .unwrap()
            .insert(path.to_string(), (content_type.to_string(), content));
    }

    pub fn remove(&self, path: &str) {
        self.docs.lock().unwrap().remove(path);
    }
}

impl VirtualDirHandlers for MemoryVirtualDir {
    fn get_info(&self, full_path: &str) -> Option<FileInfo> {
        let docs = self.docs.lock().unwrap();
        docs.get(full_path).map(|(content_type, bytes)| FileInfo {
            size: bytes.len() as u64,
            last_modified: now_secs(),
            is_directory: false,
            content_type: content_type.clone(),
        })
    }

    fn open(&self, full_path: &str, _mode: OpenMode) -> Result<VDirCookie, Error> {
        if !self.docs.lock().unwrap().contains_key(full_path) {
            return Err(Error::BadRequest(format!("no such document `{}`", full_path)));
        }
        let cookie = self.next_cookie.fetch_add(1, Ordering::SeqCst);
        self.open_files.lock().unwrap().insert(
            cookie,
            OpenFile {
                path: full_path.to_string(),
                position: 0,
            },
        );
        Ok(cookie)
    }

    fn read(&self, cookie: VDirCookie, buf: &mut [u8]) -> Result<usize, Error> {
        let mut open_files = self.open_files.lock().unwrap();
        let file = open_files
            .get_mut(&cookie)
            .ok_or_else(|| Error::InternalError("unknown virtual-dir cookie".to_string()))?;
        let docs = self.docs.lock().unwrap();
        let (_, bytes) = docs
            .get(&file.path)
            .ok_or_else(|| Error::InternalError("document removed while open".to_string()))?;
        let start = file.position as usize;
        if start >= bytes.len() {
            return Ok(0);
        }
        let n = (bytes.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        file.position += n as u64;
        Ok(n)
    }

    fn write(&self, cookie: VDirCookie, buf: &[u8]) -> Result<usize, Error> {
        let mut open_files = self.open_files.lock().unwrap();
        let file = open_files
            .get_mut(&cookie)
            .ok_or_else(|| Error::InternalError("unknown virtual-dir cookie".to_string()))?;
        let mut docs = self.docs.lock().unwrap();
        let (_, bytes) = docs
            .get_mut(&file.path)
            .ok_or_else(|| Error::InternalError("document removed while open".to_string()))?;
        let start = file.position as usize;
        if start + buf.len() > bytes.len() {
            bytes.resize(start + buf.len(), 0);
        }
        bytes[start..start + buf.len()].copy_from_slice(buf);
        file.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn seek(&self, cookie: VDirCookie, offset: i64, origin: SeekOrigin) -> Result<u64, Error> {
        let mut open_files = self.open_files.lock().unwrap();
        let file = open_files
            .get_mut(&cookie)
            .ok_or_else(|| Error::InternalError("unknown virtual-dir cookie".to_string()))?;
        let docs = self.docs.lock().unwrap();
        let len = docs.get(&file.path).map(|(_, b)| b.len() as u64).unwrap_or(0);
        let base = match origin {
            SeekOrigin::Start => 0,
            SeekOrigin::Current => file.position,
            SeekOrigin::End => len,
        };
        let new_pos = base as i64 + offset;
        if new_pos < 0 {
            return Err(Error::InvalidParam("seek before start of file".to_string()));
        }
        file.position = new_pos as u64;
        Ok(file.position)
    }

    fn close(&self, cookie: VDirCookie) -> Result<(), Error> {
        self.open_files
            .lock()
            .unwrap()
            .remove(&cookie)
            .map(|_| ())
            .ok_or_else(|| Error::InternalError("unknown virtual-dir cookie".to_string()))
    }
}

/// The process-wide table of mounted virtual directories, resolved by
/// longest matching path prefix.
#[derive(Default)]
pub struct VirtualDirRegistry {
    mounts: Vec<(String, Box<dyn VirtualDirHandlers>)>,
}

impl VirtualDirRegistry {
    pub fn new() -> Self {
        VirtualDirRegistry::default()
    }

    pub fn mount(&mut self, prefix: &str, handlers: Box<dyn VirtualDirHandlers>) {
        self.unmount(prefix);
        self.mounts.push((prefix.to_string(), handlers));
    }

    pub fn unmount(&mut self, prefix: &str) -> bool {
        let before = self.mounts.len();
        self.mounts.retain(|(p, _)| p != prefix);
        self.mounts.len() != before
    }

    /// Find the mount whose prefix matches `path`, preferring the
    /// longest (most specific) prefix.
    pub fn resolve(&self, path: &str) -> Option<(&str, &dyn VirtualDirHandlers)> {
        self.mounts
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, handlers)| (prefix.as_str(), handlers.as_ref()))
    }
}

/// A single-range byte request, per §4.6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No `Range` header: serve the whole document.
    Full,
    /// One satisfiable range, inclusive bounds.
    Single { start: u64, end: u64 },
    /// Multiple ranges, a suffix range, or bounds the document cannot
    /// satisfy: respond 416.
    Unsatisfiable,
}

/// Restricts which peer addresses the web server will answer, mirroring
/// the interface set the runtime was bound to (§4.1: an explicit,
/// non-wildcard `interfaceSpec` gates traffic to those interfaces only).
#[derive(Clone, Debug)]
pub struct AddressGate {
    allowed: Option<Vec<IpAddr>>,
}

impl AddressGate {
    pub fn unrestricted() -> Self {
        AddressGate { allowed: None }
    }

    pub fn restricted_to(interfaces: &[SelectedInterface]) -> Self {
        let mut allowed = Vec::new();
        for iface in interfaces {
            allowed.extend(iface.ipv4);
            allowed.extend(iface.ipv6);
        }
        AddressGate {
            allowed: Some(allowed),
        }
    }

    pub fn is_allowed(&self, peer: IpAddr) -> bool {
        match &self.allowed {
            None => true,
            Some(list) => list.contains(&peer),
        }
    }
}

/// The embedded server's document sources: virtual directories take
/// priority over the on-disk root, matched by path prefix.
#[derive(Default)]
pub struct WebServer {
    pub virtual_dirs: VirtualDirRegistry,
    root_dir: Option<PathBuf>,
    pub gate: AddressGate,
}

impl WebServer {
    pub fn new(gate: AddressGate) -> Self {
        WebServer {
            virtual_dirs: VirtualDirRegistry::new(),
            root_dir: None,
            gate,
        }
    }

    pub fn set_root_dir<P: Into<PathBuf>>(&mut self, root: P) {
        self.root_dir = Some(root.into());
    }

    /// Resolve `path` against the virtual directories, then the on-disk
    /// root, returning file metadata.
    pub fn stat(&self, path: &str) -> Result<FileInfo, Error> {
        if let Some((_, handlers)) = self.virtual_dirs.resolve(path) {
            return handlers
                .get_info(path)
                .ok_or_else(|| Error::BadRequest(format!("no such document `{}`", path)));
        }
        let on_disk = self.disk_path(path)?;
        let meta = fs::metadata(&on_disk).map_err(Error::from)?;
        Ok(FileInfo {
            size: meta.len(),
            last_modified: meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0),
            is_directory: meta.is_dir(),
            content_type: mime::for_path(path).to_string(),
        })
    }

    /// Read the full body for `path`, honoring a single byte range.
    pub fn read(&self, path: &str, range: RangeOutcome) -> Result<Vec<u8>, Error> {
        let body = if let Some((_, handlers)) = self.virtual_dirs.resolve(path) {
            let cookie = handlers.open(path, OpenMode::Read)?;
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = handlers.read(cookie, &mut chunk)?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            handlers.close(cookie)?;
            buf
        } else {
            let on_disk = self.disk_path(path)?;
            fs::read(&on_disk).map_err(Error::from)?
        };

        match range {
            RangeOutcome::Full | RangeOutcome::Unsatisfiable => Ok(body),
            RangeOutcome::Single { start, end } => {
                let start = start as usize;
                let end = (end as usize).min(body.len().saturating_sub(1));
                Ok(body[start..=end].to_vec())
            }
        }
    }

    fn disk_path(&self, path: &str) -> Result<PathBuf, Error> {
        let root = self
            .root_dir
            .as_ref()
            .ok_or_else(|| Error::BadRequest(format!("no such document `{}`", path)))?;
        Ok(join_under_root(root, path))
    }
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Build a `SERVER` header value: `OS/version UPnP/1.0 product/version`.
pub fn server_header(product_name: &str, product_version: &str) -> String {
    format!("{} {}/1.0 {}/{}", os_label(), UPNP_STRING, product_name, product_version)
}

fn os_label() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux/0",
        "macos" => "Darwin/0",
        "windows" => "Windows/0",
        other => other,
    }
}

/// Parse a `Range: bytes=...` header against a document of `total_len`
/// bytes. Multiple ranges and suffix (`-N`) ranges are reported as
/// unsatisfiable rather than honored, per §4.6.
pub fn parse_range_header(header: Option<&str>, total_len: u64) -> RangeOutcome {
    let header = match header {
        Some(h) => h,
        None => return RangeOutcome::Full,
    };
    let spec = match header.strip_prefix("bytes=") {
        Some(s) => s,
        None => return RangeOutcome::Unsatisfiable,
    };
    if spec.contains(',') || spec.starts_with('-') {
        return RangeOutcome::Unsatisfiable;
    }

    let mut parts = spec.splitn(2, '-');
    let start: u64 = match parts.next().and_then(|s| s.parse().ok()) {
        Some(s) => s,
        None => return RangeOutcome::Unsatisfiable,
    };
    let end_part = parts.next().unwrap_or("");
    let end: u64 = if end_part.is_empty() {
        total_len.saturating_sub(1)
    } else {
        match end_part.parse() {
            Ok(e) => e,
            Err(_) => return RangeOutcome::Unsatisfiable,
        }
    };

    if start > end || start >= total_len {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Single {
        start,
        end: end.min(total_len.saturating_sub(1)),
    }
}

/// Build the standard set of response headers for a served document.
pub fn standard_headers(content_length: u64, content_type: &str, server: &str) -> Vec<(&'static str, String)> {
    vec![
        (HEAD_DATE, date::make_date_string(0)),
        ("Accept-Ranges", "bytes".to_string()),
        (HEAD_SERVER, server.to_string()),
        ("Content-Type", content_type.to_string()),
        ("Content-Length", content_length.to_string()),
        ("x-user-agent", "redsonic".to_string()),
    ]
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn join_under_root(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
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

    #[test]
    fn memory_vdir_round_trips_read_and_write() {
        let vdir = MemoryVirtualDir::new();
        vdir.put("/x.txt", "text/plain", b"hello".to_vec());
        let cookie = vdir.open("/x.txt", OpenMode::Read).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(vdir.read(cookie, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        vdir.close(cookie).unwrap();
    }

    #[test]
    fn memory_vdir_seek_then_partial_read() {
        let vdir = MemoryVirtualDir::new();
        vdir.put("/x.txt", "text/plain", b"0123456789".to_vec());
        let cookie = vdir.open("/x.txt", OpenMode::Read).unwrap();
        vdir.seek(cookie, 5, SeekOrigin::Start).unwrap();
        let mut buf = [0u8; 3];
        vdir.read(cookie, &mut buf).unwrap();
        assert_eq!(&buf, b"567");
    }

    #[test]
    fn registry_resolves_longest_matching_prefix() {
        let mut registry = VirtualDirRegistry::new();
        registry.mount("/upnp", Box::new(MemoryVirtualDir::new()));
        registry.mount("/upnp/device1", Box::new(MemoryVirtualDir::new()));
        let (prefix, _) = registry.resolve("/upnp/device1/desc.xml").unwrap();
        assert_eq!(prefix, "/upnp/device1");
    }

    #[test]
    fn range_full_document_when_no_header() {
        assert_eq!(parse_range_header(None, 100), RangeOutcome::Full);
    }

    #[test]
    fn range_single_closed_is_satisfiable() {
        assert_eq!(
            parse_range_header(Some("bytes=0-99"), 1000),
            RangeOutcome::Single { start: 0, end: 99 }
        );
    }

    #[test]
    fn range_open_ended_covers_to_end() {
        assert_eq!(
            parse_range_header(Some("bytes=900-"), 1000),
            RangeOutcome::Single { start: 900, end: 999 }
        );
    }

    #[test]
    fn range_multiple_is_unsatisfiable() {
        assert_eq!(
            parse_range_header(Some("bytes=0-10,20-30"), 1000),
            RangeOutcome::Unsatisfiable
        );
    }

    #[test]
    fn range_suffix_form_is_unsatisfiable() {
        assert_eq!(parse_range_header(Some("bytes=-500"), 1000), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn range_out_of_bounds_is_unsatisfiable() {
        assert_eq!(parse_range_header(Some("bytes=2000-3000"), 1000), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn address_gate_unrestricted_allows_everything() {
        let gate = AddressGate::unrestricted();
        assert!(gate.is_allowed("10.0.0.5".parse().unwrap()));
    }

    #[test]
    fn address_gate_restricted_rejects_unknown_peer() {
        let iface = SelectedInterface {
            name: "eth0".to_string(),
            ipv4: Some("192.168.1.10".parse().unwrap()),
            ipv6: None,
        };
        let gate = AddressGate::restricted_to(&[iface]);
        assert!(gate.is_allowed("192.168.1.10".parse().unwrap()));
        assert!(!gate.is_allowed("10.0.0.5".parse().unwrap()));
    }
}
