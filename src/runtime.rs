/*!
The runtime (components H, I, J wired together): owns the handle table,
worker pools, timer, embedded web server and HTTP daemon, and exposes
the process-wide lifecycle spec.md's component J describes —
`init`/`finish`, device and client registration, advertisement, search,
and the GENA subscribe/renew/unsubscribe entry points both sides need.

No teacher equivalent (the teacher never ran a server); the lifecycle
order in [`Runtime::init`] follows §4.1's init sequence literally, and
the mini-server accept loop is the one piece in this crate with no
direct analogue anywhere in the example pack, so its shape is grounded
in [`crate::dispatcher`]'s routing table and [`tiny_http`]'s own
polling-server idiom rather than borrowed code.
*/
use crate::callback::{ActionResponder, Callback, Event};
use crate::config::Config;
use crate::description::device::{self, DeviceDesc};
use crate::dispatcher::{self, Route, StopSignal};
use crate::error::Error;
use crate::gena::control_point::{self, ClientSubscriptions, NotifyReceipt};
use crate::gena::device as gena_device;
use crate::gena::device::EventQueues;
use crate::gena;
use crate::handle::{ClientHandle, DeviceHandle, Handle, HandleInfo, HandleTable};
use crate::interface::{self, SelectedInterface};
use crate::pool::Pools;
use crate::service_table::ServiceTable;
use crate::soap::codec::{self, ActionOutcome};
use crate::ssdp::httpu;
use crate::ssdp::notify::{self, AdvertiseState};
use crate::ssdp::protocol::SearchTarget;
use crate::ssdp::search;
use crate::statcodes::reason_phrase;
use crate::syntax::*;
use crate::timer::Timer;
use crate::webserver::{self, AddressGate, MemoryVirtualDir, RangeOutcome, VirtualDirHandlers, WebServer};
use std::io::Read;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tiny_http::{Header, Response, Server};
use tracing::{debug, error, warn};

/// Default `CACHE-CONTROL: max-age` advertised for a registered root
/// device, distinct from GENA's subscription-timeout default since the
/// two lifetimes are governed by unrelated headers.
const DEFAULT_SSDP_MAX_AGE_SECS: u64 = 1800;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// The embeddable UPnP runtime: one process talks to one `Runtime`,
/// cheaply cloned (it is a handle around shared state) and shared
/// across threads.
#[derive(Clone)]
pub struct Runtime(Arc<Inner>);

struct Inner {
    config: Config,
    handles: Mutex<HandleTable>,
    timer: Timer,
    pools: Pools,
    webserver: Mutex<WebServer>,
    documents: Arc<MemoryVirtualDir>,
    stop: StopSignal,
    interfaces: Vec<SelectedInterface>,
    server_port: u16,
    server_address_v4: Option<IpAddr>,
    server_address_v6: Option<IpAddr>,
    server_header: String,
    http_thread: Mutex<Option<JoinHandle<()>>>,
    ssdp_threads: Mutex<Vec<JoinHandle<()>>>,
    next_search_id: AtomicU64,
    next_doc_seq: AtomicU64,
}

/// Forwards to a shared [`MemoryVirtualDir`] so it can be mounted into a
/// [`WebServer`]'s registry (which takes ownership of a `Box<dyn
/// VirtualDirHandlers>`) while the runtime keeps its own handle to
/// publish further documents after registration.
struct SharedDocs(Arc<MemoryVirtualDir>);

impl VirtualDirHandlers for SharedDocs {
    fn get_info(&self, full_path: &str) -> Option<webserver::FileInfo> {
        self.0.get_info(full_path)
    }
    fn open(&self, full_path: &str, mode: webserver::OpenMode) -> Result<webserver::VDirCookie, Error> {
        self.0.open(full_path, mode)
    }
    fn read(&self, cookie: webserver::VDirCookie, buf: &mut [u8]) -> Result<usize, Error> {
        self.0.read(cookie, buf)
    }
    fn write(&self, cookie: webserver::VDirCookie, buf: &[u8]) -> Result<usize, Error> {
        self.0.write(cookie, buf)
    }
    fn seek(&self, cookie: webserver::VDirCookie, offset: i64, origin: webserver::SeekOrigin) -> Result<u64, Error> {
        self.0.seek(cookie, offset, origin)
    }
    fn close(&self, cookie: webserver::VDirCookie) -> Result<(), Error> {
        self.0.close(cookie)
    }
}

// ------------------------------------------------------------------------------------------------
// Public Functions — lifecycle (§4.1)
// ------------------------------------------------------------------------------------------------

impl Runtime {
    /// Bring up one runtime instance: select network interfaces, start
    /// the worker pools and timer thread, bind the HTTP daemon and SSDP
    /// sockets. Mirrors §4.1's init order: interfaces, pools, timer,
    /// SSDP, HTTP daemon.
    pub fn init(config: Config) -> Result<Runtime, Error> {
        let interfaces = interface::select_interfaces(&config.interface_spec, config.network_wait_secs)?;

        let bind_ipv4 = interfaces
            .iter()
            .find_map(|i| i.ipv4)
            .ok_or(Error::InvalidInterface)?;
        let ipv6_available = interfaces.iter().any(|i| i.ipv6.is_some());
        let server_address_v6 = if config.ipv6 && ipv6_available {
            interfaces.iter().find_map(|i| i.ipv6)
        } else {
            if config.ipv6 && !ipv6_available {
                warn!("init - ipv6 requested but no eligible interface carries an ipv6 address, disabling");
            }
            None
        };

        let listener = std::net::TcpListener::bind((bind_ipv4, config.port)).map_err(Error::from)?;
        let server_port = listener.local_addr().map_err(Error::from)?.port();
        let server = Server::from_listener(listener, None)
            .map_err(|e| Error::InitFailed(e.to_string()))?;

        let server_header = webserver::server_header("upnp-core", env!("CARGO_PKG_VERSION"));
        let gate = if config.interface_spec.trim() == "*" {
            AddressGate::unrestricted()
        } else {
            AddressGate::restricted_to(&interfaces)
        };
        let documents = Arc::new(MemoryVirtualDir::new());
        let mut webserver = WebServer::new(gate);
        webserver.virtual_dirs.mount("", Box::new(SharedDocs(documents.clone())));

        let inner = Arc::new(Inner {
            config,
            handles: Mutex::new(HandleTable::default()),
            timer: Timer::start(),
            pools: Pools::default(),
            webserver: Mutex::new(webserver),
            documents,
            stop: StopSignal::new(),
            interfaces,
            server_port,
            server_address_v4: Some(bind_ipv4),
            server_address_v6,
            server_header,
            http_thread: Mutex::new(None),
            ssdp_threads: Mutex::new(Vec::new()),
            next_search_id: AtomicU64::new(1),
            next_doc_seq: AtomicU64::new(1),
        });

        let http_thread = spawn_mini_server(inner.clone(), server);
        *inner.http_thread.lock().unwrap() = Some(http_thread);

        let mut ssdp_threads = Vec::new();
        ssdp_threads.push(spawn_ssdp_listener(inner.clone()));
        *inner.ssdp_threads.lock().unwrap() = ssdp_threads;

        Ok(Runtime(inner))
    }

    /// Tear down every registration, then stop the daemon, pools and
    /// timer, in that order (§4.1).
    pub fn finish(&self) -> Result<(), Error> {
        let (device_handles, client_handles): (Vec<Handle>, Vec<Handle>) = {
            let mut table = self.0.handles.lock().unwrap();
            let devices = table.devices().map(|(h, _)| *h).collect();
            let clients = table.clients().map(|(h, _)| *h).collect();
            (devices, clients)
        };
        for handle in device_handles {
            let _ = self.unregister_root_device(handle);
        }
        for handle in client_handles {
            let _ = self.unregister_client(handle);
        }

        self.0.stop.trigger();
        if let Some(join) = self.0.http_thread.lock().unwrap().take() {
            let _ = join.join();
        }
        for join in self.0.ssdp_threads.lock().unwrap().drain(..) {
            let _ = join.join();
        }
        self.0.pools.join_all();
        self.0.timer.shutdown();
        Ok(())
    }

    pub fn get_server_port_v4(&self) -> u16 {
        self.0.server_port
    }

    pub fn get_server_port_v6(&self) -> u16 {
        if self.0.server_address_v6.is_some() {
            self.0.server_port
        } else {
            0
        }
    }

    pub fn get_server_address_v4(&self) -> Option<IpAddr> {
        self.0.server_address_v4
    }

    pub fn get_server_address_v6(&self) -> Option<IpAddr> {
        self.0.server_address_v6
    }

    /// The web server's mutable setup surface (mounting a virtual
    /// directory, setting an on-disk root), exposed so applications can
    /// publish SCPD and other ancillary documents before or after
    /// registering a device.
    pub fn webserver(&self) -> &Mutex<WebServer> {
        &self.0.webserver
    }

    // ------------------------------------------------------------------------------------------
    // Device registration (§4.1, §4.9)
    // ------------------------------------------------------------------------------------------

    pub fn register_root_device_from_buffer(
        &self,
        description_xml: &str,
        callback: Arc<dyn Callback>,
    ) -> Result<Handle, Error> {
        self.register_root_device(description_xml, callback)
    }

    pub fn register_root_device_from_file(
        &self,
        path: &std::path::Path,
        callback: Arc<dyn Callback>,
    ) -> Result<Handle, Error> {
        let xml = std::fs::read_to_string(path).map_err(Error::from)?;
        self.register_root_device(&xml, callback)
    }

    pub fn register_root_device_from_url(
        &self,
        url: &str,
        callback: Arc<dyn Callback>,
    ) -> Result<Handle, Error> {
        let xml = reqwest::blocking::get(url)
            .map_err(Error::from)?
            .text()
            .map_err(Error::from)?;
        self.register_root_device(&xml, callback)
    }

    fn register_root_device(&self, description_xml: &str, callback: Arc<dyn Callback>) -> Result<Handle, Error> {
        let root = device::parse(description_xml)?;
        let mut parsed_device = root.device;

        let seq = self.0.next_doc_seq.fetch_add(1, Ordering::SeqCst);
        // Trailing slash: resolve_urls treats `base` as an RFC 3986 base
        // URI, dropping its last path segment for any relative reference
        // that doesn't itself start with `/`. Without the trailing slash
        // that segment would be this registration's `{seq}`, and every
        // root device would resolve its service URLs to the same path.
        let prefix = format!("/upnp/{}/", seq);
        let base = self.base_url(&prefix);
        device::resolve_urls(&mut parsed_device, &base)?;

        let description_path = format!("{}desc.xml", prefix);
        let description_url = format!("{}desc.xml", base);
        let rewritten = crate::description::device::to_string(&crate::description::device::DeviceDescRoot {
            spec_version: root.spec_version,
            url_base: base.clone(),
            device: parsed_device.clone(),
        })?;
        self.0
            .documents
            .put(&description_path, "text/xml; charset=\"utf-8\"", rewritten.into_bytes());

        let service_table = ServiceTable::init_from_description(&parsed_device);
        let event_queues = EventQueues::new(
            self.0.config.event_queue_max_len,
            self.0.config.event_queue_max_age_secs,
        );
        let advertise_state = AdvertiseState::new(DEFAULT_SSDP_MAX_AGE_SECS);

        let handle_info = DeviceHandle {
            root_device_udn: parsed_device.udn.clone(),
            description_url: description_url.clone(),
            description_path: description_path.clone(),
            device: parsed_device,
            service_table,
            event_queues,
            callback,
            advertise_state,
            advertise_timer_id: None,
        };

        let handle = {
            let mut table = self.0.handles.lock().unwrap();
            table.register_device(handle_info)?
        };

        self.advertise(handle, true)?;
        self.schedule_next_advertisement(handle);
        Ok(handle)
    }

    pub fn unregister_root_device(&self, handle: Handle) -> Result<(), Error> {
        {
            let mut table = self.0.handles.lock().unwrap();
            table.get_device(handle)?;
        }
        let _ = self.send_byebye(handle);

        let mut table = self.0.handles.lock().unwrap();
        match table.unregister(handle)? {
            HandleInfo::Device(device_handle) => {
                if let Some(id) = device_handle.advertise_timer_id {
                    self.0.timer.cancel(id);
                }
                drop(table);
                self.0.documents.remove(&device_handle.description_path);
                Ok(())
            }
            HandleInfo::Client(other) => {
                table.register_client(other)?;
                Err(Error::InvalidHandle)
            }
        }
    }

    /// Queue a NOTIFY for every active subscription on `service_id`,
    /// carrying `vars` as the new state (§4.5 "notify all"). Subscriptions
    /// with an empty queue before this call get a delivery job submitted
    /// immediately; subscriptions already mid-delivery pick this event up
    /// when [`dispatch_pending_notify`] chains to the next queued entry.
    pub fn notify_state_change(
        &self,
        handle: Handle,
        service_id: &str,
        vars: &[(String, String)],
    ) -> Result<(), Error> {
        let mut table = self.0.handles.lock().unwrap();
        let device_handle = table.get_device(handle)?;
        let udn = device_handle.root_device_udn.clone();
        let entry = device_handle
            .service_table
            .find_by_service_id(service_id, &udn)
            .ok_or(Error::InvalidService)?;
        let needs_dispatch = gena_device::notify_all(entry, &mut device_handle.event_queues, vars)?;
        drop(table);

        for sid in needs_dispatch {
            let inner = self.0.clone();
            let udn = udn.clone();
            self.0.pools.send.execute(move || dispatch_pending_notify(&inner, &udn, &sid));
        }
        Ok(())
    }

    pub fn register_client(&self, callback: Arc<dyn Callback>) -> Result<Handle, Error> {
        let mut table = self.0.handles.lock().unwrap();
        table.register_client(ClientHandle {
            subscriptions: ClientSubscriptions::new(),
            callback,
        })
    }

    pub fn unregister_client(&self, handle: Handle) -> Result<(), Error> {
        let mut table = self.0.handles.lock().unwrap();
        table.get_client(handle)?;
        match table.unregister(handle)? {
            HandleInfo::Client(_) => Ok(()),
            HandleInfo::Device(other) => {
                table.register_device(other)?;
                Err(Error::InvalidHandle)
            }
        }
    }

    /// Issue a SUBSCRIBE against a remote service's event URL (§4.6),
    /// registering the accepted subscription in `handle`'s table so an
    /// inbound NOTIFY can be reconciled against it. The callback URL is
    /// this runtime's own HTTP daemon, which routes any `NOTIFY` request
    /// by SID regardless of path.
    pub fn subscribe(
        &self,
        handle: Handle,
        event_sub_url: &str,
        requested_timeout: Option<u64>,
    ) -> Result<String, Error> {
        let mut table = self.0.handles.lock().unwrap();
        table.get_client(handle)?;
        drop(table);

        let callback_url = self.base_url("/event");
        let subscription = control_point::subscribe(event_sub_url, &callback_url, requested_timeout)?;
        let sid = subscription.actual_sid.clone();

        let mut table = self.0.handles.lock().unwrap();
        let client_handle = table.get_client(handle)?;
        client_handle.subscriptions.register(subscription);
        drop(table);

        self.schedule_auto_renew(handle, sid.clone());
        Ok(sid)
    }

    /// Schedule a renewal `AUTO_RENEW_MARGIN_SECS` ahead of `sid`'s
    /// expiry, rescheduling itself after each successful renewal and
    /// reporting [`Event::EventAutorenewalFailed`] otherwise. A no-op for
    /// an infinite-duration subscription, which never expires.
    fn schedule_auto_renew(&self, handle: Handle, sid: String) {
        let (renew_at, timeout) = {
            let mut table = match self.0.handles.lock() {
                Ok(t) => t,
                Err(_) => return,
            };
            let client_handle = match table.get_client(handle) {
                Ok(c) => c,
                Err(_) => return,
            };
            match client_handle.subscriptions.get(&sid) {
                Some(sub) => (sub.renew_at(now_secs()), sub.timeout),
                None => return,
            }
        };
        let renew_at = match renew_at {
            Some(t) => t,
            None => return,
        };

        let delay = Duration::from_secs(renew_at.saturating_sub(now_secs()).max(1));
        let runtime = self.clone();
        self.0.timer.schedule_in(delay, move || {
            match runtime.renew_subscription(handle, &sid, timeout) {
                Ok(()) => runtime.schedule_auto_renew(handle, sid.clone()),
                Err(e) => {
                    warn!("auto-renew failed for sid `{}`: {}", sid, e);
                    let callback = {
                        let mut table = match runtime.0.handles.lock() {
                            Ok(t) => t,
                            Err(_) => return,
                        };
                        match table.get_client(handle) {
                            Ok(c) => c.callback.clone(),
                            Err(_) => return,
                        }
                    };
                    let status = match e {
                        Error::SubscribeUnaccepted(status) => Some(status),
                        _ => None,
                    };
                    callback.handle(Event::EventAutorenewalFailed { sid: sid.clone(), status });
                }
            }
        });
    }

    /// Renew a subscription previously accepted by [`Runtime::subscribe`].
    pub fn renew_subscription(
        &self,
        handle: Handle,
        sid: &str,
        requested_timeout: Option<u64>,
    ) -> Result<(), Error> {
        let mut table = self.0.handles.lock().unwrap();
        let client_handle = table.get_client(handle)?;
        let event_sub_url = client_handle
            .subscriptions
            .get(sid)
            .ok_or_else(|| gena::bad_sid(sid))?
            .event_sub_url
            .clone();
        drop(table);

        let timeout = control_point::renew(&event_sub_url, sid, requested_timeout)?;

        let mut table = self.0.handles.lock().unwrap();
        let client_handle = table.get_client(handle)?;
        client_handle.subscriptions.reschedule(sid, timeout);
        Ok(())
    }

    /// Issue an UNSUBSCRIBE and drop the local subscription regardless of
    /// the outcome (§4.6: local state is dropped unconditionally).
    pub fn unsubscribe(&self, handle: Handle, sid: &str) -> Result<(), Error> {
        let mut table = self.0.handles.lock().unwrap();
        let client_handle = table.get_client(handle)?;
        let event_sub_url = client_handle
            .subscriptions
            .get(sid)
            .ok_or_else(|| gena::bad_sid(sid))?
            .event_sub_url
            .clone();
        drop(table);

        let result = control_point::unsubscribe(&event_sub_url, sid);

        let mut table = self.0.handles.lock().unwrap();
        if let Ok(client_handle) = table.get_client(handle) {
            client_handle.subscriptions.remove(sid);
        }
        result
    }

    fn base_url(&self, prefix: &str) -> String {
        let host = self
            .0
            .server_address_v4
            .map(|a| a.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        format!("http://{}:{}{}", host, self.0.server_port, prefix)
    }

    // ------------------------------------------------------------------------------------------
    // SSDP advertisement (§4.9)
    // ------------------------------------------------------------------------------------------

    fn advertise(&self, handle: Handle, alive: bool) -> Result<(), Error> {
        let mut table = self.0.handles.lock().unwrap();
        let device_handle = table.get_device(handle)?;
        let messages = if alive {
            notify::build_alive_messages(
                &device_handle.device,
                &device_handle.description_url,
                &self.0.server_header,
                &device_handle.advertise_state,
            )
        } else {
            notify::build_byebye_messages(&device_handle.device, &device_handle.advertise_state)
        };
        drop(table);
        notify::send_all(&messages)
    }

    fn send_byebye(&self, handle: Handle) -> Result<(), Error> {
        self.advertise(handle, false)
    }

    fn schedule_next_advertisement(&self, handle: Handle) {
        let max_age = {
            let mut table = self.0.handles.lock().unwrap();
            match table.get_device(handle) {
                Ok(d) => d.advertise_state.max_age_secs,
                Err(_) => return,
            }
        };
        let delay = Duration::from_secs((max_age / 2).max(1));
        let runtime = self.clone();
        let id = self.0.timer.schedule_in(delay, move || {
            if runtime.advertise(handle, true).is_ok() {
                runtime.schedule_next_advertisement(handle);
            }
        });
        if let Ok(mut table) = self.0.handles.lock() {
            if let Ok(d) = table.get_device(handle) {
                d.advertise_timer_id = Some(id);
            }
        }
    }

    // ------------------------------------------------------------------------------------------
    // Control-point search (§4.9)
    // ------------------------------------------------------------------------------------------

    /// Issue an asynchronous M-SEARCH on behalf of a registered client.
    /// Results and the eventual timeout are delivered through that
    /// client's callback.
    pub fn search_async(&self, handle: Handle, target: SearchTarget, mx: u8) -> Result<u64, Error> {
        let callback = {
            let mut table = self.0.handles.lock().unwrap();
            table.get_client(handle)?.callback.clone()
        };
        let search_id = self.0.next_search_id.fetch_add(1, Ordering::SeqCst);
        let mx = search::clamp_mx(mx);
        let user_agent = self.0.server_header.clone();

        let result_target = target.clone();
        let result_callback = callback.clone();
        self.0.pools.send.execute(move || match search::search(&result_target, mx, &user_agent) {
            Ok(responses) => {
                for r in responses {
                    result_callback.handle(Event::DiscoverySearchResult {
                        usn: r.usn,
                        st: r.st,
                        location: r.location,
                        max_age: r.max_age,
                    });
                }
            }
            Err(e) => warn!("search_async - search failed: {}", e),
        });

        self.0.timer.schedule_in(Duration::from_secs(mx as u64 + 2), move || {
            callback.handle(Event::DiscoverySearchTimeout { search_id });
        });
        Ok(search_id)
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions — HTTP daemon (component H, G)
// ------------------------------------------------------------------------------------------------

fn spawn_mini_server(inner: Arc<Inner>, server: Server) -> JoinHandle<()> {
    thread::Builder::new()
        .name("upnp-mini-server".to_string())
        .spawn(move || {
            loop {
                match server.recv_timeout(Duration::from_millis(500)) {
                    Ok(Some(request)) => {
                        let inner = inner.clone();
                        inner.pools.mini_server.execute(move || handle_request(&inner, request));
                    }
                    Ok(None) => {
                        if inner.stop.is_set() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("mini-server - accept failed: {}", e);
                        if inner.stop.is_set() {
                            break;
                        }
                    }
                }
            }
        })
        .expect("spawn mini-server thread")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn header_value(request: &tiny_http::Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str().to_string())
}

fn respond(request: tiny_http::Request, status: u16, headers: Vec<(String, String)>, body: Vec<u8>) {
    debug!(
        "mini-server - {} {} -> {} {}",
        request.method(),
        request.url(),
        status,
        reason_phrase(status)
    );
    let mut response = Response::from_data(body).with_status_code(status);
    for (name, value) in headers {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    if let Err(e) = request.respond(response) {
        warn!("mini-server - failed writing response: {}", e);
    }
}

fn handle_request(inner: &Arc<Inner>, mut request: tiny_http::Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or(&url).to_string();

    if let Some(peer) = request.remote_addr() {
        let gate_ok = inner.webserver.lock().unwrap().gate.is_allowed(peer.ip());
        if !gate_ok {
            return respond(request, 403, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
        }
    }

    if let Some(len) = header_value(&request, "Content-Length").and_then(|v| v.parse::<usize>().ok()) {
        if len > inner.config.max_content_length {
            return respond(request, 413, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
        }
    }

    let soap_action = header_value(&request, HEAD_SOAPACTION);
    let sid = header_value(&request, HEAD_SID);
    let route = dispatcher::route_request(&method, soap_action.is_some(), sid.is_some());

    match route {
        Route::Soap => {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let content_type = header_value(&request, "Content-Type").unwrap_or_default();
            let soap_action = soap_action.unwrap_or_default();
            handle_soap(inner, request, &path, &content_type, &soap_action, &body);
        }
        Route::SoapDeprecated => {
            let man = header_value(&request, HEAD_MAN).unwrap_or_default();
            let header_name = dispatcher::mpost_soapaction_header_name(&man);
            let soap_action = header_name.and_then(|n| header_value(&request, &n)).unwrap_or_default();
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let content_type = header_value(&request, "Content-Type").unwrap_or_default();
            handle_soap(inner, request, &path, &content_type, &soap_action, &body);
        }
        Route::Notify => {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            handle_notify(inner, request, &body);
        }
        Route::SubscribeNew => handle_subscribe_new(inner, request, &path),
        Route::SubscribeRenew => handle_subscribe_renew(inner, request, &path, &sid.unwrap_or_default()),
        Route::Unsubscribe => handle_unsubscribe(inner, request, &path, &sid.unwrap_or_default()),
        Route::Web => handle_web(inner, request, &method, &path),
        Route::Unsupported => {
            let r = dispatcher::not_implemented();
            respond(request, r.status, r.headers, r.body);
        }
    }
}

// -- SOAP (component D, dispatcher route H) --------------------------------------------------

fn handle_soap(
    inner: &Arc<Inner>,
    request: tiny_http::Request,
    path: &str,
    content_type: &str,
    soap_action: &str,
    body: &str,
) {
    if let Ok((service_type_str, action_name)) = crate::soap::parse_soap_action_header(soap_action) {
        if service_type_str == QUERY_STATE_VARIABLE_NS && action_name == QUERY_STATE_VARIABLE_ACTION {
            return respond(
                request,
                400,
                vec![("Content-Length".to_string(), "0".to_string())],
                Vec::new(),
            );
        }
    }

    let mut table = inner.handles.lock().unwrap();
    let (udn, service_id, service_type) = {
        let entry = match table.devices().find_map(|(_, d)| {
            d.service_table.find_by_control_path(path).map(|e| (d.root_device_udn.clone(), e))
        }) {
            Some((udn, entry)) => (udn, entry.service_id.clone(), entry.service_type.clone()),
            None => {
                drop(table);
                return respond(request, 404, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
            }
        };
        entry
    };
    let entry = table
        .devices()
        .find_map(|(_, d)| d.service_table.find_by_control_path(path))
        .expect("path resolved above");

    let inbound = match codec::parse_inbound_request(entry, content_type, soap_action, body) {
        Ok(inbound) => inbound,
        Err(e) => {
            drop(table);
            return respond(
                request,
                400,
                vec![("Content-Length".to_string(), "0".to_string())],
                format!("bad soap request: {}", e).into_bytes(),
            );
        }
    };

    let callback = table
        .devices()
        .find(|(_, d)| d.root_device_udn == udn)
        .map(|(_, d)| d.callback.clone())
        .expect("device present");
    drop(table);

    let responder = ActionResponder::new();
    callback.handle(Event::ControlActionRequest {
        udn,
        service_id,
        action_name: inbound.action_name.clone(),
        args: inbound.args,
        response: responder.clone(),
    });
    let outcome = responder.take().unwrap_or(ActionOutcome::Fault {
        error_code: 501,
        error_description: "no response from application callback".to_string(),
    });

    let (error_code, error_description, result) = match outcome {
        ActionOutcome::Result(args) => (0u32, String::new(), args),
        ActionOutcome::Fault {
            error_code,
            error_description,
        } => (error_code, error_description, Vec::new()),
    };

    match codec::build_inbound_response(&service_type, &inbound.action_name, error_code, &error_description, &result) {
        Ok((status, xml)) => respond(
            request,
            status,
            vec![
                ("Content-Type".to_string(), SOAP_CONTENT_TYPE.to_string()),
                ("Content-Length".to_string(), xml.len().to_string()),
            ],
            xml.into_bytes(),
        ),
        Err(e) => respond(
            request,
            500,
            vec![("Content-Length".to_string(), "0".to_string())],
            format!("{}", e).into_bytes(),
        ),
    }
}

// -- GENA device side (component E) ----------------------------------------------------------

fn handle_subscribe_new(inner: &Arc<Inner>, request: tiny_http::Request, path: &str) {
    let nt = header_value(&request, HEAD_NT);
    if nt.as_deref() != Some(NT_EVENT) {
        return respond(request, 400, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
    }
    let callback_header = header_value(&request, HEAD_CALLBACK).unwrap_or_default();
    let timeout_header = header_value(&request, HEAD_TIMEOUT);
    let requested_timeout = timeout_header
        .as_deref()
        .and_then(|v| gena::parse_timeout_header(v).ok())
        .flatten();

    let mut table = inner.handles.lock().unwrap();
    let (udn, callback) = {
        let found = table.devices().find_map(|(_, d)| {
            d.service_table
                .find_by_event_path(path)
                .map(|_| (d.root_device_udn.clone(), d.callback.clone()))
        });
        match found {
            Some(v) => v,
            None => {
                drop(table);
                return respond(request, 404, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
            }
        }
    };

    let max_subscriptions = inner.config.max_subscriptions;
    let max_timeout = inner.config.max_subscription_timeout;
    let (accepted, service_id_copy) = {
        let device_handle = table.devices().find(|(_, d)| d.root_device_udn == udn).map(|(_, d)| d).unwrap();
        let entry = device_handle.service_table.find_by_event_path(path).unwrap();
        let accepted = match gena_device::handle_subscribe(
            entry,
            &callback_header,
            requested_timeout,
            max_subscriptions,
            max_timeout,
        ) {
            Ok(accepted) => accepted,
            Err(Error::TooManySubscriptions) => {
                drop(table);
                return respond(request, 500, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
            }
            Err(_) => {
                drop(table);
                return respond(request, 400, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
            }
        };
        if let Err(e) = gena_device::accept_subscription(entry, &mut device_handle.event_queues, &accepted.sid, &[]) {
            warn!("subscribe - failed to seed initial event state for sid `{}`: {}", accepted.sid, e);
        }
        let service_id_copy = entry.service_id.clone();
        (accepted, service_id_copy)
    };

    callback.handle(Event::EventSubscriptionRequest {
        udn: udn.clone(),
        service_id: service_id_copy,
        sid: accepted.sid.clone(),
    });

    let inner2 = inner.clone();
    let sid = accepted.sid.clone();
    let udn2 = udn.clone();
    inner.pools.send.execute(move || dispatch_pending_notify(&inner2, &udn2, &sid));
    drop(table);

    let timeout_value = accepted
        .timeout
        .map(|t| format!("Second-{}", t))
        .unwrap_or_else(|| TIMEOUT_INFINITE.to_string());
    respond(
        request,
        200,
        vec![
            (HEAD_SID.to_string(), accepted.sid),
            (HEAD_TIMEOUT.to_string(), timeout_value),
            (HEAD_SERVER.to_string(), inner.server_header.clone()),
            ("Content-Length".to_string(), "0".to_string()),
        ],
        Vec::new(),
    );
}

fn handle_subscribe_renew(inner: &Arc<Inner>, request: tiny_http::Request, path: &str, sid: &str) {
    if header_value(&request, HEAD_NT).is_some() || header_value(&request, HEAD_CALLBACK).is_some() {
        return respond(request, 400, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
    }
    let timeout_header = header_value(&request, HEAD_TIMEOUT);
    let requested_timeout = timeout_header
        .as_deref()
        .and_then(|v| gena::parse_timeout_header(v).ok())
        .flatten();
    let max_timeout = inner.config.max_subscription_timeout;

    let mut table = inner.handles.lock().unwrap();
    let entry = table.devices().find_map(|(_, d)| d.service_table.find_by_event_path(path));
    let entry = match entry {
        Some(e) => e,
        None => {
            drop(table);
            return respond(request, 404, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
        }
    };
    match gena_device::handle_renew(entry, sid, requested_timeout, max_timeout) {
        Ok(renewed) => {
            drop(table);
            let timeout_value = renewed
                .timeout
                .map(|t| format!("Second-{}", t))
                .unwrap_or_else(|| TIMEOUT_INFINITE.to_string());
            respond(
                request,
                200,
                vec![
                    (HEAD_SID.to_string(), sid.to_string()),
                    (HEAD_TIMEOUT.to_string(), timeout_value),
                    ("Content-Length".to_string(), "0".to_string()),
                ],
                Vec::new(),
            );
        }
        Err(_) => {
            drop(table);
            respond(request, 412, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
        }
    }
}

fn handle_unsubscribe(inner: &Arc<Inner>, request: tiny_http::Request, path: &str, sid: &str) {
    if header_value(&request, HEAD_NT).is_some() || header_value(&request, HEAD_CALLBACK).is_some() {
        return respond(request, 400, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
    }
    let mut table = inner.handles.lock().unwrap();
    let device_handle = table.devices().find(|(_, d)| d.service_table.find_by_event_path(path).is_some());
    let device_handle = match device_handle {
        Some((_, d)) => d,
        None => {
            drop(table);
            return respond(request, 404, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
        }
    };
    let entry = device_handle.service_table.find_by_event_path(path).unwrap();
    match gena_device::handle_unsubscribe(entry, &mut device_handle.event_queues, sid) {
        Ok(()) => {
            drop(table);
            respond(request, 200, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
        }
        Err(_) => {
            drop(table);
            respond(request, 412, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
        }
    }
}

/// Deliver whatever is queued for `sid`, chaining to the next queued
/// event on completion (§4.5: "at most one in-flight NOTIFY per
/// subscription").
fn dispatch_pending_notify(inner: &Arc<Inner>, udn: &str, sid: &str) {
    let job = {
        let mut table = inner.handles.lock().unwrap();
        let device_handle = match table.devices().find(|(_, d)| d.root_device_udn == udn) {
            Some((_, d)) => d,
            None => return,
        };
        let entry = device_handle
            .service_table
            .entries_mut()
            .iter_mut()
            .find(|e| e.subscriptions.iter().any(|s| s.sid == sid));
        match entry {
            Some(entry) => gena_device::build_notify_job(entry, &mut device_handle.event_queues, sid),
            None => None,
        }
    };
    if let Some(job) = job {
        match gena_device::send_notify(&job) {
            Ok(gena_device::NotifyOutcome::Delivered) => {
                let inner2 = inner.clone();
                let udn2 = udn.to_string();
                let sid2 = sid.to_string();
                inner.pools.send.execute(move || dispatch_pending_notify(&inner2, &udn2, &sid2));
            }
            Ok(gena_device::NotifyOutcome::Gone) => {
                let mut table = inner.handles.lock().unwrap();
                if let Some((_, device_handle)) = table.devices().find(|(_, d)| d.root_device_udn == udn) {
                    if let Some(entry) = device_handle
                        .service_table
                        .entries_mut()
                        .iter_mut()
                        .find(|e| e.subscriptions.iter().any(|s| s.sid == sid))
                    {
                        let _ = gena_device::handle_unsubscribe(entry, &mut device_handle.event_queues, sid);
                    }
                }
            }
            Ok(gena_device::NotifyOutcome::Failed) | Err(_) => {
                warn!("dispatch_pending_notify - delivery to sid `{}` failed", sid);
            }
        }
    }
}

// -- GENA control-point side (component F) ---------------------------------------------------

fn handle_notify(inner: &Arc<Inner>, request: tiny_http::Request, body: &str) {
    let sid = header_value(&request, HEAD_SID);
    let seq = header_value(&request, HEAD_SEQ).and_then(|v| v.parse::<u32>().ok());
    let (sid, seq) = match (sid, seq) {
        (Some(sid), Some(seq)) => (sid, seq),
        _ => return respond(request, 400, vec![("Content-Length".to_string(), "0".to_string())], Vec::new()),
    };

    let mut table = inner.handles.lock().unwrap();
    let mut handled = false;
    let mut delivered_vars = None;
    let mut callback_to_notify = None;

    // Let each client's table decide for itself: a known SID delivers,
    // an unknown one is buffered against the race where a NOTIFY beats
    // the SUBSCRIBE response's `register` call (§4.6). Stops at the
    // first client that accepts it.
    scan_clients(&mut table, |subs, cb| {
        match subs.handle_notify(&sid, seq, body) {
            Ok(receipt) => {
                handled = true;
                if let NotifyReceipt::Delivered(vars) = receipt {
                    delivered_vars = Some(vars);
                    callback_to_notify = Some(cb.clone());
                }
                true
            }
            Err(_) => false,
        }
    });
    drop(table);

    if !handled {
        return respond(request, 412, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
    }
    if let (Some(vars), Some(callback)) = (delivered_vars, callback_to_notify) {
        callback.handle(Event::EventReceived {
            sid: sid.clone(),
            seq,
            changed_vars: vars,
        });
    }
    respond(request, 200, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
}

/// Visit every registered client's subscription table and callback,
/// stopping at the first `f` that returns `true`.
fn scan_clients(
    table: &mut HandleTable,
    mut f: impl FnMut(&mut ClientSubscriptions, &Arc<dyn Callback>) -> bool,
) -> bool {
    for (_, client) in table.clients() {
        if f(&mut client.subscriptions, &client.callback) {
            return true;
        }
    }
    false
}

// -- Web server (component G) -----------------------------------------------------------------

fn handle_web(inner: &Arc<Inner>, request: tiny_http::Request, method: &str, path: &str) {
    let webserver = inner.webserver.lock().unwrap();
    let info = match webserver.stat(path) {
        Ok(info) => info,
        Err(_) => {
            drop(webserver);
            return respond(request, 404, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
        }
    };

    let range_header = header_value(&request, "Range");
    let range = webserver::parse_range_header(range_header.as_deref(), info.size);
    if range == RangeOutcome::Unsatisfiable {
        drop(webserver);
        return respond(
            request,
            416,
            vec![("Content-Length".to_string(), "0".to_string())],
            Vec::new(),
        );
    }

    let body = if method == "HEAD" {
        Vec::new()
    } else {
        match webserver.read(path, range) {
            Ok(body) => body,
            Err(_) => {
                drop(webserver);
                return respond(request, 404, vec![("Content-Length".to_string(), "0".to_string())], Vec::new());
            }
        }
    };
    let mut headers = webserver::standard_headers(body.len() as u64, &info.content_type, &inner.server_header);
    let status = if let RangeOutcome::Single { start, end } = range {
        headers.push(("Content-Range", format!("bytes {}-{}/{}", start, end, info.size)));
        206
    } else {
        200
    };
    drop(webserver);
    respond(
        request,
        status,
        headers.into_iter().map(|(n, v)| (n.to_string(), v)).collect(),
        body,
    );
}

// ------------------------------------------------------------------------------------------------
// Private Functions — SSDP listener (component I)
// ------------------------------------------------------------------------------------------------

fn spawn_ssdp_listener(inner: Arc<Inner>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("upnp-ssdp".to_string())
        .spawn(move || {
            let options = httpu::Options {
                read_timeout: Duration::from_millis(500),
                ..httpu::Options::default()
            };
            let socket = match httpu::bind_multicast_v4(&options) {
                Ok(socket) => socket,
                Err(e) => {
                    error!("ssdp-listener - failed to bind multicast socket: {}", e);
                    return;
                }
            };
            let mut buf = [0u8; 8192];
            while !inner.stop.is_set() {
                match socket.recv_from(&mut buf) {
                    Ok((n, peer)) => {
                        if let Ok(text) = std::str::from_utf8(&buf[..n]) {
                            if let Ok(message) = httpu::parse_message(text) {
                                handle_ssdp_datagram(&inner, &message, peer);
                            }
                        }
                    }
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut => {}
                    Err(e) => warn!("ssdp-listener - recv failed: {}", e),
                }
            }
        })
        .expect("spawn ssdp listener thread")
}

fn handle_ssdp_datagram(inner: &Arc<Inner>, message: &httpu::Message, peer: std::net::SocketAddr) {
    let start_line = &message.start_line;
    if start_line.starts_with(METHOD_SEARCH) {
        let st = match message.header(HEAD_ST) {
            Some(st) => st,
            None => return,
        };
        let target = match SearchTarget::from_str(st) {
            Ok(target) => target,
            Err(_) => return,
        };
        let mut table = inner.handles.lock().unwrap();
        for (_, device_handle) in table.devices() {
            let matches = search::matching_advertisements(&device_handle.device, &target);
            for (nt, usn) in matches {
                let response = search::build_search_response(
                    &nt,
                    &usn,
                    &device_handle.description_url,
                    &inner.server_header,
                    device_handle.advertise_state.max_age_secs,
                    device_handle.advertise_state.boot_id,
                    device_handle.advertise_state.config_id,
                );
                let _ = httpu::unicast(&response, peer);
            }
        }
    } else if start_line.starts_with(METHOD_NOTIFY) {
        let nts = message.header(HEAD_NTS).unwrap_or("");
        let usn = message.header(HEAD_USN).unwrap_or("").to_string();
        let mut table = inner.handles.lock().unwrap();
        if nts == NTS_ALIVE {
            let location = message.header(HEAD_LOCATION).unwrap_or("").to_string();
            let max_age = message
                .header(HEAD_CACHE_CONTROL)
                .and_then(|v| v.rsplit('=').next())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            scan_clients(&mut table, |_, cb| {
                cb.handle(Event::DiscoveryAdvertisementAlive {
                    usn: usn.clone(),
                    device_type: None,
                    location: location.clone(),
                    max_age,
                });
                false
            });
        } else if nts == NTS_BYEBYE {
            scan_clients(&mut table, |_, cb| {
                cb.handle(Event::DiscoveryAdvertisementByeBye { usn: usn.clone() });
                false
            });
        }
    }
}
