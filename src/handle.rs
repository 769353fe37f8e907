/*!
Handle table (component J): the process-wide registry of registered
devices and control points, each identified by an opaque [`Handle`]
handed back at registration and required on every subsequent call
against that registration.

No teacher equivalent (the teacher never registered more than one
thing at a time); fixed-capacity table shape grounded in the spec's
"no unbounded growth" framing for process-wide registries (§3, §4.1).
*/
use crate::callback::Callback;
use crate::description::device::DeviceDesc;
use crate::error::Error;
use crate::gena::control_point::ClientSubscriptions;
use crate::gena::device::EventQueues;
use crate::service_table::ServiceTable;
use crate::ssdp::notify::AdvertiseState;
use std::collections::HashMap;
use std::sync::Arc;

/// Default capacity of the process-wide handle table.
pub const DEFAULT_HANDLE_CAPACITY: usize = 200;

pub type Handle = i32;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// State kept for a registered root device.
pub struct DeviceHandle {
    pub root_device_udn: String,
    pub description_url: String,
    pub description_path: String,
    pub device: DeviceDesc,
    pub service_table: ServiceTable,
    pub event_queues: EventQueues,
    pub callback: Arc<dyn Callback>,
    pub advertise_state: AdvertiseState,
    pub advertise_timer_id: Option<crate::timer::TimerId>,
}

/// State kept for a registered control point.
pub struct ClientHandle {
    pub subscriptions: ClientSubscriptions,
    pub callback: Arc<dyn Callback>,
}

/// What one handle refers to.
pub enum HandleInfo {
    Device(DeviceHandle),
    Client(ClientHandle),
}

/// The process-wide table, capped at a fixed capacity so a misbehaving
/// caller cannot grow it without bound.
pub struct HandleTable {
    entries: HashMap<Handle, HandleInfo>,
    next_handle: Handle,
    capacity: usize,
}

impl HandleTable {
    pub fn new(capacity: usize) -> Self {
        HandleTable {
            entries: HashMap::new(),
            next_handle: 1,
            capacity,
        }
    }

    fn allocate(&mut self, info: HandleInfo) -> Result<Handle, Error> {
        if self.entries.len() >= self.capacity {
            return Err(Error::OutOfHandle);
        }
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        self.entries.insert(handle, info);
        Ok(handle)
    }

    pub fn register_device(&mut self, info: DeviceHandle) -> Result<Handle, Error> {
        self.allocate(HandleInfo::Device(info))
    }

    pub fn register_client(&mut self, info: ClientHandle) -> Result<Handle, Error> {
        self.allocate(HandleInfo::Client(info))
    }

    pub fn unregister(&mut self, handle: Handle) -> Result<HandleInfo, Error> {
        self.entries.remove(&handle).ok_or(Error::InvalidHandle)
    }

    pub fn get_device(&mut self, handle: Handle) -> Result<&mut DeviceHandle, Error> {
        match self.entries.get_mut(&handle) {
            Some(HandleInfo::Device(d)) => Ok(d),
            _ => Err(Error::InvalidHandle),
        }
    }

    pub fn get_client(&mut self, handle: Handle) -> Result<&mut ClientHandle, Error> {
        match self.entries.get_mut(&handle) {
            Some(HandleInfo::Client(c)) => Ok(c),
            _ => Err(Error::InvalidHandle),
        }
    }

    pub fn devices(&mut self) -> impl Iterator<Item = (&Handle, &mut DeviceHandle)> {
        self.entries.iter_mut().filter_map(|(h, info)| match info {
            HandleInfo::Device(d) => Some((h, d)),
            HandleInfo::Client(_) => None,
        })
    }

    pub fn clients(&mut self) -> impl Iterator<Item = (&Handle, &mut ClientHandle)> {
        self.entries.iter_mut().filter_map(|(h, info)| match info {
            HandleInfo::Client(c) => Some((h, c)),
            HandleInfo::Device(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        HandleTable::new(DEFAULT_HANDLE_CAPACITY)
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
