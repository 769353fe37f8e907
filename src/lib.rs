/*!
An embeddable UPnP device and control point runtime.

Covers the pieces of the UPnP Device Architecture an embedding
application needs to both advertise a device and act as a control
point against other devices on the network: SSDP discovery and
advertisement ([`ssdp`]), device description parsing and serving
([`description`], [`webserver`]), SOAP action invocation
([`soap`]), and GENA eventing ([`gena`]). [`runtime::Runtime`] wires
all of these into one process-wide instance; [`handle`] is the
registry it uses to track what has been registered against it.

# Example

```no_run
use std::sync::Arc;
use upnp_core::callback::Event;
use upnp_core::config::Config;
use upnp_core::runtime::Runtime;

let runtime = Runtime::init(Config::default())?;
let callback = Arc::new(|event: Event| {
    println!("{:?}", event);
});
let handle = runtime.register_root_device_from_file(
    std::path::Path::new("device.xml"),
    callback,
)?;
runtime.unregister_root_device(handle)?;
runtime.finish()?;
# Ok::<(), upnp_core::error::Error>(())
```

No teacher equivalent for this file itself (the teacher crate had no
`lib.rs` crate-root documentation of this shape, only a thin
`main.rs`); module list and doc style follow the density the teacher
uses at the top of its own larger modules.
*/
pub mod callback;
pub mod config;
pub mod description;
pub mod error;
pub mod gena;
pub mod handle;
pub mod interface;
pub mod pool;
pub mod runtime;
pub mod service_table;
pub mod soap;
pub mod ssdp;
pub mod statcodes;
pub mod syntax;
pub mod timer;
pub mod uri;
pub mod webserver;
pub mod xml;

mod dispatcher;

pub use error::Error;
