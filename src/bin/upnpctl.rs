//! Command-line front end for `upnp-core`, built behind the
//! `command_line` feature. Keeps the teacher's `structopt` +
//! `human-panic` stack (teacher's `src/bin/upnp.rs`), swapping its
//! `env_logger`/`log` pair for `tracing`/`tracing-subscriber` to match
//! the rest of this crate, and driving the full [`Runtime`] instead of
//! a one-shot search stub.
use human_panic::setup_panic;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;
use upnp_core::callback::Event;
use upnp_core::config::Config;
use upnp_core::runtime::Runtime;
use upnp_core::ssdp::protocol::SearchTarget;

#[derive(Debug, StructOpt)]
#[structopt(name = "upnpctl")]
struct CommandLine {
    /// Verbosity, from off (default) to trace; repeat for more.
    #[structopt(long, short = "v", parse(from_occurrences))]
    verbose: u8,

    /// `"*"`, a comma-separated interface name list, or empty for the
    /// first eligible interface.
    #[structopt(long, short)]
    interface: Option<String>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Issue one M-SEARCH and print the responses collected before MX
    /// elapses.
    Search {
        /// `ssdp:all`, `upnp:rootdevice`, a `uuid:...`, or a device/service
        /// type URN.
        #[structopt(long, short, default_value = "ssdp:all")]
        search_target: String,

        /// Maximum wait, in seconds, advertised to responders.
        #[structopt(long, short, default_value = "3")]
        max_wait: u8,
    },
    /// Register as a control point and print every discovery and
    /// eventing notification observed until interrupted.
    Listen,
    /// Register a root device from a description file and keep it
    /// advertised until interrupted.
    Serve {
        /// Path to the device description XML document.
        #[structopt(parse(from_os_str))]
        description: PathBuf,
    },
}

pub fn main() {
    setup_panic!();

    let args = CommandLine::from_args();
    init_tracing(args.verbose);

    let config = Config::default().with_interface_spec(args.interface.unwrap_or_default());
    let runtime = match Runtime::init(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = match args.cmd {
        Command::Search {
            search_target,
            max_wait,
        } => do_search(&runtime, &search_target, max_wait),
        Command::Listen => do_listen(&runtime),
        Command::Serve { description } => do_serve(&runtime, &description),
    };

    if let Err(e) = runtime.finish() {
        tracing::warn!("upnpctl - runtime shutdown reported: {}", e);
    }

    if let Err(e) = result {
        eprintln!("upnpctl - {}", e);
        std::process::exit(1);
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

fn do_search(runtime: &Runtime, search_target: &str, max_wait: u8) -> Result<(), upnp_core::Error> {
    let target = SearchTarget::from_str(search_target).map_err(upnp_core::Error::from)?;
    let done = Arc::new(AtomicBool::new(false));
    let done_cb = done.clone();
    let callback = Arc::new(move |event: Event| match event {
        Event::DiscoverySearchResult { usn, st, location, max_age } => {
            println!("{} {} max-age={} -> {}", st, usn, max_age, location);
        }
        Event::DiscoverySearchTimeout { .. } => {
            done_cb.store(true, Ordering::SeqCst);
        }
        _ => {}
    });
    let handle = runtime.register_client(callback)?;
    runtime.search_async(handle, target, max_wait)?;
    while !done.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }
    runtime.unregister_client(handle)?;
    Ok(())
}

fn do_listen(runtime: &Runtime) -> Result<(), upnp_core::Error> {
    let callback = Arc::new(|event: Event| println!("{:#?}", event));
    let handle = runtime.register_client(callback)?;
    println!("listening for SSDP and GENA traffic, press Ctrl-C to stop");
    await_ctrl_c();
    runtime.unregister_client(handle)?;
    Ok(())
}

fn do_serve(runtime: &Runtime, description: &std::path::Path) -> Result<(), upnp_core::Error> {
    let callback = Arc::new(|event: Event| println!("{:#?}", event));
    let handle = runtime.register_root_device_from_file(description, callback)?;
    println!("device registered and advertised, press Ctrl-C to stop");
    await_ctrl_c();
    runtime.unregister_root_device(handle)?;
    Ok(())
}

fn await_ctrl_c() {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    let _ = ctrlc_fallback(move || stop_handler.store(true, Ordering::SeqCst));
    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }
}

/// No `ctrlc` crate in this lineage's dependency stack; instead of
/// pulling one in for a single CLI convenience, read a line from stdin
/// and treat EOF/newline as the stop signal.
fn ctrlc_fallback(on_stop: impl FnOnce() + Send + 'static) -> std::io::Result<()> {
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        on_stop();
    });
    Ok(())
}
