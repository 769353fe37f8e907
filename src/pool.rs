/*!
Worker pools (§4.1): the three named pools the runtime hands work to —
`send` (outbound SOAP/GENA/SSDP traffic), `receive` (inbound request
decoding), and `mini_server` (the HTTP daemon's accept loop) — each a
thin wrapper over [`threadpool::ThreadPool`].

Grounded on the teacher's reliance on `threadpool` for its own
synchronous-worker demo code; split into three named pools because the
spec requires that a stalled outbound NOTIFY cannot starve inbound
SOAP handling.
*/
use threadpool::ThreadPool;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// The runtime's three worker pools.
pub struct Pools {
    pub send: ThreadPool,
    pub receive: ThreadPool,
    pub mini_server: ThreadPool,
}

impl Pools {
    pub fn new(send_threads: usize, receive_threads: usize, mini_server_threads: usize) -> Self {
        Pools {
            send: ThreadPool::with_name("upnp-send".to_string(), send_threads.max(1)),
            receive: ThreadPool::with_name("upnp-receive".to_string(), receive_threads.max(1)),
            mini_server: ThreadPool::with_name("upnp-mini-server".to_string(), mini_server_threads.max(1)),
        }
    }

    /// Wait for every queued job across all three pools to finish.
    pub fn join_all(&self) {
        self.send.join();
        self.receive.join();
        self.mini_server.join();
    }
}

impl Default for Pools {
    fn default() -> Self {
        // Defaults mirror the teacher's own single-digit worker counts;
        // these are not latency-critical pools.
        Pools::new(2, 4, 2)
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn pools_run_submitted_jobs() {
        let pools = Pools::default();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = count.clone();
            pools.send.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pools.join_all();
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn zero_thread_request_is_clamped_to_one() {
        let pools = Pools::new(0, 0, 0);
        assert_eq!(pools.send.max_count(), 1);
    }
}
