/*!
The shared timer thread (§4.1): a single background thread services
every scheduled job — auto-renewal, auto-advertisement, subscription
expiry — rather than spawning one thread per timer.

No teacher equivalent (the teacher had no scheduled work); a min-heap
plus condvar is the standard shape for this and needs no crate beyond
the standard library's own synchronization primitives.
*/
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub type TimerId = u64;

type Job = Box<dyn FnOnce() + Send + 'static>;

// ------------------------------------------------------------------------------------------------
// Private Types
// ------------------------------------------------------------------------------------------------

struct Entry {
    when: Instant,
    id: TimerId,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.id == other.id
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.when.cmp(&other.when).then(self.id.cmp(&other.id))
    }
}

struct Shared {
    queue: BinaryHeap<std::cmp::Reverse<Entry>>,
    jobs: HashMap<TimerId, Job>,
    next_id: TimerId,
    shutdown: bool,
}

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A single background thread that runs jobs at a scheduled instant.
/// Dropping a `Timer` leaves its thread running until [`Timer::shutdown`]
/// is called explicitly; the runtime owns one for its whole lifetime.
pub struct Timer {
    shared: Arc<(Mutex<Shared>, Condvar)>,
}

impl Timer {
    pub fn start() -> Self {
        let shared = Arc::new((
            Mutex::new(Shared {
                queue: BinaryHeap::new(),
                jobs: HashMap::new(),
                next_id: 1,
                shutdown: false,
            }),
            Condvar::new(),
        ));
        let worker = shared.clone();
        thread::Builder::new()
            .name("upnp-timer".to_string())
            .spawn(move || run(worker))
            .expect("spawn timer thread");
        Timer { shared }
    }

    /// Schedule `job` to run at `when`. Returns an id that can later be
    /// passed to [`Timer::cancel`].
    pub fn schedule_at(&self, when: Instant, job: impl FnOnce() + Send + 'static) -> TimerId {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.queue.push(std::cmp::Reverse(Entry { when, id }));
        state.jobs.insert(id, Box::new(job));
        cvar.notify_all();
        id
    }

    /// Schedule `job` to run after `delay`.
    pub fn schedule_in(&self, delay: Duration, job: impl FnOnce() + Send + 'static) -> TimerId {
        self.schedule_at(Instant::now() + delay, job)
    }

    /// Cancel a scheduled job. Returns `false` if it already ran or was
    /// already cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        let (lock, _) = &*self.shared;
        let mut state = lock.lock().unwrap();
        state.jobs.remove(&id).is_some()
    }

    /// Stop the background thread. No further scheduled jobs will run.
    pub fn shutdown(&self) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        state.shutdown = true;
        cvar.notify_all();
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn run(shared: Arc<(Mutex<Shared>, Condvar)>) {
    let (lock, cvar) = &*shared;
    loop {
        let mut state = lock.lock().unwrap();
        let due_id = loop {
            if state.shutdown {
                return;
            }
            match state.queue.peek() {
                None => {
                    state = cvar.wait(state).unwrap();
                }
                Some(std::cmp::Reverse(entry)) => {
                    let now = Instant::now();
                    if entry.when <= now {
                        break state.queue.pop().unwrap().0.id;
                    }
                    let (next, _) = cvar.wait_timeout(state, entry.when - now).unwrap();
                    state = next;
                }
            }
        };
        let job = state.jobs.remove(&due_id);
        drop(state);
        if let Some(job) = job {
            job();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
