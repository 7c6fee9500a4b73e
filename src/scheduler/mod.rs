use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::media::MediaSource;
use crate::store::{FetchTicket, StateStore};

/// Polls a [`MediaSource`] on a fixed interval and feeds the results into a
/// [`StateStore`]. At most one fetch is in flight at any time.
pub struct PollScheduler {
    shared: Arc<Shared>,
    timer: Mutex<Option<Timer>>,
}

struct Timer {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

struct Shared {
    source: Box<dyn MediaSource>,
    store: StateStore,
    interval: Duration,
    fetching: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Default)]
struct Lifecycle {
    // Generation of the current run, `None` while stopped.
    active: Option<u64>,
    next: u64,
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One fetch in flight. Dropping it returns the scheduler to idle, so a
/// panicking source cannot leave the guard or the loading flag set.
struct InFlight {
    shared: Arc<Shared>,
    generation: u64,
    ticket: Option<FetchTicket>,
}

impl InFlight {
    fn run(mut self) {
        let result = self.shared.source.fetch();
        let Some(ticket) = self.ticket.take() else {
            return;
        };

        let lifecycle = self.shared.lifecycle();
        if lifecycle.active == Some(self.generation) {
            self.shared.store.apply_result(ticket, result);
        } else {
            debug!("Scheduler stopped during fetch, dropping result");
            self.shared.store.discard(ticket);
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            error!("Media fetch panicked, dropping result");
            self.shared.store.discard(ticket);
        }
        self.shared.fetching.store(false, Ordering::Release);
    }
}

impl PollScheduler {
    pub fn new<S>(source: S, store: StateStore, interval: Duration) -> Self
    where
        S: MediaSource + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                source: Box::new(source),
                store,
                interval,
                fetching: AtomicBool::new(false),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.shared.store
    }

    fn timer(&self) -> MutexGuard<'_, Option<Timer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch immediately, then again on every interval. Starting twice is a no-op.
    pub fn start(&self) {
        let mut timer = self.timer();
        if timer.is_some() {
            return;
        }

        {
            let mut lifecycle = self.shared.lifecycle();
            lifecycle.next += 1;
            lifecycle.active = Some(lifecycle.next);
        }

        info!(
            "Polling media state every {}s",
            self.shared.interval.as_secs_f64()
        );
        try_fetch(&self.shared);

        let (stop_tx, stop_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(shared.interval) {
                Err(RecvTimeoutError::Timeout) => {
                    try_fetch(&shared);
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        *timer = Some(Timer { stop_tx, handle });
    }

    /// Cancel the timer. A fetch already in flight completes but its result is dropped.
    pub fn stop(&self) {
        let timer = self.timer().take();
        self.shared.lifecycle().active = None;

        if let Some(timer) = timer {
            let _ = timer.stop_tx.send(());
            if timer.handle.join().is_err() {
                error!("Poll timer thread panicked");
            }
            info!("Polling stopped");
        }
    }

    /// Request an out-of-band fetch. Returns `false` if one is already running
    /// or the scheduler is stopped.
    pub fn refresh_now(&self) -> bool {
        try_fetch(&self.shared)
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.shared.lifecycle().active.is_some()
    }

    #[cfg(test)]
    pub fn is_fetching(&self) -> bool {
        self.shared.fetching.load(Ordering::Acquire)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn try_fetch(shared: &Arc<Shared>) -> bool {
    let Some(generation) = shared.lifecycle().active else {
        return false;
    };

    if shared
        .fetching
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("Fetch already in flight, skipping");
        return false;
    }

    let in_flight = InFlight {
        shared: Arc::clone(shared),
        generation,
        ticket: Some(shared.store.begin_fetch()),
    };
    thread::spawn(move || in_flight.run());

    true
}
