use chrono::Utc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::media::MediaError;
use crate::models::{MediaState, ServiceStatus, StatusEvent};

/// Issued when a fetch begins. Records whether that fetch raised the loading flag,
/// so only the same fetch lowers it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct FetchTicket {
    raised_loading: bool,
}

/// Shared, mutex-guarded owner of the [`ServiceStatus`].
///
/// Cloning yields another handle to the same status. Every write goes through
/// this type and observers are only notified when an observable field changes.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    status: ServiceStatus,
    // Set once the first fetch has completed.
    settled: bool,
    observers: Vec<Sender<StatusEvent>>,
}

impl Inner {
    fn notify(&mut self, event: StatusEvent) {
        self.status.revision += 1;
        self.status.updated_at = Some(Utc::now());
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lower_loading(&mut self, ticket: FetchTicket) {
        if ticket.raised_loading && self.status.is_loading {
            self.status.is_loading = false;
            self.notify(StatusEvent::Loading(false));
        }
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ServiceStatus {
        self.lock().status.clone()
    }

    /// Receive every future [`StatusEvent`], in the order they were applied.
    pub fn subscribe(&self) -> Receiver<StatusEvent> {
        let (tx, rx) = mpsc::channel();
        self.lock().observers.push(tx);
        rx
    }

    /// Mark the start of a fetch. Only a cold store shows a loading state.
    pub fn begin_fetch(&self) -> FetchTicket {
        let mut inner = self.lock();
        let cold = !inner.settled
            && inner.status.current_state.is_empty()
            && inner.status.last_error.is_none();

        if cold && !inner.status.is_loading {
            inner.status.is_loading = true;
            inner.notify(StatusEvent::Loading(true));
            FetchTicket {
                raised_loading: true,
            }
        } else {
            FetchTicket {
                raised_loading: false,
            }
        }
    }

    /// Apply the outcome of a fetch.
    pub fn apply_result(&self, ticket: FetchTicket, result: Result<MediaState, MediaError>) {
        let mut inner = self.lock();
        inner.settled = true;

        match result {
            Ok(state) if state != inner.status.current_state => {
                info!(
                    "Media changed: {} -> {}",
                    describe(&inner.status.current_state),
                    describe(&state)
                );
                inner.status.current_state = state.clone();
                inner.status.last_error = None;
                inner.notify(StatusEvent::Updated(state));
            }
            Ok(_) => {
                debug!("Media unchanged, skipping update");
            }
            Err(err) => {
                let message = err.to_string();
                let changed = inner.status.last_error.as_deref() != Some(message.as_str())
                    || !inner.status.current_state.is_empty();

                if changed {
                    warn!("Media fetch failed: {message}");
                    inner.status.last_error = Some(message.clone());
                    inner.status.current_state = MediaState::EMPTY;
                    inner.notify(StatusEvent::Failed(message));
                } else {
                    debug!("Media fetch failed again with the same error");
                }
            }
        }

        inner.lower_loading(ticket);
    }

    /// Finish a fetch whose result is being thrown away.
    pub fn discard(&self, ticket: FetchTicket) {
        self.lock().lower_loading(ticket);
    }
}

fn describe(state: &MediaState) -> String {
    if state.is_empty() {
        "nothing".to_string()
    } else {
        state.menu_bar_text()
    }
}
