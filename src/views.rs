//! View state holders. Each logical resource (file list, device list, ...) has one
//! `ViewSlot`; a newer load supersedes any older one still in flight.

use std::future::Future;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ConsoleError, ConsoleResult};

/// Handle for one load started with [`ViewSlot::begin`].
#[derive(Debug, Clone)]
pub struct ViewTicket {
    generation: u64,
    cancel: CancellationToken,
}

impl ViewTicket {
    pub fn generation(&self) -> u64 { self.generation }

    pub fn token(&self) -> &CancellationToken { &self.cancel }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<T> {
    pub value: Option<T>,
    /// Only renderable errors; silent ones never land here.
    pub error: Option<ConsoleError>,
    pub loading: bool,
    pub generation: u64,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self { Self { value: None, error: None, loading: false, generation: 0 } }
}

struct Slot<T> {
    state: ViewState<T>,
    current: Option<CancellationToken>,
}

pub struct ViewSlot<T> {
    name: &'static str,
    inner: Mutex<Slot<T>>,
}

impl<T: Clone> ViewSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self { name, inner: Mutex::new(Slot { state: ViewState::default(), current: None }) }
    }

    pub fn name(&self) -> &'static str { self.name }

    /// Start a load: cancels the previous one, bumps the generation and clears the
    /// previous error. The ticket's token is a child of `parent`.
    pub fn begin(&self, parent: &CancellationToken) -> ViewTicket {
        let mut slot = self.inner.lock();
        if let Some(prev) = slot.current.take() {
            prev.cancel();
        }
        let cancel = parent.child_token();
        slot.state.generation += 1;
        slot.state.loading = true;
        slot.state.error = None;
        slot.current = Some(cancel.clone());
        ViewTicket { generation: slot.state.generation, cancel }
    }

    /// Apply a finished load. Ignored unless `ticket` is still the latest and was not
    /// cancelled. Returns true when the slot changed.
    pub fn complete(&self, ticket: &ViewTicket, result: ConsoleResult<T>) -> bool {
        let mut slot = self.inner.lock();
        if self.is_stale(&slot, ticket) {
            return false;
        }
        self.apply(&mut slot, result)
    }

    /// Like `complete`, but hands the outcome back to the submitter. A superseded or
    /// cancelled ticket yields `Cancelled` and leaves the slot untouched.
    pub fn settle(&self, ticket: &ViewTicket, result: ConsoleResult<T>) -> ConsoleResult<T> {
        let mut slot = self.inner.lock();
        if self.is_stale(&slot, ticket) {
            return Err(ConsoleError::Cancelled);
        }
        self.apply(&mut slot, result.clone());
        result
    }

    fn is_stale(&self, slot: &Slot<T>, ticket: &ViewTicket) -> bool {
        let stale = ticket.generation != slot.state.generation || ticket.cancel.is_cancelled();
        if stale {
            debug!(view = self.name, generation = ticket.generation, current = slot.state.generation, "view: dropping stale result");
        }
        stale
    }

    fn apply(&self, slot: &mut Slot<T>, result: ConsoleResult<T>) -> bool {
        slot.state.loading = false;
        slot.current = None;
        match result {
            Ok(value) => {
                slot.state.value = Some(value);
                slot.state.error = None;
                true
            }
            Err(e) if e.is_silent() => {
                debug!(view = self.name, "view: silent failure: {}", e.code_str());
                false
            }
            Err(e) => {
                slot.state.error = Some(e);
                true
            }
        }
    }

    /// `begin`, run `load` with the ticket's token, then `complete`.
    pub async fn refresh<F, Fut>(&self, parent: &CancellationToken, load: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ConsoleResult<T>>,
    {
        let ticket = self.begin(parent);
        let result = load(ticket.cancel.clone()).await;
        self.complete(&ticket, result)
    }

    pub fn snapshot(&self) -> ViewState<T> { self.inner.lock().state.clone() }

    pub fn value(&self) -> Option<T> { self.inner.lock().state.value.clone() }

    pub fn error(&self) -> Option<ConsoleError> { self.inner.lock().state.error.clone() }

    /// Look at the held value without cloning it.
    pub fn inspect<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R { f(self.inner.lock().state.value.as_ref()) }

    /// Cancel any in-flight load and forget the held value.
    pub fn reset(&self) {
        let mut slot = self.inner.lock();
        if let Some(prev) = slot.current.take() {
            prev.cancel();
        }
        let generation = slot.state.generation + 1;
        slot.state = ViewState { generation, ..ViewState::default() };
    }
}
