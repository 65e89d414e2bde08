// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observation sessions and the guard that publishes their results.

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::{ObserverState, StateChange};

/// Lifecycle phase of an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObserverPhase {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// Initial read in flight.
    Connecting,
    /// Observing: a long-poll request is in flight.
    Polling,
    /// Observing: waiting out the backoff after a failure.
    Backoff,
}

impl ObserverPhase {
    /// Returns `true` while the poll loop runs.
    #[must_use]
    pub const fn is_observing(&self) -> bool {
        matches!(self, Self::Polling | Self::Backoff)
    }
}

/// Identity of one observation session.
///
/// Also used as a ticket for one-off reads made outside a session: a result
/// is only published while the ticket still matches the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SessionId(u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    active: bool,
    phase: ObserverPhase,
}

/// Single point through which published state is mutated.
///
/// Starting or ending a session bumps the generation under the same lock
/// every publish takes, so a result carrying an older generation can never
/// land after a newer session started or after `end` returned.
#[derive(Debug)]
pub(crate) struct Publisher {
    slot: Mutex<Slot>,
    state_tx: watch::Sender<ObserverState>,
}

impl Publisher {
    pub(crate) fn new() -> Self {
        let (state_tx, _) = watch::channel(ObserverState::new());
        Self {
            slot: Mutex::new(Slot::default()),
            state_tx,
        }
    }

    /// Starts a new generation as an active session.
    pub(crate) fn begin(&self) -> SessionId {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.active = true;
        slot.phase = ObserverPhase::Connecting;
        self.state_tx
            .send_if_modified(|state| state.apply(&StateChange::Restarted));
        SessionId(slot.generation)
    }

    /// Ends the active session, if any.
    ///
    /// Returns `false` if no session was active.
    pub(crate) fn end(&self) -> bool {
        let mut slot = self.slot.lock();
        if !slot.active {
            return false;
        }
        slot.generation += 1;
        slot.active = false;
        slot.phase = ObserverPhase::Idle;
        true
    }

    /// Returns a ticket for the current generation.
    pub(crate) fn ticket(&self) -> SessionId {
        SessionId(self.slot.lock().generation)
    }

    /// Applies `change` if `id` is still current.
    ///
    /// Returns `false` if the result is stale and was discarded.
    pub(crate) fn publish(&self, id: SessionId, change: &StateChange) -> bool {
        let slot = self.slot.lock();
        if slot.generation != id.0 {
            return false;
        }
        self.state_tx.send_if_modified(|state| state.apply(change));
        true
    }

    /// Moves the session `id` to `phase` if it is still current.
    pub(crate) fn enter(&self, id: SessionId, phase: ObserverPhase) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != id.0 || !slot.active {
            return false;
        }
        slot.phase = phase;
        true
    }

    pub(crate) fn phase(&self) -> ObserverPhase {
        self.slot.lock().phase
    }

    pub(crate) fn state(&self) -> ObserverState {
        self.state_tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ObserverState> {
        self.state_tx.subscribe()
    }
}

/// Run context of one observation lifetime.
///
/// Owned by the observer from `connect` to `disconnect`. Dropping it cancels
/// the in-flight request and any backoff wait of its loop task.
#[derive(Debug)]
pub(crate) struct ObserverSession {
    id: SessionId,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ObserverSession {
    pub(crate) fn new(id: SessionId, token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { id, token, task }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ObserverSession {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
