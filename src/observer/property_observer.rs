// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The property observer and its observation loop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result, ValueError};
use crate::payload::normalize;
use crate::protocol::Transport;
use crate::state::{ConnectionStatus, ObserverState, StateChange};
use crate::types::PowerState;

use super::observer_config::{InvalidPayloadPolicy, ObserverConfig};
use super::session::{ObserverPhase, ObserverSession, Publisher, SessionId};

/// Keeps a local power state synchronized with a remote lamp.
///
/// The observer reads the property once, then observes it until
/// [`disconnect`](Self::disconnect) is called. Failures are recorded on the
/// published state and retried after a fixed backoff; they never stop the
/// loop.
///
/// Writes are never applied locally: the new value is published when the
/// remote reports it.
///
/// # Examples
///
/// ```no_run
/// use wot_lamp::{ObserverConfig, PowerState, PropertyObserver};
///
/// # async fn example() -> wot_lamp::Result<()> {
/// let observer = PropertyObserver::from_config(ObserverConfig::default()).await?;
/// let mut state = observer.subscribe();
///
/// observer.connect();
/// observer.request_write(PowerState::On).await?;
///
/// state.wait_for(|s| s.is_on()).await.ok();
/// observer.disconnect();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PropertyObserver<T: Transport> {
    transport: Arc<T>,
    publisher: Arc<Publisher>,
    session: Mutex<Option<ObserverSession>>,
    options: LoopOptions,
}

#[derive(Debug, Clone, Copy)]
struct LoopOptions {
    backoff: Duration,
    invalid_payload_policy: InvalidPayloadPolicy,
}

#[cfg(any(feature = "http", feature = "mqtt"))]
impl PropertyObserver<crate::protocol::AnyTransport> {
    /// Creates an observer with the transport selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the transport cannot be created.
    pub async fn from_config(config: ObserverConfig) -> Result<Self> {
        let transport = crate::protocol::AnyTransport::connect(&config).await?;
        Ok(Self::new(transport)
            .with_backoff(config.backoff())
            .with_invalid_payload_policy(config.invalid_payload_policy()))
    }
}

impl<T: Transport> PropertyObserver<T> {
    /// Creates an idle observer over `transport` with default options.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            publisher: Arc::new(Publisher::new()),
            session: Mutex::new(None),
            options: LoopOptions {
                backoff: ObserverConfig::DEFAULT_BACKOFF,
                invalid_payload_policy: InvalidPayloadPolicy::default(),
            },
        }
    }

    /// Sets the fixed backoff after a failed observation.
    ///
    /// Applies to sessions started afterwards.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.options.backoff = backoff;
        self
    }

    /// Sets the policy for successful responses that do not normalize.
    #[must_use]
    pub fn with_invalid_payload_policy(mut self, policy: InvalidPayloadPolicy) -> Self {
        self.options.invalid_payload_policy = policy;
        self
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // =========================================================================
    // Published surface
    // =========================================================================

    /// Returns a snapshot of the published state.
    #[must_use]
    pub fn state(&self) -> ObserverState {
        self.publisher.state()
    }

    /// Subscribes to published state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ObserverState> {
        self.publisher.subscribe()
    }

    /// Returns the published power state.
    #[must_use]
    pub fn power(&self) -> PowerState {
        self.state().power()
    }

    /// Returns `true` if the published power state is `On`.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.state().is_on()
    }

    /// Returns the derived connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.state().status()
    }

    /// Returns the last recorded error message.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error().map(str::to_owned)
    }

    /// Returns the lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ObserverPhase {
        self.publisher.phase()
    }

    /// Returns `true` while a session's loop task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| !session.is_finished())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Starts a new observation session.
    ///
    /// Returns immediately; the initial read and the poll loop run on a
    /// spawned task. Any active session is cancelled first.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn connect(&self) {
        let mut slot = self.session.lock();

        if let Some(previous) = slot.take() {
            self.publisher.end();
            tracing::info!(session = %previous.id(), "Replacing observation session");
        }

        let id = self.publisher.begin();
        let token = CancellationToken::new();
        let task = tokio::spawn(run_session(
            Arc::clone(&self.transport),
            Arc::clone(&self.publisher),
            id,
            token.clone(),
            self.options,
        ));

        tracing::info!(session = %id, "Observation session started");
        *slot = Some(ObserverSession::new(id, token, task));
    }

    /// Stops the active session.
    ///
    /// Cancels the in-flight request and any backoff wait. Once this returns,
    /// the stopped session can no longer change the published state. Calling
    /// it while idle does nothing.
    pub fn disconnect(&self) {
        let mut slot = self.session.lock();
        let Some(session) = slot.take() else {
            return;
        };
        self.publisher.end();
        drop(slot);
        tracing::info!(session = %session.id(), "Observation session stopped");
    }

    /// Stops the active session, if any, and starts a fresh one.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn reconnect(&self) {
        self.disconnect();
        self.connect();
    }

    /// Reads the property once and publishes the result.
    ///
    /// The value is not published if a session starts or stops while the
    /// read is in flight. Failures are returned, not recorded.
    ///
    /// # Errors
    ///
    /// Returns `Error::Read` if the transport fails, or
    /// `Error::InvalidPayload` if the body does not normalize.
    pub async fn read_initial(&self) -> Result<PowerState> {
        let ticket = self.publisher.ticket();
        let power = fetch_power(self.transport.as_ref()).await?;
        self.publisher.publish(ticket, &StateChange::Received(power));
        Ok(power)
    }

    /// Asks the remote to switch to `desired`.
    ///
    /// The published state is left untouched; the new value arrives through
    /// observation.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` for `Unknown`, or `Error::Write` if the request
    /// fails or is rejected.
    pub async fn request_write(&self, desired: PowerState) -> Result<()> {
        if !desired.is_known() {
            return Err(ValueError::NotWritable.into());
        }

        tracing::debug!(state = %desired, "Requesting power state change");

        self.transport.write(desired).await.map_err(|e| {
            tracing::warn!(error = %e, state = %desired, "Power state write failed");
            Error::Write(e)
        })
    }

    /// Requests the opposite of the published power state.
    ///
    /// `Unknown` counts as off. Returns the requested state.
    ///
    /// # Errors
    ///
    /// Returns `Error::Write` if the request fails or is rejected.
    pub async fn toggle(&self) -> Result<PowerState> {
        let target = self.power().toggled();
        self.request_write(target).await?;
        Ok(target)
    }
}

impl<T: Transport> Drop for PropertyObserver<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn fetch_power<T: Transport>(transport: &T) -> Result<PowerState> {
    let raw = transport.read().await.map_err(Error::Read)?;
    Ok(normalize(&raw)?)
}

/// Body of one observation session.
///
/// Every mutation goes through `publisher`, which rejects it once the session
/// is no longer current; a rejected mutation ends the loop.
async fn run_session<T: Transport>(
    transport: Arc<T>,
    publisher: Arc<Publisher>,
    id: SessionId,
    token: CancellationToken,
    options: LoopOptions,
) {
    let initial = tokio::select! {
        biased;
        () = token.cancelled() => return,
        result = fetch_power(transport.as_ref()) => result,
    };

    let change = match initial {
        Ok(power) => {
            tracing::debug!(session = %id, state = %power, "Initial read succeeded");
            StateChange::Received(power)
        }
        Err(e) => {
            tracing::warn!(session = %id, error = %e, "Initial read failed, observing anyway");
            StateChange::failed(e)
        }
    };
    if !publisher.publish(id, &change) {
        return;
    }

    loop {
        if !publisher.enter(id, ObserverPhase::Polling) {
            break;
        }

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => break,
            result = transport.observe() => result,
        };

        let failure = match outcome {
            Ok(raw) => match normalize(&raw) {
                Ok(power) => {
                    if !publisher.publish(id, &StateChange::Received(power)) {
                        break;
                    }
                    continue;
                }
                Err(e) => match options.invalid_payload_policy {
                    InvalidPayloadPolicy::Ignore => {
                        tracing::warn!(session = %id, error = %e, "Ignoring unrecognized payload");
                        continue;
                    }
                    InvalidPayloadPolicy::Report => Error::InvalidPayload(e),
                },
            },
            Err(e) => Error::Observe(e),
        };

        tracing::warn!(
            session = %id,
            error = %failure,
            backoff = ?options.backoff,
            "Observation failed, retrying after backoff"
        );

        if !publisher.publish(id, &StateChange::failed(&failure))
            || !publisher.enter(id, ObserverPhase::Backoff)
        {
            break;
        }

        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = tokio::time::sleep(options.backoff) => {}
        }
    }

    tracing::debug!(session = %id, "Observation loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use crate::error::TransportError;
    use crate::payload::RawPayload;

    /// Transport that answers reads from a queue and never completes a poll.
    #[derive(Default)]
    struct StaticTransport {
        reads: Mutex<VecDeque<std::result::Result<RawPayload, TransportError>>>,
        writes: Mutex<Vec<PowerState>>,
    }

    impl StaticTransport {
        fn with_read(raw: RawPayload) -> Self {
            let transport = Self::default();
            transport.reads.lock().push_back(Ok(raw));
            transport
        }
    }

    impl Transport for StaticTransport {
        async fn read(&self) -> std::result::Result<RawPayload, TransportError> {
            self.reads
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::ConnectionFailed("no reply".to_string())))
        }

        async fn observe(&self) -> std::result::Result<RawPayload, TransportError> {
            std::future::pending().await
        }

        async fn write(&self, state: PowerState) -> std::result::Result<(), TransportError> {
            self.writes.lock().push(state);
            Ok(())
        }
    }

    #[tokio::test]
    async fn read_initial_publishes_when_idle() {
        let observer = PropertyObserver::new(StaticTransport::with_read(RawPayload::text("\"on\"")));

        assert_eq!(observer.read_initial().await.unwrap(), PowerState::On);
        assert_eq!(observer.power(), PowerState::On);
        assert_eq!(observer.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn read_initial_invalid_payload() {
        let observer = PropertyObserver::new(StaticTransport::with_read(RawPayload::text("dim")));

        let err = observer.read_initial().await.unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
        assert_eq!(observer.power(), PowerState::Unknown);
    }

    #[tokio::test]
    async fn read_initial_transport_failure() {
        let observer = PropertyObserver::new(StaticTransport::default());

        let err = observer.read_initial().await.unwrap_err();
        assert!(matches!(err, Error::Read(_)));
        // Failures of a one-off read are returned, not recorded.
        assert!(observer.last_error().is_none());
    }

    #[tokio::test]
    async fn request_write_rejects_unknown() {
        let observer = PropertyObserver::new(StaticTransport::default());

        let err = observer.request_write(PowerState::Unknown).await.unwrap_err();
        assert!(matches!(err, Error::Value(ValueError::NotWritable)));
        assert!(observer.transport().writes.lock().is_empty());
    }

    #[tokio::test]
    async fn toggle_from_unknown_requests_on() {
        let observer = PropertyObserver::new(StaticTransport::default());

        assert_eq!(observer.toggle().await.unwrap(), PowerState::On);
        assert_eq!(*observer.transport().writes.lock(), vec![PowerState::On]);
        assert_eq!(observer.power(), PowerState::Unknown);
    }

    #[tokio::test]
    async fn phases_follow_lifecycle() {
        let observer = PropertyObserver::new(StaticTransport::with_read(RawPayload::text("off")));
        assert_eq!(observer.phase(), ObserverPhase::Idle);

        let mut rx = observer.subscribe();
        observer.connect();
        rx.wait_for(|s| s.power() == PowerState::Off).await.unwrap();
        tokio::task::yield_now().await;

        assert!(observer.is_running());
        assert_eq!(observer.phase(), ObserverPhase::Polling);
        assert!(observer.phase().is_observing());

        observer.disconnect();
        assert_eq!(observer.phase(), ObserverPhase::Idle);
        assert!(!observer.phase().is_observing());
        assert!(!observer.is_running());
    }
}
