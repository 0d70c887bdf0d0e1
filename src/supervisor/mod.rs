//! Connection supervisor
//!
//! Owns the broker session lifecycle: connect, subscribe, receive, detect
//! failure, wait, reconnect. Every delivery is decoded, classified and
//! dispatched, then acknowledged exactly once whatever the outcome, so a
//! poison message can never cause a redelivery loop.
//!
//! ```text
//! Disconnected -> Connecting -> Subscribed -> Receiving
//!       ^              |                          |
//!       +---- Failed <-+--------------------------+
//! ```

pub mod state;

pub use state::{ConnectionState, FailureDecision, ReconnectPolicy, SessionMonitor};

use crate::classifier::{Classifier, Outcome};
use crate::error::redact_credentials;
use crate::event::decode::{decode, payload_preview};
use crate::notify::Notifier;
use crate::transport::{Delivery, Transport, TransportError};
use crate::{delivery_span, session_span};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn, Instrument};

/// Counters kept over the lifetime of a supervisor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub connect_attempts: u64,
    /// Sessions that reached the subscribed state
    pub sessions: u64,
    pub received: u64,
    pub acked: u64,
    pub notified: u64,
    pub suppressed: u64,
    /// Deliveries that failed decoding or classification
    pub rejected: u64,
    /// Unknown event kinds dumped for inspection
    pub diagnosed: u64,
    pub dispatch_failures: u64,
}

impl SupervisorStats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Notified => self.notified += 1,
            Outcome::DispatchFailed => self.dispatch_failures += 1,
            Outcome::Suppressed(_) => self.suppressed += 1,
            Outcome::Diagnosed => self.diagnosed += 1,
            Outcome::Rejected(_) => self.rejected += 1,
        }
    }
}

/// How a single session ended
enum SessionEnd {
    Shutdown,
    Failed(TransportError),
}

/// Drives a [`Transport`] and feeds its deliveries to the classifier
pub struct Supervisor<T: Transport> {
    transport: T,
    classifier: Classifier,
    notifier: Box<dyn Notifier>,
    policy: ReconnectPolicy,
    state: ConnectionState,
    stats: SupervisorStats,
}

impl<T: Transport> Supervisor<T> {
    pub fn new(
        transport: T,
        classifier: Classifier,
        notifier: Box<dyn Notifier>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            transport,
            classifier,
            notifier,
            policy,
            state: ConnectionState::Disconnected,
            stats: SupervisorStats::default(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    /// Run until `shutdown` flips to `true` or a fatal transport fault occurs.
    ///
    /// Recoverable failures (broker unreachable, connection closed) are
    /// retried forever after the policy delay. A dropped shutdown sender
    /// means the loop can only end on a fault.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), TransportError> {
        info!(
            "Supervising {} (reconnect delay {}s, notifier {})",
            self.transport.describe(),
            self.policy.delay.as_secs(),
            self.notifier.name()
        );

        let result = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let span = session_span!(attempt = self.stats.connect_attempts + 1);
            let error = match self.run_session(&mut shutdown).instrument(span).await {
                SessionEnd::Shutdown => break Ok(()),
                SessionEnd::Failed(error) => error,
            };

            self.transport.disconnect().await;
            self.transition(ConnectionState::Disconnected);

            match SessionMonitor::decide(&error, &self.policy) {
                FailureDecision::Reconnect { delay } => {
                    warn!(
                        "{} unavailable ({}), trying again in {}s",
                        self.transport.describe(),
                        redact_credentials(&error.to_string()),
                        delay.as_secs()
                    );
                    if sleep_unless_shutdown(delay, &mut shutdown).await {
                        break Ok(());
                    }
                }
                FailureDecision::Abort => {
                    error!(
                        "Unrecognized transport fault, giving up: {}",
                        redact_credentials(&error.to_string())
                    );
                    break Err(error);
                }
            }
        };

        if result.is_ok() {
            info!("Shutdown requested, closing broker connection");
            self.transport.disconnect().await;
            self.transition(ConnectionState::Disconnected);
        }

        info!(stats = ?self.stats, "Supervisor stopped");
        result
    }

    /// Connect, subscribe and receive until the session ends
    async fn run_session(&mut self, shutdown: &mut watch::Receiver<bool>) -> SessionEnd {
        self.transition(ConnectionState::Connecting);
        self.stats.connect_attempts += 1;

        let opened = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => return SessionEnd::Shutdown,
            result = open_session(&mut self.transport) => result,
        };
        if let Err(error) = opened {
            self.transition(ConnectionState::Failed(error.to_string()));
            return SessionEnd::Failed(error);
        }

        self.stats.sessions += 1;
        self.transition(ConnectionState::Subscribed);
        self.transition(ConnectionState::Receiving);

        loop {
            // Shutdown is only observed between deliveries, never mid-dispatch
            let received = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => return SessionEnd::Shutdown,
                result = self.transport.receive() => result,
            };

            let processed = match received {
                Ok(delivery) => {
                    let span = delivery_span!(
                        delivery_tag = delivery.delivery_tag,
                        redelivered = delivery.redelivered
                    );
                    self.process(delivery).instrument(span).await
                }
                Err(error) => Err(error),
            };

            if let Err(error) = processed {
                self.transition(ConnectionState::Failed(error.to_string()));
                return SessionEnd::Failed(error);
            }
        }
    }

    /// Decode, classify, dispatch, then acknowledge one delivery.
    /// Only the acknowledgment can fail.
    async fn process(&mut self, delivery: Delivery) -> Result<(), TransportError> {
        self.stats.received += 1;

        match decode(&delivery.payload) {
            Ok(event) => {
                let outcome = self
                    .classifier
                    .handle(&event, self.notifier.as_ref())
                    .await;
                self.stats.record(&outcome);
            }
            Err(e) => {
                self.stats.rejected += 1;
                warn!(
                    "Skipping undecodable delivery: {} (payload: {})",
                    e,
                    payload_preview(&delivery.payload)
                );
            }
        }

        self.transport.ack(delivery.delivery_tag).await?;
        self.stats.acked += 1;
        Ok(())
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state == to {
            return;
        }
        SessionMonitor::log_state_transition(&self.state, &to);
        self.state = to;
    }
}

async fn open_session<T: Transport>(transport: &mut T) -> Result<(), TransportError> {
    transport.connect().await?;
    transport.subscribe().await
}

/// Resolve once shutdown has been requested. Never resolves if the sender
/// is gone without having requested it.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Sleep for `delay`; returns `true` if shutdown was requested meanwhile
async fn sleep_unless_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown_requested(shutdown) => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
