//! Pure connection state and reconnection decision logic
//!
//! Nothing in here performs I/O; the supervisor loop calls these functions
//! to decide what to do next and to log transitions consistently.

use crate::config::ReconnectSection;
use crate::transport::TransportError;
use std::time::Duration;
use tracing::{error, info, warn};

/// Supervisor-owned connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection held
    Disconnected,
    /// Opening the connection and declaring the subscription
    Connecting,
    /// Queue bound and consumer registered
    Subscribed,
    /// Blocking on deliveries
    Receiving,
    /// Session ended with the given reason; teardown pending
    Failed(String),
}

/// Fixed-delay reconnect policy. Retries are unlimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(30),
        }
    }
}

impl From<&ReconnectSection> for ReconnectPolicy {
    fn from(section: &ReconnectSection) -> Self {
        Self {
            delay: section.delay(),
        }
    }
}

/// What to do after a session failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDecision {
    /// Wait, then open a new session
    Reconnect { delay: Duration },
    /// Stop the supervisor and surface the error
    Abort,
}

/// Pure session monitoring logic
pub struct SessionMonitor;

impl SessionMonitor {
    /// Decide how to react to a session-ending error (pure function)
    pub fn decide(error: &TransportError, policy: &ReconnectPolicy) -> FailureDecision {
        if error.is_recoverable() {
            FailureDecision::Reconnect {
                delay: policy.delay,
            }
        } else {
            FailureDecision::Abort
        }
    }

    /// Check whether a transition follows the state machine (pure function)
    pub fn is_valid_transition(from: &ConnectionState, to: &ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (from, to),
            (Disconnected, Connecting)
                | (Connecting, Subscribed)
                | (Connecting, Failed(_))
                | (Subscribed, Receiving)
                | (Subscribed, Failed(_))
                | (Receiving, Failed(_))
                // Teardown after a failure, or shutdown from any state
                | (_, Disconnected)
        )
    }

    /// Log connection state transition (pure logging function)
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Disconnected, ConnectionState::Connecting) => {
                info!("Connecting to broker");
            }
            (ConnectionState::Connecting, ConnectionState::Subscribed) => {
                info!("Broker connection established and subscribed");
            }
            (ConnectionState::Subscribed, ConnectionState::Receiving) => {
                info!("Waiting for highlights");
            }
            (ConnectionState::Connecting, ConnectionState::Failed(reason)) => {
                warn!("Broker connection attempt failed: {}", reason);
            }
            (_, ConnectionState::Failed(reason)) => {
                warn!("Broker session lost: {}", reason);
            }
            (from, to) if !Self::is_valid_transition(from, to) => {
                error!("Unexpected connection state transition: {:?} -> {:?}", from, to);
            }
            _ => {
                info!("Connection state: {:?} -> {:?}", from, to);
            }
        }
    }
}
