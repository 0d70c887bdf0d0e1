//! Broker transport layer
//!
//! The [`Transport`] trait abstracts the broker so the supervisor can be
//! driven by the AMQP implementation in production and by scripted mocks in
//! tests.

pub mod amqp;

pub use amqp::AmqpTransport;

use thiserror::Error;

/// One message received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-scoped tag used to acknowledge the message
    pub delivery_tag: u64,
    pub payload: Vec<u8>,
    pub redelivered: bool,
}

/// Transport errors, split by how the supervisor must react
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The broker could not be reached at connect time
    #[error("Broker unreachable: {0}")]
    Unreachable(String),
    /// An established connection went away (peer closed the socket, stream ended)
    #[error("Transport closed: {0}")]
    Closed(String),
    /// Anything not recognized as a connection loss
    #[error("Unrecognized transport fault: {0}")]
    Fault(String),
}

impl TransportError {
    /// Whether reconnecting may fix this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransportError::Unreachable(_) | TransportError::Closed(_)
        )
    }
}

/// Broker connection used by the supervisor
///
/// Calls happen strictly in order: `connect`, `subscribe`, then any number of
/// `receive`/`ack` pairs, and `disconnect` before the next `connect`.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Open the connection and a channel
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Declare the exchange and queue, bind them, and start consuming
    async fn subscribe(&mut self) -> Result<(), TransportError>;

    /// Wait for the next delivery
    async fn receive(&mut self) -> Result<Delivery, TransportError>;

    /// Acknowledge a delivery by tag
    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError>;

    /// Release the connection. Errors are swallowed since the connection may
    /// already be gone.
    async fn disconnect(&mut self);

    /// Human-readable broker address for log lines, without credentials
    fn describe(&self) -> String;
}
