//! AMQP 0-9-1 transport built on lapin
//!
//! Declares a fanout exchange and a queue bound to it, then consumes with a
//! prefetch of one so deliveries are handled strictly one at a time.

use super::{Delivery, Transport, TransportError};
use crate::config::ConnectionDescriptor;
use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::protocol::{AMQPErrorKind, AMQPHardError};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_SUCCESS: u16 = 200;

/// lapin-backed [`Transport`]
pub struct AmqpTransport {
    descriptor: ConnectionDescriptor,
    connection: Option<Connection>,
    channel: Option<Channel>,
    consumer: Option<Consumer>,
}

impl AmqpTransport {
    pub fn new(descriptor: ConnectionDescriptor) -> Self {
        Self {
            descriptor,
            connection: None,
            channel: None,
            consumer: None,
        }
    }

    fn channel(&self) -> Result<&Channel, TransportError> {
        self.channel
            .as_ref()
            .ok_or_else(|| TransportError::Closed("no open channel".to_string()))
    }

    fn consumer_tag(&self) -> String {
        format!("{}-{}", self.descriptor.consumer_tag_prefix, Uuid::new_v4())
    }
}

/// Map a lapin error raised on an established connection
pub fn classify_lapin_error(error: &lapin::Error) -> TransportError {
    match error {
        lapin::Error::IOError(_)
        | lapin::Error::InvalidConnectionState(_)
        | lapin::Error::InvalidChannelState(_)
        | lapin::Error::MissingHeartbeatError => TransportError::Closed(error.to_string()),
        // Broker shutting down or an operator closing the connection
        lapin::Error::ProtocolError(amqp_error)
            if matches!(
                amqp_error.kind(),
                AMQPErrorKind::Hard(AMQPHardError::CONNECTIONFORCED)
            ) =>
        {
            TransportError::Closed(error.to_string())
        }
        _ => TransportError::Fault(error.to_string()),
    }
}

/// Map a lapin error raised while opening a connection
pub fn classify_connect_error(error: &lapin::Error) -> TransportError {
    match error {
        lapin::Error::IOError(_) => TransportError::Unreachable(error.to_string()),
        _ => classify_lapin_error(error),
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let uri = self
            .descriptor
            .amqp_uri()
            .map_err(|e| TransportError::Fault(e.to_string()))?;

        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| classify_connect_error(&e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| classify_lapin_error(&e))?;

        info!("Connected to {}", self.describe());
        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<(), TransportError> {
        let consumer_tag = self.consumer_tag();
        let descriptor = &self.descriptor;
        let channel = self.channel()?;

        channel
            .exchange_declare(
                &descriptor.exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: descriptor.durable,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| classify_lapin_error(&e))?;

        channel
            .queue_declare(
                &descriptor.queue,
                QueueDeclareOptions {
                    durable: descriptor.durable,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| classify_lapin_error(&e))?;

        channel
            .queue_bind(
                &descriptor.queue,
                &descriptor.exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| classify_lapin_error(&e))?;

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| classify_lapin_error(&e))?;

        let consumer = channel
            .basic_consume(
                &descriptor.queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| classify_lapin_error(&e))?;

        info!(
            exchange = %descriptor.exchange,
            queue = %descriptor.queue,
            consumer_tag = %consumer_tag,
            "Consuming from queue"
        );
        self.consumer = Some(consumer);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Delivery, TransportError> {
        let consumer = self
            .consumer
            .as_mut()
            .ok_or_else(|| TransportError::Closed("not consuming".to_string()))?;

        match consumer.next().await {
            Some(Ok(delivery)) => Ok(Delivery {
                delivery_tag: delivery.delivery_tag,
                payload: delivery.data,
                redelivered: delivery.redelivered,
            }),
            Some(Err(e)) => Err(classify_lapin_error(&e)),
            None => Err(TransportError::Closed("consumer stream ended".to_string())),
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError> {
        self.channel()?
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| classify_lapin_error(&e))
    }

    async fn disconnect(&mut self) {
        self.consumer = None;

        if let Some(channel) = self.channel.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, channel.close(REPLY_SUCCESS, "Bye")).await {
                Ok(Ok(())) => debug!("Channel closed"),
                Ok(Err(e)) => debug!("Channel close failed: {}", e),
                Err(_) => debug!("Channel close timed out"),
            }
        }

        if let Some(connection) = self.connection.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, connection.close(REPLY_SUCCESS, "Bye")).await
            {
                Ok(Ok(())) => debug!("Connection closed"),
                Ok(Err(e)) => debug!("Connection close failed: {}", e),
                Err(_) => debug!("Connection close timed out"),
            }
        }
    }

    fn describe(&self) -> String {
        self.descriptor.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    #[test]
    fn test_io_errors_are_closures_once_connected() {
        let error = lapin::Error::IOError(Arc::new(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "Socket closed",
        )));
        assert!(matches!(
            classify_lapin_error(&error),
            TransportError::Closed(_)
        ));
    }

    #[test]
    fn test_io_errors_at_connect_are_unreachable() {
        let error = lapin::Error::IOError(Arc::new(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        )));
        assert!(matches!(
            classify_connect_error(&error),
            TransportError::Unreachable(_)
        ));
    }

    #[test]
    fn test_missing_heartbeat_is_closure() {
        assert!(matches!(
            classify_lapin_error(&lapin::Error::MissingHeartbeatError),
            TransportError::Closed(_)
        ));
    }

    #[test]
    fn test_other_errors_are_faults() {
        assert!(matches!(
            classify_lapin_error(&lapin::Error::ChannelsLimitReached),
            TransportError::Fault(_)
        ));
        assert!(matches!(
            classify_connect_error(&lapin::Error::ChannelsLimitReached),
            TransportError::Fault(_)
        ));
    }

    #[test]
    fn test_describe_hides_password() {
        let transport = AmqpTransport::new(ConnectionDescriptor {
            password: "hunter2".to_string(),
            ..Default::default()
        });
        let description = transport.describe();
        assert!(description.contains("localhost:5672"));
        assert!(!description.contains("hunter2"));
    }

    #[test]
    fn test_consumer_tags_are_unique() {
        let transport = AmqpTransport::new(ConnectionDescriptor::default());
        let first = transport.consumer_tag();
        let second = transport.consumer_tag();
        assert!(first.starts_with("irc-notify-"));
        assert_ne!(first, second);
    }
}
