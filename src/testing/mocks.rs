//! Mock implementations for testing
//!
//! Provides a scripted [`Transport`] and a recording [`Notifier`] so the
//! supervisor and classifier can be exercised without a broker or a desktop.

use crate::event::Notification;
use crate::notify::{DispatchError, Notifier};
use crate::transport::{Delivery, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Calls observed by [`ScriptedTransport`], in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Subscribe,
    Ack(u64),
    Disconnect,
}

/// One scripted answer to `receive`
#[derive(Debug, Clone)]
pub enum ReceiveStep {
    Deliver(Vec<u8>),
    Fail(TransportError),
}

#[derive(Debug, Default)]
struct ScriptState {
    connect_failures: VecDeque<TransportError>,
    subscribe_failures: VecDeque<TransportError>,
    ack_failures: VecDeque<TransportError>,
    steps: VecDeque<ReceiveStep>,
    calls: Vec<TransportCall>,
    next_tag: u64,
    connected: bool,
}

/// Transport that replays a script of connect failures and deliveries
///
/// Delivery tags restart at 1 on every connect, as AMQP channel tags do.
/// Once the script is exhausted `receive` requests shutdown through the
/// attached sender (if any) and then waits forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    shutdown_when_drained: Option<Arc<watch::Sender<bool>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown once every scripted step has been consumed
    pub fn shutdown_when_drained(mut self, shutdown: watch::Sender<bool>) -> Self {
        self.shutdown_when_drained = Some(Arc::new(shutdown));
        self
    }

    pub async fn fail_connect(&self, error: TransportError) {
        self.state.lock().await.connect_failures.push_back(error);
    }

    pub async fn fail_subscribe(&self, error: TransportError) {
        self.state.lock().await.subscribe_failures.push_back(error);
    }

    pub async fn fail_ack(&self, error: TransportError) {
        self.state.lock().await.ack_failures.push_back(error);
    }

    pub async fn deliver<P: Into<Vec<u8>>>(&self, payload: P) {
        self.state
            .lock()
            .await
            .steps
            .push_back(ReceiveStep::Deliver(payload.into()));
    }

    pub async fn fail_receive(&self, error: TransportError) {
        self.state
            .lock()
            .await
            .steps
            .push_back(ReceiveStep::Fail(error));
    }

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn acked_tags(&self) -> Vec<u64> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Ack(tag) => Some(*tag),
                _ => None,
            })
            .collect()
    }

    pub async fn count(&self, call: &TransportCall) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.calls.push(TransportCall::Connect);
        if let Some(error) = state.connect_failures.pop_front() {
            return Err(error);
        }
        state.connected = true;
        state.next_tag = 0;
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.calls.push(TransportCall::Subscribe);
        match state.subscribe_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn receive(&mut self) -> Result<Delivery, TransportError> {
        let step = {
            let mut state = self.state.lock().await;
            if !state.connected {
                return Err(TransportError::Fault("receive without connection".to_string()));
            }
            match state.steps.pop_front() {
                Some(ReceiveStep::Deliver(payload)) => {
                    state.next_tag += 1;
                    Some(Ok(Delivery {
                        delivery_tag: state.next_tag,
                        payload,
                        redelivered: false,
                    }))
                }
                Some(ReceiveStep::Fail(error)) => Some(Err(error)),
                None => None,
            }
        };

        match step {
            Some(result) => result,
            None => {
                if let Some(shutdown) = &self.shutdown_when_drained {
                    let _ = shutdown.send(true);
                }
                std::future::pending().await
            }
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.ack_failures.pop_front() {
            return Err(error);
        }
        state.calls.push(TransportCall::Ack(delivery_tag));
        Ok(())
    }

    async fn disconnect(&mut self) {
        let mut state = self.state.lock().await;
        state.calls.push(TransportCall::Disconnect);
        state.connected = false;
    }

    fn describe(&self) -> String {
        "scripted broker".to_string()
    }
}

/// Notifier that records every dispatch attempt
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    should_fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records attempts but reports every dispatch as failed
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn dispatch(&self, title: &str, body: &str) -> Result<(), DispatchError> {
        self.sent.lock().await.push(Notification::new(title, body));
        if self.should_fail {
            Err(DispatchError::Unavailable("mock notifier failure".to_string()))
        } else {
            Ok(())
        }
    }
}
