//! irc-notify
//!
//! Bridges chat highlight events published to an AMQP broker to desktop
//! notifications.
//!
//! # Overview
//!
//! - [`event`] decodes delivery payloads into typed [`Event`]s
//! - [`classifier`] decides whether and how an event notifies
//! - [`notify`] holds the desktop notification backends
//! - [`transport`] abstracts the broker; [`transport::AmqpTransport`] talks AMQP
//! - [`supervisor`] owns the connection lifecycle and the receive loop
//!
//! # Quick Start
//!
//! ```rust
//! use irc_notify::classifier::{Classifier, Route};
//! use irc_notify::event::{decode, Notification};
//!
//! let payload = br##"{type: channel, server: freenode, channel: "#test", message: hello, tags: [nick_alice]}"##;
//! let event = decode(payload).unwrap();
//!
//! let route = Classifier::new().classify(&event).unwrap();
//! assert_eq!(
//!     route,
//!     Route::Notify(Notification::new("freenode/#test - alice", "hello"))
//! );
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod observability;
pub mod supervisor;
pub mod testing;
pub mod transport;

pub use classifier::{Classifier, Outcome, Route};
pub use config::*;
pub use error::{BridgeError, BridgeResult};
pub use event::{decode, Event, EventKind, Notification};
pub use notify::{select_notifier, Notifier};
pub use supervisor::{ConnectionState, ReconnectPolicy, Supervisor};
pub use transport::{AmqpTransport, Transport, TransportError};
