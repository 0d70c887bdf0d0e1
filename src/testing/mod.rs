//! Testing utilities and mock implementations
//!
//! Mocks for the broker transport and the notification backend, so the
//! bridge can be tested without RabbitMQ or a desktop session.

pub mod mocks;

pub use mocks::*;
