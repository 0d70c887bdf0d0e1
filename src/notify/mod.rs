//! Desktop notification backends
//!
//! The [`Notifier`] trait is the capability the classifier dispatches to. One
//! backend is chosen at startup by [`select_notifier`] and injected; nothing
//! looks it up per call.

mod log;
mod notify_send;
mod terminal_notifier;

pub use log::LogNotifier;
pub use notify_send::NotifySend;
pub use terminal_notifier::TerminalNotifier;

use crate::config::{NotifierBackend, NotifySection};
use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Notification dispatch errors
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Notifier backend unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Raised at startup when no backend exists for the running platform
#[derive(Debug, Error)]
#[error("no desktop notifier available for platform '{os}' (pick one explicitly with --notifier)")]
pub struct UnsupportedPlatform {
    pub os: String,
}

/// Capability to show a desktop notification
///
/// Dispatch is fire-and-forget: implementations report launch failures but
/// never wait for the notification to be displayed and never retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Backend name for log lines
    fn name(&self) -> &str;

    async fn dispatch(&self, title: &str, body: &str) -> Result<(), DispatchError>;
}

/// Pick the notification backend for `os` (normally [`std::env::consts::OS`])
pub fn select_notifier(
    section: &NotifySection,
    os: &str,
) -> Result<Box<dyn Notifier>, UnsupportedPlatform> {
    let notifier: Box<dyn Notifier> = match (section.backend, backend_for_platform(os)) {
        (NotifierBackend::Log, _) => Box::new(LogNotifier),
        (NotifierBackend::NotifySend, _)
        | (NotifierBackend::Auto, Some(NotifierBackend::NotifySend)) => {
            Box::new(NotifySend::from_config(section))
        }
        (NotifierBackend::TerminalNotifier, _)
        | (NotifierBackend::Auto, Some(NotifierBackend::TerminalNotifier)) => {
            Box::new(TerminalNotifier::new())
        }
        (NotifierBackend::Auto, _) => {
            return Err(UnsupportedPlatform { os: os.to_string() });
        }
    };
    Ok(notifier)
}

/// Default backend for a platform, if there is one
pub fn backend_for_platform(os: &str) -> Option<NotifierBackend> {
    match os {
        "linux" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => {
            Some(NotifierBackend::NotifySend)
        }
        "macos" => Some(NotifierBackend::TerminalNotifier),
        _ => None,
    }
}

/// Spawn an external notifier without waiting for it to exit
///
/// The child handle is dropped immediately; the runtime reaps it in the
/// background.
async fn spawn_detached(program: &str, args: &[String]) -> Result<(), DispatchError> {
    debug!("Launching {} with {} arguments", program, args.len());
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_child| ())
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => {
                DispatchError::Unavailable(format!("{program} not found on PATH"))
            }
            _ => DispatchError::Launch {
                program: program.to_string(),
                source,
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_backend_by_platform() {
        assert_eq!(
            backend_for_platform("linux"),
            Some(NotifierBackend::NotifySend)
        );
        assert_eq!(
            backend_for_platform("macos"),
            Some(NotifierBackend::TerminalNotifier)
        );
        assert_eq!(backend_for_platform("windows"), None);
    }

    #[test]
    fn test_select_notifier_auto() {
        let section = NotifySection::default();
        assert_eq!(
            select_notifier(&section, "linux").unwrap().name(),
            "notify-send"
        );
        assert_eq!(
            select_notifier(&section, "macos").unwrap().name(),
            "terminal-notifier"
        );
    }

    #[test]
    fn test_select_notifier_unsupported_platform() {
        let err = select_notifier(&NotifySection::default(), "windows")
            .err()
            .expect("windows has no auto backend");
        assert_eq!(err.os, "windows");
        assert!(err.to_string().contains("--notifier"));
    }

    #[test]
    fn test_explicit_backend_ignores_platform() {
        let section = NotifySection {
            backend: NotifierBackend::Log,
            ..Default::default()
        };
        assert_eq!(select_notifier(&section, "windows").unwrap().name(), "log");

        let section = NotifySection {
            backend: NotifierBackend::NotifySend,
            ..Default::default()
        };
        assert_eq!(
            select_notifier(&section, "macos").unwrap().name(),
            "notify-send"
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let err = spawn_detached("irc-notify-test-no-such-program", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unavailable(_)));
    }
}
