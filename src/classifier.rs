//! Highlight classification and routing
//!
//! Routing is split the same way the transport layer splits it: a pure
//! [`Classifier::classify`] decision, and [`Classifier::handle`] which acts on
//! that decision by calling the injected [`Notifier`].

use crate::event::{Event, EventKind, Notification};
use crate::notify::Notifier;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Tag set by the chat client when an event must never notify
pub const MUTE_ALL_TAG: &str = "notify_none";
/// Tag set by the chat client when highlighting is disabled for the line
pub const MUTE_HIGHLIGHT_TAG: &str = "no_highlight";
/// Prefix of the tag carrying the sender's nickname
pub const NICK_TAG_PREFIX: &str = "nick_";

static DAY_CHANGED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Day changed to").unwrap());
static BACK_ON_SERVER: Lazy<Regex> = Lazy::new(|| Regex::new(r"is back on server$").unwrap());

/// Structural expectation violations found while classifying an event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("channel event carries no 'nick_' tag")]
    MissingNickname,
    #[error("channel event carries more than one 'nick_' tag: {0:?}")]
    AmbiguousNickname(Vec<String>),
}

/// Why an event produced no notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Carries a mute-all or mute-highlight tag
    Muted,
    /// Private system notice such as a day change
    SystemNotice,
}

/// Routing decision for a decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Notify(Notification),
    Suppressed(SuppressReason),
    /// Unrecognized kind, dumped for operator inspection
    Diagnostic,
}

/// Result of handling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Notified,
    DispatchFailed,
    Suppressed(SuppressReason),
    Diagnosed,
    Rejected(ClassifyError),
}

/// Routes events to the right notification policy
#[derive(Debug, Default, Clone, Copy)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    /// Decide what to do with an event (pure function)
    pub fn classify(&self, event: &Event) -> Result<Route, ClassifyError> {
        if is_muted(event) {
            return Ok(Route::Suppressed(SuppressReason::Muted));
        }

        match event.kind {
            EventKind::Private => {
                let message = event.message_or_empty();
                if is_system_notice(message) {
                    return Ok(Route::Suppressed(SuppressReason::SystemNotice));
                }
                let title = format!("{}/{}", event.server_or_empty(), event.channel_or_empty());
                Ok(Route::Notify(Notification::new(title, message)))
            }
            EventKind::Channel => {
                let nickname = extract_nickname(event)?;
                let title = format!(
                    "{}/{} - {}",
                    event.server_or_empty(),
                    event.channel_or_empty(),
                    nickname
                );
                Ok(Route::Notify(Notification::new(
                    title,
                    event.message_or_empty(),
                )))
            }
            EventKind::Unknown => Ok(Route::Diagnostic),
        }
    }

    /// Classify an event and dispatch at most one notification for it.
    /// Never fails: every problem is logged and reported as an [`Outcome`].
    pub async fn handle(&self, event: &Event, notifier: &dyn Notifier) -> Outcome {
        match self.classify(event) {
            Ok(Route::Notify(notification)) => {
                info!(
                    kind = %event.kind,
                    title = %notification.title,
                    "Dispatching notification via {}",
                    notifier.name()
                );
                match notifier
                    .dispatch(&notification.title, &notification.body)
                    .await
                {
                    Ok(()) => Outcome::Notified,
                    Err(e) => {
                        warn!("Notification dispatch via {} failed: {}", notifier.name(), e);
                        Outcome::DispatchFailed
                    }
                }
            }
            Ok(Route::Suppressed(reason)) => {
                debug!(kind = %event.kind, ?reason, "Ignoring event");
                Outcome::Suppressed(reason)
            }
            Ok(Route::Diagnostic) => {
                warn!(
                    declared_type = ?event.declared_type,
                    "Got unparsable message:\n{}",
                    dump_event(event)
                );
                Outcome::Diagnosed
            }
            Err(e) => {
                error!("Rejected {} event: {}\n{}", event.kind, e, dump_event(event));
                Outcome::Rejected(e)
            }
        }
    }
}

fn is_muted(event: &Event) -> bool {
    event.has_tag(MUTE_ALL_TAG) || event.has_tag(MUTE_HIGHLIGHT_TAG)
}

/// Locale-fixed system notices that show up as private highlights
fn is_system_notice(message: &str) -> bool {
    DAY_CHANGED.is_match(message) || BACK_ON_SERVER.is_match(message)
}

/// Find the single nickname tag and strip its prefix
fn extract_nickname(event: &Event) -> Result<&str, ClassifyError> {
    let nicknames: Vec<&str> = event
        .tags
        .iter()
        .filter_map(|tag| tag.strip_prefix(NICK_TAG_PREFIX))
        .filter(|nick| !nick.is_empty())
        .collect();

    match nicknames.as_slice() {
        [] => Err(ClassifyError::MissingNickname),
        [nickname] => Ok(*nickname),
        many => Err(ClassifyError::AmbiguousNickname(
            many.iter().map(|nick| nick.to_string()).collect(),
        )),
    }
}

fn dump_event(event: &Event) -> String {
    serde_json::to_string_pretty(event).unwrap_or_else(|_| format!("{event:#?}"))
}
