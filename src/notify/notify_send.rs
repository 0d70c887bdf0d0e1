//! libnotify backend via the `notify-send` program

use super::{spawn_detached, DispatchError, Notifier};
use crate::config::{NotifySection, Urgency};
use async_trait::async_trait;

const PROGRAM: &str = "notify-send";

/// Sends notifications through `notify-send` with an urgency and icon hint
#[derive(Debug, Clone)]
pub struct NotifySend {
    program: String,
    urgency: Urgency,
    icon: String,
}

impl NotifySend {
    pub fn from_config(section: &NotifySection) -> Self {
        Self {
            program: PROGRAM.to_string(),
            urgency: section.urgency,
            icon: section.icon.clone(),
        }
    }

    /// Use a different executable, e.g. a wrapper script
    pub fn with_program<S: Into<String>>(mut self, program: S) -> Self {
        self.program = program.into();
        self
    }

    /// Argument list for one notification. `--` stops option parsing so a
    /// message starting with a dash is shown verbatim.
    pub fn command_args(&self, title: &str, body: &str) -> Vec<String> {
        vec![
            "-u".to_string(),
            self.urgency.as_str().to_string(),
            "-i".to_string(),
            self.icon.clone(),
            "--".to_string(),
            title.to_string(),
            body.to_string(),
        ]
    }
}

#[async_trait]
impl Notifier for NotifySend {
    fn name(&self) -> &str {
        PROGRAM
    }

    async fn dispatch(&self, title: &str, body: &str) -> Result<(), DispatchError> {
        spawn_detached(&self.program, &self.command_args(title, body)).await
    }
}
