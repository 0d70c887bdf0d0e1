//! macOS backend via the `terminal-notifier` program

use super::{spawn_detached, DispatchError, Notifier};
use async_trait::async_trait;

const PROGRAM: &str = "terminal-notifier";

#[derive(Debug, Clone, Default)]
pub struct TerminalNotifier;

impl TerminalNotifier {
    pub fn new() -> Self {
        Self
    }

    pub fn command_args(&self, title: &str, body: &str) -> Vec<String> {
        vec![
            "-title".to_string(),
            title.to_string(),
            "-message".to_string(),
            body.to_string(),
        ]
    }
}

#[async_trait]
impl Notifier for TerminalNotifier {
    fn name(&self) -> &str {
        PROGRAM
    }

    async fn dispatch(&self, title: &str, body: &str) -> Result<(), DispatchError> {
        spawn_detached(PROGRAM, &self.command_args(title, body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments() {
        assert_eq!(
            TerminalNotifier::new().command_args("freenode/bob", "hi"),
            vec!["-title", "freenode/bob", "-message", "hi"]
        );
    }
}
