//! Crash notification.

use std::any::Any;

use tokio::task::JoinError;
use tracing::error;

/// Receives a report when a table run or a worker panics.
pub trait CrashNotifier: Send + Sync {
    fn notify(&self, subject: &str, body: &str);
}

/// Writes crash reports to the log, addressed to the configured recipients.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    recipients: Vec<String>,
}

impl LogNotifier {
    pub fn new(recipients: Vec<String>) -> Self {
        Self { recipients }
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }
}

impl CrashNotifier for LogNotifier {
    fn notify(&self, subject: &str, body: &str) {
        if self.recipients.is_empty() {
            return;
        }
        error!(
            recipients = %self.recipients.join(","),
            subject,
            body,
            "Crash report"
        );
    }
}

/// Human readable reason a spawned task did not complete.
pub fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic().as_ref())
    } else {
        err.to_string()
    }
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_message_is_recovered() {
        let err = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        assert!(err.is_panic());
        assert_eq!(join_error_message(err), "boom");
    }

    #[test]
    fn test_formatted_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(format!("bad {}", 1));
        assert_eq!(panic_message(payload.as_ref()), "bad 1");
    }
}
