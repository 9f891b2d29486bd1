use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use blog_core::ports::{EmailMessage, MailError, Mailer};

/// Outbox transport: keeps every message in memory.
///
/// Clones share the same outbox, so a test can hold one handle while the
/// application sends through another.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMailer {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first.
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.outbox.lock().await.clear();
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::Address("No recipients".to_string()));
        }

        self.outbox.lock().await.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &[&str]) -> EmailMessage {
        EmailMessage {
            from: "blog@example.com".into(),
            to: to.iter().map(|s| s.to_string()).collect(),
            subject: "Hello".into(),
            body: "Body".into(),
        }
    }

    #[tokio::test]
    async fn test_outbox_is_shared_between_clones() {
        let mailer = InMemoryMailer::new();
        let handle = mailer.clone();

        mailer.send(message(&["bob@example.com"])).await.unwrap();

        let sent = handle.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["bob@example.com"]);

        handle.clear().await;
        assert!(mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_message_without_recipients() {
        let mailer = InMemoryMailer::new();
        assert!(matches!(
            mailer.send(message(&[])).await,
            Err(MailError::Address(_))
        ));
        assert!(mailer.sent().await.is_empty());
    }
}
