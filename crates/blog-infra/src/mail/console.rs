use async_trait::async_trait;

use blog_core::ports::{EmailMessage, MailError, Mailer};

use super::mask_email;

/// Development transport: writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::Address("No recipients".to_string()));
        }

        let recipients: Vec<String> = message.to.iter().map(|a| mask_email(a)).collect();
        tracing::info!(
            from = %message.from,
            to = ?recipients,
            subject = %message.subject,
            "\n{}",
            message.body
        );
        Ok(())
    }
}
