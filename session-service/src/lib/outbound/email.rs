use async_trait::async_trait;

use crate::session::errors::EmailSenderError;
use crate::session::models::EmailAddress;
use crate::session::models::Username;
use crate::session::ports::EmailSender;

/// Email sender that records deliveries in the trace log instead of
/// handing them to a mail server.
#[derive(Debug, Clone, Default)]
pub struct TracingEmailSender {
    from: String,
}

impl TracingEmailSender {
    pub fn new(from: impl ToString) -> Self {
        Self {
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl EmailSender for TracingEmailSender {
    async fn send_welcome(
        &self,
        email: &EmailAddress,
        user_name: &Username,
    ) -> Result<(), EmailSenderError> {
        tracing::info!(
            from = %self.from,
            to = %email,
            user_name = %user_name,
            template = "welcome",
            "Email delivered"
        );
        Ok(())
    }

    async fn send_verification(
        &self,
        email: &EmailAddress,
        user_name: &Username,
        _token: &str,
    ) -> Result<(), EmailSenderError> {
        // The secret stays out of the log.
        tracing::info!(
            from = %self.from,
            to = %email,
            user_name = %user_name,
            template = "verify_email",
            "Email delivered"
        );
        Ok(())
    }
}
