//! Driving port for the mail use case.

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::events::MailSendEvent;

/// Render and deliver one mail command.
///
/// Errors carry a code the caller uses to decide between dropping the
/// command ([`Error::is_permanent`]) and retrying it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailCommand: Send + Sync {
    /// Render the requested template and hand it to the transport.
    async fn send_mail(&self, event: MailSendEvent) -> Result<(), Error>;
}
