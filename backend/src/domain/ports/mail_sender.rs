//! Driven port for handing rendered mail to a transport.

use async_trait::async_trait;

use crate::domain::mail::MailMessage;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by mail transports.
    pub enum MailSenderError {
        /// An address in the message could not be parsed.
        InvalidAddress { address: String } =>
            "invalid mail address: {address}",
        /// The MIME message could not be assembled.
        Build { message: String } =>
            "mail message build failed: {message}",
        /// Every delivery route failed.
        Delivery { message: String } =>
            transient "mail delivery failed: {message}",
    }
}

/// Port for delivering one rendered message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver `message` as a `multipart/alternative` mail.
    async fn send(&self, message: &MailMessage) -> Result<(), MailSenderError>;
}
