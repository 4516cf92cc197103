//! Mail rendering and dispatch.
//!
//! A [`MailSendEvent`](crate::domain::events::MailSendEvent) is resolved
//! against the [`TemplateStore`], rendered, merged with caller headers, and
//! handed to a [`MailSender`](crate::domain::ports::MailSender) as a
//! [`MailMessage`].

mod builtin;
mod headers;
mod service;
mod template_store;

pub use headers::{PROTECTED_HEADERS, is_protected, merge_headers};
pub use service::MailService;
pub use template_store::{
    DEFAULT_FALLBACK_LOCALE, MailTemplate, RenderedMail, TemplateError, TemplateKey, TemplateStore,
};

/// A fully rendered message, ready for a transport.
///
/// Built from an inbound command and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    /// Additional headers, already filtered against [`PROTECTED_HEADERS`].
    pub headers: Vec<(String, String)>,
}
