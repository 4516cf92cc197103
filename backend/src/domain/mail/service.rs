//! Mail use case: render a template and hand it to the transport.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::events::MailSendEvent;
use crate::domain::ports::{MailCommand, MailSender, MailSenderError};

use super::{MailMessage, TemplateError, TemplateStore, merge_headers};

fn map_template_error(error: TemplateError) -> Error {
    match error {
        TemplateError::NotFound { .. } => Error::not_found(error.to_string()),
        TemplateError::Render { .. } => Error::validation(error.to_string()),
        TemplateError::Invalid { .. } => Error::logic(error.to_string()),
    }
}

fn map_sender_error(error: MailSenderError) -> Error {
    match &error {
        MailSenderError::InvalidAddress { .. } | MailSenderError::Build { .. } => {
            Error::validation(error.to_string())
        }
        MailSenderError::Delivery { .. } => Error::external_api("mail delivery failed", &error),
    }
}

fn is_plausible_address(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !address.chars().any(|c| c.is_whitespace() || c.is_control())
        }
        None => false,
    }
}

fn validate_recipients(field: &str, addresses: &[String]) -> Result<(), Error> {
    match addresses.iter().find(|address| !is_plausible_address(address)) {
        Some(bad) => Err(Error::validation(format!("invalid {field} address: {bad:?}"))),
        None => Ok(()),
    }
}

/// Mail service implementing [`MailCommand`].
pub struct MailService<S> {
    sender: Arc<S>,
    templates: Arc<TemplateStore>,
    from_address: String,
}

impl<S> MailService<S> {
    /// Create a service that sends as `from_address`.
    pub fn new(sender: Arc<S>, templates: Arc<TemplateStore>, from_address: impl Into<String>) -> Self {
        Self {
            sender,
            templates,
            from_address: from_address.into(),
        }
    }

    fn build_message(&self, event: MailSendEvent) -> Result<MailMessage, Error> {
        if event.template_id.trim().is_empty() {
            return Err(Error::validation("template_id must not be empty"));
        }
        if event.to.is_empty() {
            return Err(Error::validation("at least one recipient is required"));
        }
        validate_recipients("to", &event.to)?;
        validate_recipients("cc", &event.cc)?;
        validate_recipients("bcc", &event.bcc)?;
        if let Some(reply_to) = &event.reply_to {
            validate_recipients("reply-to", std::slice::from_ref(reply_to))?;
        }

        let rendered = self
            .templates
            .render(&event.template_id, &event.locale, &event.payload)
            .map_err(map_template_error)?;

        let subject = event
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|subject| !subject.is_empty())
            .map_or(rendered.subject, ToOwned::to_owned);

        let mut computed = vec![
            ("From".to_owned(), self.from_address.clone()),
            ("To".to_owned(), event.to.join(", ")),
            ("Subject".to_owned(), subject.clone()),
            ("MIME-Version".to_owned(), "1.0".to_owned()),
            ("Content-Type".to_owned(), "multipart/alternative".to_owned()),
        ];
        if !event.cc.is_empty() {
            computed.push(("Cc".to_owned(), event.cc.join(", ")));
        }
        if let Some(reply_to) = &event.reply_to {
            computed.push(("Reply-To".to_owned(), reply_to.clone()));
        }
        let computed_len = computed.len();
        let headers = merge_headers(computed, &event.headers)
            .into_iter()
            .skip(computed_len)
            .collect();

        Ok(MailMessage {
            from: self.from_address.clone(),
            to: event.to,
            cc: event.cc,
            bcc: event.bcc,
            reply_to: event.reply_to,
            subject,
            text_body: rendered.text,
            html_body: rendered.html,
            headers,
        })
    }
}

#[async_trait]
impl<S> MailCommand for MailService<S>
where
    S: MailSender,
{
    async fn send_mail(&self, event: MailSendEvent) -> Result<(), Error> {
        let template_id = event.template_id.clone();
        let locale = event.locale.clone();
        let message = self.build_message(event)?;

        self.sender.send(&message).await.map_err(map_sender_error)?;

        tracing::info!(
            template_id = %template_id,
            locale = %locale,
            recipients = message.to.len() + message.cc.len() + message.bcc.len(),
            "mail sent"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
