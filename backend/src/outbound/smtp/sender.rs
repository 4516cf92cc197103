//! SMTP adapter for the [`MailSender`] port built on `lettre`.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::{HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::Error as SmtpError;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::domain::mail::MailMessage;
use crate::domain::ports::{MailSender, MailSenderError};

/// Implicit-TLS submission port.
pub const DEFAULT_SMTPS_PORT: u16 = 465;
/// Plaintext port used when the TLS route cannot be reached.
pub const DEFAULT_PLAIN_PORT: u16 = 25;
/// Default per-command SMTP timeout.
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`SmtpMailSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub plain_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl SmtpSettings {
    /// Settings for `host` with default ports, no credentials.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SMTPS_PORT,
            plain_port: DEFAULT_PLAIN_PORT,
            username: None,
            password: None,
            timeout: DEFAULT_SMTP_TIMEOUT,
        }
    }

    fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some(Credentials::new(user.clone(), password.clone())),
            _ => None,
        }
    }
}

/// Sends mail over implicit TLS, falling back to plaintext SMTP when the
/// TLS route fails before any server response.
///
/// The plaintext route never carries credentials.
pub struct SmtpMailSender {
    tls: AsyncSmtpTransport<Tokio1Executor>,
    plain: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpMailSender {
    /// Build both transports from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`MailSenderError::Delivery`] when the TLS parameters for
    /// `host` cannot be constructed.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailSenderError> {
        let mut tls = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|err| MailSenderError::delivery(err.to_string()))?
            .port(settings.port)
            .timeout(Some(settings.timeout));
        if let Some(credentials) = settings.credentials() {
            tls = tls.credentials(credentials);
        }
        let plain = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.plain_port)
            .timeout(Some(settings.timeout))
            .build();

        Ok(Self::with_transports(tls.build(), plain, &settings.host))
    }

    fn with_transports(
        tls: AsyncSmtpTransport<Tokio1Executor>,
        plain: AsyncSmtpTransport<Tokio1Executor>,
        host: &str,
    ) -> Self {
        Self {
            tls,
            plain,
            host: host.to_owned(),
        }
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), MailSenderError> {
        let email = build_message(message)?;

        match self.tls.send(email.clone()).await {
            Ok(_) => Ok(()),
            Err(err) if is_route_failure(&err) => {
                tracing::warn!(
                    host = %self.host,
                    error = %err,
                    "TLS SMTP route failed; retrying over plaintext"
                );
                self.plain
                    .send(email)
                    .await
                    .map(|_| ())
                    .map_err(|plain_err| {
                        MailSenderError::delivery(format!("tls: {err}; plaintext: {plain_err}"))
                    })
            }
            Err(err) => Err(MailSenderError::delivery(err.to_string())),
        }
    }
}

/// True when the server never answered with an SMTP status.
fn is_route_failure(err: &SmtpError) -> bool {
    !err.is_permanent() && !err.is_transient()
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailSenderError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|_| MailSenderError::invalid_address(address))
}

fn build_message(message: &MailMessage) -> Result<Message, MailSenderError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&message.from)?)
        .subject(message.subject.clone());
    for address in &message.to {
        builder = builder.to(parse_mailbox(address)?);
    }
    for address in &message.cc {
        builder = builder.cc(parse_mailbox(address)?);
    }
    for address in &message.bcc {
        builder = builder.bcc(parse_mailbox(address)?);
    }
    if let Some(reply_to) = &message.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to)?);
    }
    for (name, value) in &message.headers {
        let header_name = HeaderName::new_from_ascii(name.clone()).map_err(|reason| {
            MailSenderError::build(format!("invalid header name {name:?}: {reason}"))
        })?;
        builder = builder.raw_header(HeaderValue::new(header_name, value.clone()));
    }

    builder
        .multipart(MultiPart::alternative_plain_html(
            message.text_body.clone(),
            message.html_body.clone(),
        ))
        .map_err(|err| MailSenderError::build(err.to_string()))
}
