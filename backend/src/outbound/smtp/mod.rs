//! SMTP mail transport.

mod sender;

pub use sender::{
    DEFAULT_PLAIN_PORT, DEFAULT_SMTP_TIMEOUT, DEFAULT_SMTPS_PORT, SmtpMailSender, SmtpSettings,
};
