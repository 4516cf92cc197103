//! Handler for `mail.send` deliveries.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::events::{MAIL_SEND, MailSendEvent};
use crate::domain::ports::MailCommand;

use super::EventHandler;
use super::handler::{decode_or_drop, drop_permanent};

/// Feeds `mail.send` commands into the mail use case.
pub struct MailHandler<C> {
    command: Arc<C>,
}

impl<C> MailHandler<C> {
    /// Create a handler for `command`.
    pub fn new(command: Arc<C>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl<C> EventHandler for MailHandler<C>
where
    C: MailCommand,
{
    async fn handle(&self, body: &[u8]) -> Result<(), Error> {
        let Some(event) = decode_or_drop::<MailSendEvent>(body, MAIL_SEND) else {
            return Ok(());
        };
        tracing::debug!(template_id = %event.template_id, locale = %event.locale, "sending mail");
        drop_permanent(self.command.send_mail(event).await, MAIL_SEND)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for the mail handler.
    use super::*;
    use crate::domain::ports::MockMailCommand;
    use rstest::rstest;

    const BODY: &str = r#"{"template_id":"welcome","locale":"ja","to":["hanako@example.com"],"payload":{"name":"花子"}}"#;

    fn handler(command: MockMailCommand) -> MailHandler<MockMailCommand> {
        MailHandler::new(Arc::new(command))
    }

    #[rstest]
    #[case::not_json(b"<html>".as_slice())]
    #[case::wrong_shape(br#"{"template_id": 7}"#.as_slice())]
    #[case::empty(b"".as_slice())]
    #[tokio::test]
    async fn malformed_body_never_reaches_the_use_case(#[case] body: &[u8]) {
        let mut command = MockMailCommand::new();
        command.expect_send_mail().times(0);

        handler(command)
            .handle(body)
            .await
            .expect("poison message is acked");
    }

    #[tokio::test]
    async fn optional_fields_default_when_absent() {
        let mut command = MockMailCommand::new();
        command
            .expect_send_mail()
            .withf(|event| event.cc.is_empty() && event.headers.is_empty() && event.subject.is_none())
            .times(1)
            .return_once(|_| Ok(()));

        handler(command).handle(BODY.as_bytes()).await.expect("mail handled");
    }

    #[tokio::test]
    async fn template_not_found_is_dropped() {
        let mut command = MockMailCommand::new();
        command
            .expect_send_mail()
            .times(1)
            .return_once(|_| Err(Error::not_found("template not found: welcome (ja)")));

        handler(command)
            .handle(BODY.as_bytes())
            .await
            .expect("missing template is not retried");
    }

    #[rstest]
    #[case::smtp(Error::external_api(
        "mail delivery failed",
        &std::io::Error::other("connection refused"),
    ))]
    #[case::internal(Error::internal("sender unavailable"))]
    #[tokio::test]
    async fn transient_failures_are_returned(#[case] err: Error) {
        let mut command = MockMailCommand::new();
        command
            .expect_send_mail()
            .times(1)
            .return_once(move |_| Err(err));

        let outcome = handler(command).handle(BODY.as_bytes()).await;
        assert!(outcome.is_err());
    }
}
