//! `mail-service` worker: renders and sends every `mail.send` command.

use std::sync::Arc;

use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;

use diary_backend::config::MailServiceSettings;
use diary_backend::domain::mail::{MailService, TemplateStore};
use diary_backend::inbound::messaging::{ConsumerOptions, MailHandler, MessageConsumer};
use diary_backend::outbound::broker::BrokerConnection;
use diary_backend::outbound::smtp::SmtpMailSender;
use diary_backend::topology::ConsumerTopology;
use diary_backend::{shutdown, telemetry};

const CONNECTION_NAME: &str = "mail-service";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    telemetry::init();

    let settings = MailServiceSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("failed to load configuration: {err}"))?;

    let templates = TemplateStore::with_builtin_templates(settings.fallback_locale())
        .wrap_err("failed to compile mail templates")?;
    let sender = SmtpMailSender::new(&settings.smtp()).wrap_err("failed to build SMTP transport")?;
    let service = MailService::new(
        Arc::new(sender),
        Arc::new(templates),
        settings.from_address(),
    );

    let connection = BrokerConnection::connect(settings.amqp_url(), CONNECTION_NAME).await?;
    let consumer = MessageConsumer::new(
        connection.clone(),
        ConsumerTopology::mail_service(),
        Arc::new(MailHandler::new(Arc::new(service))),
        ConsumerOptions {
            consumer_tag: CONNECTION_NAME.to_owned(),
            redelivery: settings.redelivery(),
            drain_timeout: settings.drain_timeout(),
        },
    );

    let cancel = shutdown::cancel_on_signal();
    consumer.start(&cancel).await?;
    cancel.cancelled().await;

    let stopped = consumer.stop().await;
    connection.close().await?;
    stopped.wrap_err("consumer did not stop cleanly")?;
    tracing::info!("mail service stopped");
    Ok(())
}
