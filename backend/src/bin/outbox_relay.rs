//! `outbox-relay` worker: publishes committed outbox rows to the broker.

use std::sync::Arc;

use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;

use diary_backend::config::OutboxRelaySettings;
use diary_backend::domain::{OutboxRelay, OutboxRelayConfig};
use diary_backend::outbound::broker::{AmqpEventPublisher, BrokerConnection};
use diary_backend::outbound::persistence::{
    DbPool, DieselOutboxRepository, PoolConfig, run_pending_migrations,
};
use diary_backend::{shutdown, telemetry};

const CONNECTION_NAME: &str = "outbox-relay";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    telemetry::init();

    let settings = OutboxRelaySettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("failed to load configuration: {err}"))?;

    let database_url = settings.database_url().to_owned();
    let applied = tokio::task::spawn_blocking(move || run_pending_migrations(&database_url))
        .await
        .wrap_err("migration task panicked")??;
    tracing::info!(applied, "database schema up to date");

    let pool = DbPool::new(PoolConfig::new(settings.database_url()))
        .await
        .wrap_err("failed to build database pool")?;
    let connection = BrokerConnection::connect(settings.amqp_url(), CONNECTION_NAME).await?;
    let publisher = AmqpEventPublisher::new(&connection, settings.exchange()).await?;

    let relay = OutboxRelay::new(
        Arc::new(DieselOutboxRepository::new(pool)),
        Arc::new(publisher),
        Arc::new(DefaultClock),
        OutboxRelayConfig {
            batch_size: settings.batch_size(),
            poll_interval: settings.poll_interval(),
        },
    );

    let cancel = shutdown::cancel_on_signal();
    relay.run(cancel).await;

    connection.close().await?;
    Ok(())
}
