//! `diary-analyzer` worker: scores every `diary.created` event.

use std::sync::Arc;

use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use reqwest::Url;

use diary_backend::config::DiaryAnalyzerSettings;
use diary_backend::domain::DiaryAnalysisService;
use diary_backend::inbound::messaging::{ConsumerOptions, DiaryAnalysisHandler, MessageConsumer};
use diary_backend::outbound::broker::BrokerConnection;
use diary_backend::outbound::persistence::{
    DbPool, DieselDiaryAnalysisRepository, PoolConfig, run_pending_migrations,
};
use diary_backend::outbound::proofreading::HttpProofreadingGateway;
use diary_backend::topology::ConsumerTopology;
use diary_backend::{shutdown, telemetry};

const CONNECTION_NAME: &str = "diary-analyzer";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    telemetry::init();

    let settings = DiaryAnalyzerSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("failed to load configuration: {err}"))?;
    let app_id = settings
        .proofreading_app_id
        .clone()
        .ok_or_else(|| eyre!("DIARY_ANALYZER_PROOFREADING_APP_ID is required"))?;

    let database_url = settings.database_url().to_owned();
    let applied = tokio::task::spawn_blocking(move || run_pending_migrations(&database_url))
        .await
        .wrap_err("migration task panicked")??;
    tracing::info!(applied, "database schema up to date");

    let pool = DbPool::new(PoolConfig::new(settings.database_url()))
        .await
        .wrap_err("failed to build database pool")?;
    let endpoint = Url::parse(settings.proofreading_endpoint())
        .wrap_err("invalid proofreading endpoint")?;
    let gateway = HttpProofreadingGateway::new(endpoint, &app_id, settings.proofreading_timeout())
        .wrap_err("failed to build proofreading client")?;
    let service = DiaryAnalysisService::new(
        Arc::new(gateway),
        Arc::new(DieselDiaryAnalysisRepository::new(pool)),
        Arc::new(DefaultClock),
    );

    let connection = BrokerConnection::connect(settings.amqp_url(), CONNECTION_NAME).await?;
    let consumer = MessageConsumer::new(
        connection.clone(),
        ConsumerTopology::diary_analyzer(),
        Arc::new(DiaryAnalysisHandler::new(Arc::new(service))),
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
    tracing::info!("diary analyzer stopped");
    Ok(())
}
