use std::sync::Arc;
use std::time::Duration;

use outbound_messaging::{
    application::{
        handlers::message_dispatcher::MessageDispatchHandler,
        services::{
            channel::{ChannelAdapter, ChannelGateway},
            producer::Producer,
            retry_policy::RetryPolicy,
        },
        usecases::{
            get_delivery_stats::GetDeliveryStatsUseCase, list_deliveries::ListDeliveriesUseCase,
        },
    },
    config::Config,
    domain::models::EnvelopeType,
    infrastructure::{
        messaging::{
            email::EmailApiClient, jetstream::JetstreamQueueClient, whatsapp::WhatsAppCloudClient,
            worker::QueueWorker,
        },
        repositories::postgres::{PostgresCreditLedger, PostgresDeliveryRecordRepository},
    },
    presentation::http::endpoints::{
        deliveries::DeliveriesEndpoints, health::HealthEndpoints, root::ApiState,
    },
};
use poem::{Route, Server, listener::TcpListener};
use poem_openapi::OpenApiService;
use sqlx::postgres::PgPoolOptions;
use tokio::{main, sync::watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::try_parse()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let queue_client = JetstreamQueueClient::new(config.jetstream.clone());
    // Declares every queue up front so configuration problems surface at startup.
    queue_client.context().await?;

    let mut adapters: Vec<Arc<dyn ChannelAdapter>> = Vec::new();
    match config.whatsapp.clone() {
        Some(whatsapp) => adapters.push(WhatsAppCloudClient::new(whatsapp)?),
        None => warn!("whatsapp adapter not configured, whatsapp messages will be dead-lettered"),
    }
    match config.email.clone() {
        Some(email) => adapters.push(EmailApiClient::new(email)?),
        None => warn!("email adapter not configured, email messages will be dead-lettered"),
    }
    let gateway = ChannelGateway::new(adapters);

    let records = PostgresDeliveryRecordRepository::new(pool.clone());
    let ledger = PostgresCreditLedger::new(pool.clone());
    let handler = Arc::new(MessageDispatchHandler::new(
        gateway,
        records.clone(),
        Producer::new(queue_client.clone()),
        RetryPolicy::default(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers: Vec<_> = EnvelopeType::ALL
        .into_iter()
        .map(|queue| {
            QueueWorker::new(queue, queue_client.clone(), handler.clone())
                .spawn(shutdown_rx.clone())
        })
        .collect();

    let server_url = format!("{}://{}:{}", config.scheme, config.host, config.port);
    info!(%server_url, "starting status server");

    let state = Arc::new(ApiState {
        queue: queue_client.clone(),
        delivery_stats_usecase: Arc::new(GetDeliveryStatsUseCase::new(records.clone(), ledger)),
        list_deliveries_usecase: Arc::new(ListDeliveriesUseCase::new(records)),
    });
    let api_service = OpenApiService::new(
        (
            HealthEndpoints::new(state.clone()),
            DeliveriesEndpoints::new(state),
        ),
        "Outbound Messaging API",
        "0.1.0",
    )
    .server(format!("{}/api", server_url));
    let ui = api_service.swagger_ui();
    let app = Route::new().nest("/api", api_service).nest("/", ui);

    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(
        Server::new(TcpListener::bind(format!("{}:{}", config.host, config.port)))
            .run_with_graceful_shutdown(
                app,
                async move {
                    let _ = server_shutdown.changed().await;
                },
                Some(Duration::from_secs(5)),
            ),
    );

    shutdown_signal().await;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    for worker in workers {
        if let Err(err) = worker.await {
            error!(error = %err, "worker task panicked");
        }
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(error = %err, "status server failed"),
        Err(err) => error!(error = %err, "status server task panicked"),
    }

    queue_client.close().await;
    pool.close().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
