// src/main.rs
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use ct_fanout::broker::FanOutBroker;
use ct_fanout::buffer::CertBuffer;
use ct_fanout::cli::Cli;
use ct_fanout::config::Config;
use ct_fanout::ct_log::{LogDirectory, PollScheduler};
use ct_fanout::server::{http, ws, AppState};
use ct_fanout::subscriber::View;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.validate()?;

    if let Err(e) = ct_fanout::metrics::init_metrics() {
        tracing::warn!("metrics already initialized: {}", e);
    }

    let config = Arc::new(Config::load(&cli)?);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!("Starting ct-fanout on {}:{}", config.host, config.port);

    let buffer = Arc::new(CertBuffer::new(config.buffer_size));
    let broker = Arc::new(FanOutBroker::new(buffer, config.max_clients_per_endpoint));

    let directory = LogDirectory::new(config.log_list_url.clone());
    let mut scheduler = PollScheduler::new();
    let (record_tx, mut record_rx) = mpsc::channel(config.batch_size as usize * 4);

    scheduler
        .start(
            &directory,
            record_tx,
            config.max_workers,
            config.batch_size,
            config.poll_interval(),
        )
        .await;

    let fanout_broker = broker.clone();
    let publish_task = tokio::spawn(async move {
        while let Some(record) = record_rx.recv().await {
            fanout_broker.publish(record).await;
        }
    });

    let state = AppState { broker: broker.clone(), config: config.clone() };

    let http_listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let lite_listener =
        tokio::net::TcpListener::bind((config.host.as_str(), config.port + 1)).await?;
    let full_listener =
        tokio::net::TcpListener::bind((config.host.as_str(), config.port + 2)).await?;
    let domains_listener =
        tokio::net::TcpListener::bind((config.host.as_str(), config.port + 3)).await?;

    let http_router = http::router(state.clone());
    let lite_router = ws::router(state.clone(), View::Lite);
    let full_router = ws::router(state.clone(), View::Full);
    let domains_router = ws::router(state.clone(), View::DomainsOnly);

    let shutdown = shutdown_signal();
    let (shutdown_http, shutdown_lite, shutdown_full, shutdown_domains) = (
        shutdown.clone(),
        shutdown.clone(),
        shutdown.clone(),
        shutdown.clone(),
    );

    let http_server = axum::serve(http_listener, http_router)
        .with_graceful_shutdown(wait_for(shutdown_http));
    let lite_server =
        axum::serve(lite_listener, lite_router).with_graceful_shutdown(wait_for(shutdown_lite));
    let full_server =
        axum::serve(full_listener, full_router).with_graceful_shutdown(wait_for(shutdown_full));
    let domains_server = axum::serve(domains_listener, domains_router)
        .with_graceful_shutdown(wait_for(shutdown_domains));

    tracing::info!(
        "Serving HTTP on :{}, LITE WS on :{}, FULL WS on :{}, DOMAINS_ONLY WS on :{}",
        config.port,
        config.port + 1,
        config.port + 2,
        config.port + 3
    );

    let result = tokio::try_join!(
        async { http_server.await.map_err(anyhow::Error::from) },
        async { lite_server.await.map_err(anyhow::Error::from) },
        async { full_server.await.map_err(anyhow::Error::from) },
        async { domains_server.await.map_err(anyhow::Error::from) },
    );

    scheduler.stop().await;
    drop(broker);
    let _ = publish_task.await;

    result?;
    tracing::info!("ct-fanout shut down cleanly");
    Ok(())
}

/// Resolves once Ctrl-C is received; cloned into every server so all
/// four listeners and the poll scheduler drain together.
fn shutdown_signal() -> tokio::sync::watch::Receiver<bool> {
    let (tx, rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        let _ = tx.send(true);
    });
    rx
}

async fn wait_for(mut signal: tokio::sync::watch::Receiver<bool>) {
    loop {
        if *signal.borrow() {
            return;
        }
        if signal.changed().await.is_err() {
            return;
        }
    }
}
