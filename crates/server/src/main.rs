mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use u360_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use u360_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging reads its level and format from the same config bootstrap uses.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState {
            registrations: app.slack_runner.dispatcher().registration_count(),
            transport_mode: app.slack_runner.transport_mode(),
        },
    )
    .await?;

    tracing::info!(
        event_name = "system.server.slack_transport_mode",
        transport_mode = app.slack_runner.transport_mode(),
        correlation_id = "bootstrap",
        "slack runner transport mode initialized"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let runner = app.slack_runner;
    let mut runner_task = tokio::spawn(async move { runner.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "u360-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "u360-server stopping"
    );

    if tokio::time::timeout(grace, &mut runner_task).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "slack runner did not stop within the grace period; aborting"
        );
        runner_task.abort();
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
