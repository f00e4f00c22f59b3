use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::info;
use u360_core::config::{AppConfig, ConfigError, LoadOptions, TransportKind};
use u360_slack::{
    app::default_dispatcher,
    client::TransportError,
    socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner, SocketTransport},
    web_api::WebApiClient,
    websocket::WebSocketTransport,
};

pub struct Application {
    pub config: AppConfig,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack web api client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("listener registration failed: {0}")]
    Listeners(#[source] regex::Error),
    #[error("could not resolve the bot identity: {0}")]
    Identity(#[source] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the Web API client, the listener table and the socket runner for an
/// already validated configuration.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let client =
        WebApiClient::from_config(&config.slack).map_err(BootstrapError::HttpClient)?;
    info!(
        event_name = "system.bootstrap.client_ready",
        correlation_id = "bootstrap",
        api_base_url = client.base_url(),
        "slack web api client ready"
    );

    let mut dispatcher = default_dispatcher(Arc::new(client.clone()))
        .map_err(BootstrapError::Listeners)?
        .with_handler_timeout(Duration::from_millis(config.dispatch.handler_timeout_ms));
    info!(
        event_name = "system.bootstrap.listeners_registered",
        correlation_id = "bootstrap",
        registrations = dispatcher.registration_count(),
        handler_timeout_ms = config.dispatch.handler_timeout_ms,
        "slack listeners registered"
    );

    let transport: Arc<dyn SocketTransport> = match config.socket.transport {
        TransportKind::Websocket => {
            let identity = client.auth_test().await.map_err(BootstrapError::Identity)?;
            info!(
                event_name = "system.bootstrap.identity_resolved",
                correlation_id = "bootstrap",
                bot_user_id = identity.user_id.as_deref().unwrap_or("unknown"),
                bot_id = identity.bot_id.as_deref().unwrap_or("unknown"),
                "events authored by the app will be ignored"
            );
            dispatcher = dispatcher.with_bot_identity(identity);
            Arc::new(
                WebSocketTransport::from_config(&config.slack)
                    .map_err(BootstrapError::HttpClient)?,
            )
        }
        TransportKind::Noop => Arc::new(NoopSocketTransport),
    };

    let slack_runner = SocketModeRunner::new(
        transport,
        Arc::new(dispatcher),
        ReconnectPolicy::from_config(&config.socket),
    );

    Ok(Application { config, slack_runner })
}
