//! # Board-Bridge Service
//!
//! Binary entry point for the Board-Bridge HTTP service.
//!
//! This executable:
//! - Loads configuration from environment and files
//! - Initializes logging
//! - Builds the work-item and workflow-dispatch clients
//! - Starts the HTTP server from board-bridge-service

use board_bridge_service::{start_server, ServiceError};
use board_bridge_core::{AdoClient, BridgeConfig, DispatchPipeline, GithubWorkflowClient};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "board_bridge_service=info,board_bridge_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Board-Bridge Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/board-bridge/service.yaml   - system-wide defaults
    //  2. ./config/service.yaml            - deployment-local override
    //  3. Path given by BB_CONFIG_FILE env - operator-specified file
    //  4. Environment variables prefixed BB__ (double-underscore separator)
    //     e.g. BB__GITHUB__OWNER=my-org sets github.owner = "my-org"
    //
    // All configuration fields carry serde defaults, so absent files or an
    // entirely unconfigured environment produces a deserializable config; the
    // validate() call below decides whether it is actually usable. A
    // malformed file or an environment variable that cannot be coerced to the
    // correct type IS a hard error because it indicates
    // deliberate-but-broken operator configuration.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/board-bridge/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    // Optional explicit path supplied by the operator.
    if let Ok(explicit_path) = std::env::var("BB_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "Loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("BB").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let bridge_config: BridgeConfig = match config.try_deserialize() {
        Ok(bc) => bc,
        Err(e) => {
            error!(
                error = %e,
                "Could not deserialize configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = bridge_config.validate() {
        error!(error = %e, "Configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Build collaborators and the pipeline
    // -------------------------------------------------------------------------
    let store = match AdoClient::new(&bridge_config.ado) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to build work-item client; aborting");
            std::process::exit(2);
        }
    };

    let dispatcher = match GithubWorkflowClient::new(bridge_config.github.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to build workflow dispatch client; aborting");
            std::process::exit(2);
        }
    };

    let pipeline = Arc::new(DispatchPipeline::new(store, dispatcher, &bridge_config));

    info!(
        host = %bridge_config.server.host,
        port = bridge_config.server.port,
        endpoint = %bridge_config.server.endpoint_path,
        "Starting HTTP server"
    );

    // Start the server
    if let Err(e) = start_server(bridge_config, pipeline).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}
