use std::process::ExitCode;

use paperdigest::{load_config, Pipeline};
use paperdigest_server::logging::{self, LogFormat};
use paperdigest_server::{serve, AppState, ServerError};

const ENV_CONFIG_PATH: &str = "PAPERDIGEST_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "paperdigest.json";

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(LogFormat::from_env());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "paperdigest-server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    let config_path =
        std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    tracing::info!(path = %config_path, "Loading configuration");

    let config = load_config(&config_path)?;
    // Missing credentials fail here, before the port is opened.
    let pipeline = Pipeline::from_config(&config)?;

    serve(&config.server, AppState::new(pipeline)).await
}
