use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::llm_clients::OpenAIClient;
use crate::infrastructure::storage::JsonFileStore;
use crate::infrastructure::tracker::AzureDevOpsClient;
use crate::interfaces::http::{add_log, start_server, LogEntry};
use crate::interfaces::state::AppState;

fn to_io(err: crate::domain::error::AppError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

pub async fn run() -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = AppConfig::load().map_err(to_io)?;
    let tracker = AzureDevOpsClient::new(&config.tracker).map_err(to_io)?;
    let llm_client = OpenAIClient::new().map_err(to_io)?;
    let store = JsonFileStore::new(
        config.storage.test_cases_path.clone(),
        config.storage.history_path.clone(),
    );

    let state = Arc::new(AppState::new(
        &config,
        Arc::new(tracker),
        Arc::new(llm_client),
        Arc::new(store),
    ));
    let logs: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));

    let server = start_server(state, logs.clone(), &config.server.host, config.server.port)?;
    add_log(
        &logs,
        "INFO",
        "System",
        &format!(
            "HTTP server started on {}:{}",
            config.server.host, config.server.port
        ),
    );
    tracing::info!(host = %config.server.host, port = config.server.port, "Serving");

    server.await
}
