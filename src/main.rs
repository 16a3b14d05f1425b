use std::{net::Ipv4Addr, process::ExitCode, sync::Arc};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tasklane::{backend::Backend, config::Config, create_app, db, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let db = db::open_db(&config.database)?;
    let backend = Backend::new(db).with_oauth(config.oauth_providers, &config.public_url);
    let purged = backend.cleanup_expired_sessions()?;
    info!(purged, "Expired sessions removed");

    let state = AppState {
        backend,
        base_path: Arc::new(config.base_path),
        api_key: config.api_key.map(Arc::from),
    };
    let app = create_app(state);
    let addr = (Ipv4Addr::UNSPECIFIED, config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("running on {addr:?}");

    axum::serve(listener, app).await?;
    Ok(())
}
