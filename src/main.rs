use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use phishguard::{
    config::Config,
    api::routes::create_router,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before anything reads the environment, RUST_LOG included
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let server_addr = config.server_addr;
    info!(
        program = %config.classifier_program,
        script = ?config.classifier_script,
        timeout = ?config.classifier_timeout,
        max_concurrency = config.classifier_max_concurrency,
        "classifier configured"
    );

    let app = create_router(AppState::new(config));

    let listener = TcpListener::bind(server_addr).await?;
    info!("Listening on http://{}", server_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    wait_for_signal(tokio::signal::ctrl_c()).await
}

/// Resolves when `signal` fires. A handler that failed to install never resolves.
async fn wait_for_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "failed to install Ctrl-C handler, graceful shutdown disabled");
            std::future::pending::<()>().await;
        }
    }
}
