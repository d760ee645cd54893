use std::net::SocketAddr;
use std::sync::Arc;
use tokenstats::{
    api, config::Config, db::init_db, AppError, EventSource, JsonlEventSource, Replayer,
    Repository,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "tokenstats exited");
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let pool = init_db(&config.database_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Catch up on events before serving reads.
    let source: Arc<dyn EventSource> = Arc::new(JsonlEventSource::new(&config.events_path));
    let replayer = Replayer::new(source, repo.clone(), config.replay_batch_size);
    let mut aggregator = repo.load_aggregator().await?;
    let result = replayer.replay_incremental(&mut aggregator).await?;
    info!(
        events_applied = result.events_applied,
        snapshots = result.snapshots_recorded,
        watermark = ?result.watermark,
        "Startup replay finished"
    );

    let app = api::create_router(api::AppState::new(repo));
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Serving scope API");

    axum::serve(listener, app).await?;
    Ok(())
}
