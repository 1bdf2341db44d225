use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;

use crystallure_rag::core::config::Settings;
use crystallure_rag::core::logging;
use crystallure_rag::server::router;
use crystallure_rag::state::AppState;

/// How often idle sessions are swept.
const EVICTION_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("Invalid configuration")?;
    logging::init(&settings.log_dir);

    let state = AppState::initialize(&settings);

    // Best effort; the shipped product list covers a failed load.
    state
        .pipeline
        .catalog()
        .reload(state.pipeline.index().as_ref())
        .await;

    let eviction_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = eviction_state.pipeline.sessions().evict_expired();
            if evicted > 0 {
                tracing::info!(evicted, "expired sessions removed");
            }
        }
    });

    let bind_addr = format!("127.0.0.1:{}", settings.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app = router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
