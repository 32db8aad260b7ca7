use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use social_link::platforms::{self, PlatformRegistry};
use social_link::store::{self, AccountStore, MemoryAccountStore, PgAccountStore};
use social_link::{api, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_link=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("social-link v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    let store: Arc<dyn AccountStore> = match &config.database_url {
        Some(url) => {
            let pg = PgAccountStore::connect(url).await?;
            pg.migrate().await?;
            info!("Database connected and migrated");
            Arc::new(pg)
        }
        None => {
            warn!("DATABASE_URL not set, linked accounts are kept in memory only");
            Arc::new(MemoryAccountStore::new())
        }
    };

    let mut registry = PlatformRegistry::new();
    platforms::register_defaults(&mut registry, &config);
    info!("Onboarded {} social platforms", registry.count());

    let addr = format!("{}:{}", config.host, config.port);
    let state: SharedState = Arc::new(AppState::new(config, store, registry)?);

    let daemon_state = state.clone();
    tokio::spawn(async move {
        store::refresh_daemon(daemon_state).await;
    });

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready");
    axum::serve(listener, app).await?;

    Ok(())
}
