use std::error::Error;
use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockroom::infrastructure::{sweeper, AppState};
use stockroom::{config, db, seed, server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = config::Config::from_env();

    // Initialize database
    let db = db::init_db(&config.database_url).await?;

    // Check for seed flag
    if config.seed_demo {
        tracing::info!("Seeding demo data...");
        if let Err(e) = seed::seed_demo_data(&db).await {
            tracing::error!("Failed to seed data: {}", e);
        }
    }

    let state = AppState::new(db);

    // Scheduled overdue sweep
    match config.overdue_sweep_interval {
        Some(period) => {
            let service = state.transactions.clone();
            tokio::spawn(async move {
                sweeper::run_overdue_sweeper(service, period).await;
            });
        }
        None => tracing::info!("Overdue sweep disabled via OVERDUE_SWEEP_INTERVAL_SECS=0"),
    }

    let app = server::build_router(state, &config.cors_allowed_origins);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("📦 Stockroom server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
