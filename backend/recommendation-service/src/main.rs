use anyhow::Context;
use recommendation_service::{
    CollaborativeRecommender, Config, ContentBasedRecommender, PgCatalogStore,
    RecommendationBlender, SimilarityBatchJob,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,recommendation_service=debug".into()),
        )
        .with(fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        "Starting recommendation-service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize database
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to create database pool")?;

    let store = Arc::new(PgCatalogStore::new(pool));

    let content = Arc::new(ContentBasedRecommender::new(
        store.clone(),
        config.recommendation.clone(),
    ));
    let collaborative = Arc::new(CollaborativeRecommender::new(
        store.clone(),
        config.recommendation.clone(),
    ));
    let blender = Arc::new(RecommendationBlender::new(content, collaborative));

    let job = SimilarityBatchJob::new(config.batch.clone(), store, blender);

    tokio::select! {
        result = job.run() => {
            let stats = result.map_err(|e| {
                error!("Similarity batch job failed: {:#}", e);
                e
            })?;
            info!(
                users = stats.users_loaded,
                refreshed = stats.users_refreshed,
                failed = stats.users_failed,
                "Similarity batch job finished"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping batch job");
        }
    }

    Ok(())
}
