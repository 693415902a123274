// ============================================
// Similarity Batch Job
// ============================================
//
// Workflow:
// 1. Load users with like/favorite interactions
// 2. Jaccard similarity over liked-artwork sets for every user pair
// 3. Metadata similarity for catalog artwork pairs
// 4. Rebuild each user's stored recommendation snapshot
//
// Per-user and per-row failures are logged and counted; only failing to load the
// user or catalog list aborts a pass.

use crate::config::BatchConfig;
use crate::models::{
    Artwork, ArtworkId, ArtworkSimilarity, InteractionKind, RecommendationOutcome, UserId,
    UserSimilarity,
};
use crate::services::blender::to_recommendations;
use crate::services::similarity::{jaccard, to_cached_similarity};
use crate::services::RecommendationBlender;
use crate::store::CatalogStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const USER_SIMILARITY_ALGORITHM: &str = "jaccard_likes";

/// Similarity batch job statistics
#[derive(Debug, Clone, Default)]
pub struct BatchJobStats {
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub users_loaded: u32,
    pub user_pairs_stored: u32,
    pub artwork_pairs_stored: u32,
    pub users_refreshed: u32,
    pub users_failed: u32,
    pub writes_failed: u32,
    pub total_duration_ms: u64,
}

pub struct SimilarityBatchJob {
    config: BatchConfig,
    store: Arc<dyn CatalogStore>,
    blender: Arc<RecommendationBlender>,
}

impl SimilarityBatchJob {
    pub fn new(
        config: BatchConfig,
        store: Arc<dyn CatalogStore>,
        blender: Arc<RecommendationBlender>,
    ) -> Self {
        Self {
            config,
            store,
            blender,
        }
    }

    /// Run the batch job
    pub async fn run(&self) -> Result<BatchJobStats> {
        loop {
            let stats = self.run_single_pass().await?;

            info!(
                run_id = ?stats.run_id,
                users = stats.users_loaded,
                user_pairs = stats.user_pairs_stored,
                artwork_pairs = stats.artwork_pairs_stored,
                refreshed = stats.users_refreshed,
                failed = stats.users_failed,
                duration_ms = stats.total_duration_ms,
                "Similarity batch pass completed"
            );

            if self.config.run_once {
                return Ok(stats);
            }

            info!(
                interval_secs = self.config.interval_secs,
                "Sleeping until next pass"
            );
            sleep(Duration::from_secs(self.config.interval_secs)).await;
        }
    }

    /// Run a single pass of the batch job
    pub async fn run_single_pass(&self) -> Result<BatchJobStats> {
        let start_time = Instant::now();
        let run_id = Uuid::new_v4();
        let mut stats = BatchJobStats {
            run_id: Some(run_id),
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        info!(
            run_id = %run_id,
            max_users = self.config.max_users,
            max_catalog_artworks = self.config.max_catalog_artworks,
            "Starting similarity batch pass"
        );

        let users = self
            .store
            .list_users_with_interactions(&InteractionKind::POSITIVE, self.config.max_users)
            .await
            .context("Failed to load users with interactions")?;
        stats.users_loaded = users.len() as u32;

        // 1. User-user similarity
        let mut liked: BTreeMap<UserId, BTreeSet<ArtworkId>> = BTreeMap::new();
        for user in &users {
            match self
                .store
                .get_behaviors(*user, &InteractionKind::POSITIVE)
                .await
            {
                Ok(behaviors) => {
                    liked.insert(*user, behaviors.iter().map(|b| b.artwork_id).collect());
                }
                Err(e) => {
                    stats.users_failed += 1;
                    error!(run_id = %run_id, user_id = user, error = %e, "Failed to load likes");
                }
            }
        }

        for row in compute_user_similarities(&liked, self.config.min_user_similarity) {
            match self.store.upsert_user_similarity(&row).await {
                Ok(()) => stats.user_pairs_stored += 1,
                Err(e) => {
                    stats.writes_failed += 1;
                    warn!(
                        user_a = row.user_a,
                        user_b = row.user_b,
                        error = %e,
                        "Failed to store user similarity"
                    );
                }
            }
        }

        // 2. Artwork similarity cache
        let catalog = self
            .store
            .list_artworks(&HashSet::new(), self.config.max_catalog_artworks)
            .await
            .context("Failed to load catalog")?;

        for row in compute_artwork_similarities(&catalog, self.config.min_artwork_similarity) {
            match self.store.upsert_artwork_similarity(&row).await {
                Ok(()) => stats.artwork_pairs_stored += 1,
                Err(e) => {
                    stats.writes_failed += 1;
                    warn!(
                        artwork_a = row.artwork_a,
                        artwork_b = row.artwork_b,
                        error = %e,
                        "Failed to store artwork similarity"
                    );
                }
            }
        }

        // 3. Recommendation snapshots, built on the similarities just written
        let ttl = chrono::Duration::seconds(self.config.recommendation_ttl_secs);
        for user in liked.keys() {
            let items = match self
                .blender
                .blend(*user, self.config.recommendations_per_user)
                .await
            {
                RecommendationOutcome::Ready(items) => items,
                RecommendationOutcome::Degraded { reason } => {
                    stats.users_failed += 1;
                    warn!(run_id = %run_id, user_id = user, reason = %reason, "Skipping snapshot");
                    continue;
                }
            };

            let rows = to_recommendations(*user, &items, Utc::now(), Some(ttl));
            match self.store.replace_recommendations(*user, &rows).await {
                Ok(()) => stats.users_refreshed += 1,
                Err(e) => {
                    stats.users_failed += 1;
                    error!(
                        run_id = %run_id,
                        user_id = user,
                        error = %e,
                        "Failed to store recommendations"
                    );
                }
            }
        }

        stats.completed_at = Some(Utc::now());
        stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

        Ok(stats)
    }
}

/// Jaccard similarity of liked-artwork sets for every user pair sharing at least one
/// like and scoring at least `min_score`. Pairs are canonical (smaller id first).
pub fn compute_user_similarities(
    liked: &BTreeMap<UserId, BTreeSet<ArtworkId>>,
    min_score: f64,
) -> Vec<UserSimilarity> {
    let users: Vec<(&UserId, &BTreeSet<ArtworkId>)> = liked.iter().collect();
    let mut rows = Vec::new();

    for (i, (user_a, likes_a)) in users.iter().enumerate() {
        for (user_b, likes_b) in &users[i + 1..] {
            let common = likes_a.intersection(likes_b).count();
            if common == 0 {
                continue;
            }

            let score = jaccard(likes_a.iter(), likes_b.iter());
            if score < min_score {
                continue;
            }

            rows.push(UserSimilarity {
                user_a: **user_a,
                user_b: **user_b,
                score,
                algorithm: USER_SIMILARITY_ALGORITHM.to_string(),
                common_interactions: common as i32,
                features: json!({
                    "liked_a": likes_a.len(),
                    "liked_b": likes_b.len(),
                }),
            });
        }
    }

    rows
}

/// Metadata similarity rows for catalog pairs scoring above `min_score`.
pub fn compute_artwork_similarities(
    artworks: &[Artwork],
    min_score: f64,
) -> Vec<ArtworkSimilarity> {
    let mut rows = Vec::new();

    for (i, a) in artworks.iter().enumerate() {
        for b in &artworks[i + 1..] {
            if a.id == b.id {
                continue;
            }
            let row = to_cached_similarity(a, b);
            if row.score > min_score {
                rows.push(row);
            }
        }
    }

    rows
}
