use super::preferences::build_preferences;
use super::similarity::artwork_similarity;
use super::{rank, Recommender};
use crate::config::RecommendationConfig;
use crate::error::Result;
use crate::models::{ArtworkId, RecommendationSource, ScoredArtwork, UserId};
use crate::store::CatalogStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Content-based filtering
///
/// Algorithm:
/// 1. Take the user's first `favorite_seed_limit` favorites, in stored order
/// 2. For each, scan up to `candidates_per_favorite` unseen catalog artworks
/// 3. Keep candidates scoring above `min_content_similarity`
///
/// The seen set starts with all favorites and grows with every kept candidate, so
/// an artwork is recommended at most once per call (from the earliest seed).
pub struct ContentBasedRecommender {
    store: Arc<dyn CatalogStore>,
    config: RecommendationConfig,
}

impl ContentBasedRecommender {
    pub fn new(store: Arc<dyn CatalogStore>, config: RecommendationConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl Recommender for ContentBasedRecommender {
    async fn recommend(&self, user: UserId, limit: usize) -> Result<Vec<ScoredArtwork>> {
        let preferences = build_preferences(self.store.as_ref(), user).await?;
        let favorites = &preferences.favorite_artwork_ids;

        if favorites.is_empty() {
            info!(
                "Content-based: user {} has no favorites, returning empty",
                user
            );
            return Ok(Vec::new());
        }

        let mut seen: HashSet<ArtworkId> = favorites.iter().copied().collect();
        let mut recommendations = Vec::new();

        for favorite_id in favorites.iter().take(self.config.favorite_seed_limit) {
            let Some(favorite) = self.store.get_artwork(*favorite_id).await? else {
                debug!(
                    user_id = user,
                    artwork_id = favorite_id,
                    "Favorite no longer in catalog, skipping"
                );
                continue;
            };

            let candidates = self
                .store
                .list_artworks(&seen, self.config.candidates_per_favorite)
                .await?;

            for candidate in candidates {
                let score = artwork_similarity(&favorite, &candidate);
                if score > self.config.min_content_similarity {
                    seen.insert(candidate.id);
                    recommendations.push(ScoredArtwork {
                        artwork: candidate,
                        score,
                        reason: format!("Similar to {}", favorite.title),
                        source: RecommendationSource::ContentBased,
                    });
                }
            }
        }

        let ranked = rank(recommendations, limit);

        info!(
            "Content-based: user {} retrieved {} candidates from {} favorites",
            user,
            ranked.len(),
            favorites.len().min(self.config.favorite_seed_limit)
        );

        Ok(ranked)
    }

    fn source(&self) -> RecommendationSource {
        RecommendationSource::ContentBased
    }
}
