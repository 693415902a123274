use super::{rank, Recommender};
use crate::config::RecommendationConfig;
use crate::error::Result;
use crate::models::{
    Artwork, ArtworkId, InteractionKind, RecommendationSource, ScoredArtwork, UserId,
};
use crate::store::CatalogStore;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

pub const COLLABORATIVE_REASON: &str = "Liked by users similar to you";

/// User-based collaborative filtering over precomputed similarity rows.
///
/// Similar users are walked highest score first; an artwork keeps the score of the
/// first similar user that produced it. Scores are damped, so they never exceed
/// `collaborative_damping`.
pub struct CollaborativeRecommender {
    store: Arc<dyn CatalogStore>,
    config: RecommendationConfig,
}

impl CollaborativeRecommender {
    pub fn new(store: Arc<dyn CatalogStore>, config: RecommendationConfig) -> Self {
        Self { store, config }
    }

    async fn liked_artwork_ids(&self, user: UserId) -> Result<Vec<ArtworkId>> {
        let behaviors = self
            .store
            .get_behaviors(user, &InteractionKind::POSITIVE)
            .await?;
        Ok(behaviors.into_iter().map(|b| b.artwork_id).collect())
    }
}

#[async_trait]
impl Recommender for CollaborativeRecommender {
    async fn recommend(&self, user: UserId, limit: usize) -> Result<Vec<ScoredArtwork>> {
        let mut similar = self
            .store
            .get_user_similarities(user, self.config.similar_user_limit)
            .await?;
        similar.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        if similar.is_empty() {
            info!(
                "Collaborative: user {} has no similar users, returning empty",
                user
            );
            return Ok(Vec::new());
        }

        let already_liked: HashSet<ArtworkId> =
            self.liked_artwork_ids(user).await?.into_iter().collect();
        let mut seen: HashSet<ArtworkId> = HashSet::new();
        let mut recommendations = Vec::new();

        for row in similar.iter().take(self.config.similar_user_limit) {
            let Some(neighbor) = row.other(user).filter(|other| *other != user) else {
                continue;
            };

            let score = (row.score.clamp(0.0, 1.0) * self.config.collaborative_damping)
                .clamp(0.0, 1.0);

            let candidate_ids: Vec<ArtworkId> = self
                .liked_artwork_ids(neighbor)
                .await?
                .into_iter()
                .filter(|id| !already_liked.contains(id) && seen.insert(*id))
                .collect();

            if candidate_ids.is_empty() {
                continue;
            }

            let mut artworks: HashMap<ArtworkId, Artwork> = self
                .store
                .get_artworks(&candidate_ids)
                .await?
                .into_iter()
                .map(|a| (a.id, a))
                .collect();

            debug!(
                user_id = user,
                neighbor_id = neighbor,
                similarity = row.score,
                candidates = candidate_ids.len(),
                "Collected neighbor likes"
            );

            for id in candidate_ids {
                if let Some(artwork) = artworks.remove(&id) {
                    recommendations.push(ScoredArtwork {
                        artwork,
                        score,
                        reason: COLLABORATIVE_REASON.to_string(),
                        source: RecommendationSource::Collaborative,
                    });
                }
            }
        }

        let ranked = rank(recommendations, limit);

        info!(
            "Collaborative: user {} retrieved {} candidates from {} similar users",
            user,
            ranked.len(),
            similar.len().min(self.config.similar_user_limit)
        );

        Ok(ranked)
    }

    fn source(&self) -> RecommendationSource {
        RecommendationSource::Collaborative
    }
}
