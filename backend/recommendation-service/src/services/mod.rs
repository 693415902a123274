pub mod behavior;
pub mod blender;
pub mod collaborative;
pub mod content_based;
pub mod placement;
pub mod preferences;
pub mod similarity;
pub mod tours;

pub use behavior::BehaviorTracker;
pub use blender::RecommendationBlender;
pub use collaborative::CollaborativeRecommender;
pub use content_based::ContentBasedRecommender;
pub use placement::{PlacementMode, PlacementPlanner, RoomBounds};
pub use tours::TourBuilder;

use crate::error::Result;
use crate::models::{RecommendationSource, ScoredArtwork, UserId};
use async_trait::async_trait;
use std::cmp::Ordering;

/// A recommendation engine producing scored artworks for a user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, user: UserId, limit: usize) -> Result<Vec<ScoredArtwork>>;
    fn source(&self) -> RecommendationSource;
}

/// Stable sort by score descending, then truncate.
pub(crate) fn rank(mut items: Vec<ScoredArtwork>, limit: usize) -> Vec<ScoredArtwork> {
    items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Artwork;

    fn scored(id: i64, score: f64) -> ScoredArtwork {
        ScoredArtwork {
            artwork: Artwork::new(id, format!("A{}", id)),
            score,
            reason: String::new(),
            source: RecommendationSource::ContentBased,
        }
    }

    #[test]
    fn test_rank_is_stable_and_truncates() {
        let ranked = rank(
            vec![scored(1, 0.5), scored(2, 0.9), scored(3, 0.5), scored(4, 0.1)],
            3,
        );
        let ids: Vec<i64> = ranked.iter().map(|s| s.artwork.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
