use super::{rank, Recommender};
use crate::models::{
    ArtworkId, Recommendation, RecommendationOutcome, RecommendationSource, ScoredArtwork, UserId,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Merges content-based and collaborative output into one ranked list.
///
/// Each sub-recommender is asked for `limit / 2` items. An artwork returned by both
/// gets the mean of its two scores and is tagged [`RecommendationSource::Hybrid`].
pub struct RecommendationBlender {
    content: Arc<dyn Recommender>,
    collaborative: Arc<dyn Recommender>,
}

impl RecommendationBlender {
    pub fn new(content: Arc<dyn Recommender>, collaborative: Arc<dyn Recommender>) -> Self {
        Self {
            content,
            collaborative,
        }
    }

    /// Degrades only when every sub-recommender failed.
    pub async fn blend(&self, user: UserId, limit: usize) -> RecommendationOutcome {
        let half = limit / 2;

        let (content, collaborative) = tokio::join!(
            self.content.recommend(user, half),
            self.collaborative.recommend(user, half)
        );

        let mut failures = Vec::new();
        let mut lists = Vec::with_capacity(2);

        for (recommender, result) in [
            (&self.content, content),
            (&self.collaborative, collaborative),
        ] {
            match result {
                Ok(items) => lists.push(items),
                Err(e) => {
                    warn!(
                        user_id = user,
                        source = recommender.source().as_str(),
                        error = %e,
                        "Recommender failed, blending without it"
                    );
                    failures.push(format!("{}: {}", recommender.source().as_str(), e));
                }
            }
        }

        if lists.is_empty() {
            return RecommendationOutcome::Degraded {
                reason: failures.join("; "),
            };
        }

        let merged = merge(lists.into_iter().flatten());
        let ranked = rank(merged, limit);

        info!(
            "Blended {} recommendations for user {} ({} recommender failures)",
            ranked.len(),
            user,
            failures.len()
        );

        RecommendationOutcome::Ready(ranked)
    }
}

/// Deduplicates by artwork id, keeping first-seen order. Repeats average into the
/// existing entry.
fn merge(items: impl IntoIterator<Item = ScoredArtwork>) -> Vec<ScoredArtwork> {
    let mut index: HashMap<ArtworkId, usize> = HashMap::new();
    let mut merged: Vec<ScoredArtwork> = Vec::new();

    for item in items {
        match index.get(&item.artwork.id) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                existing.score = (existing.score + item.score) / 2.0;
                if existing.source != item.source {
                    existing.source = RecommendationSource::Hybrid;
                }
            }
            None => {
                index.insert(item.artwork.id, merged.len());
                merged.push(item);
            }
        }
    }

    merged
}

/// Snapshot rows for a blended list, each tagged with the source that produced it.
pub fn to_recommendations(
    user: UserId,
    items: &[ScoredArtwork],
    now: DateTime<Utc>,
    ttl: Option<Duration>,
) -> Vec<Recommendation> {
    items
        .iter()
        .map(|item| Recommendation::from_scored(user, item, item.source, now, ttl))
        .collect()
}
