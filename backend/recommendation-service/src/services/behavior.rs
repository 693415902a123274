use crate::error::{AppError, Result};
use crate::models::{BehaviorEvent, NewInteraction};
use crate::store::CatalogStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

const RATING_RANGE: std::ops::RangeInclusive<i16> = 1..=5;

/// Records user interactions with get-or-create semantics per (user, artwork, kind).
pub struct BehaviorTracker {
    store: Arc<dyn CatalogStore>,
}

impl BehaviorTracker {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Returns the stored event and whether a new row was created.
    ///
    /// A repeat of an existing (user, artwork, kind) triple is merged into its latest
    /// row instead of appending a new one.
    pub async fn track(&self, interaction: NewInteraction) -> Result<(BehaviorEvent, bool)> {
        validate(&interaction)?;

        if self.store.get_artwork(interaction.artwork_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "artwork {}",
                interaction.artwork_id
            )));
        }

        let latest = self
            .store
            .find_latest_behavior(
                interaction.user_id,
                interaction.artwork_id,
                interaction.kind,
            )
            .await?;

        match latest {
            Some(mut event) => {
                event.merge(&interaction);
                self.store.update_behavior(&event).await?;
                debug!(
                    user_id = event.user_id,
                    artwork_id = event.artwork_id,
                    kind = %event.kind,
                    duration_secs = event.duration_secs,
                    "Merged interaction into existing event"
                );
                Ok((event, false))
            }
            None => {
                let event = self.store.insert_behavior(&interaction, Utc::now()).await?;
                debug!(
                    user_id = event.user_id,
                    artwork_id = event.artwork_id,
                    kind = %event.kind,
                    "Recorded new interaction"
                );
                Ok((event, true))
            }
        }
    }
}

fn validate(interaction: &NewInteraction) -> Result<()> {
    if interaction.duration_secs < 0 {
        return Err(AppError::Validation(format!(
            "duration must be non-negative, got {}",
            interaction.duration_secs
        )));
    }
    if let Some(rating) = interaction.rating {
        if !RATING_RANGE.contains(&rating) {
            return Err(AppError::Validation(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artwork, InteractionKind};
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn interaction(duration_secs: i64, rating: Option<i16>) -> NewInteraction {
        NewInteraction {
            user_id: 1,
            artwork_id: 10,
            kind: InteractionKind::View,
            duration_secs,
            rating,
            context: serde_json::Map::new(),
        }
    }

    async fn tracker() -> (Arc<InMemoryStore>, BehaviorTracker) {
        let store = Arc::new(InMemoryStore::new());
        store.insert_artwork(Artwork::new(10, "Water Lilies")).await;
        (store.clone(), BehaviorTracker::new(store))
    }

    #[tokio::test]
    async fn test_first_interaction_creates_event() {
        let (store, tracker) = tracker().await;

        let (event, created) = tracker.track(interaction(30, Some(4))).await.unwrap();

        assert!(created);
        assert_eq!(event.duration_secs, 30);
        assert_eq!(event.rating, Some(4));
        assert_eq!(store.behaviors_for(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_merges_into_latest() {
        let (store, tracker) = tracker().await;

        let mut first = interaction(60, Some(3));
        first.context.insert("room".to_string(), json!("north"));
        first.context.insert("device".to_string(), json!("vr"));
        tracker.track(first).await.unwrap();

        let mut second = interaction(20, None);
        second.context.insert("device".to_string(), json!("desktop"));
        let (event, created) = tracker.track(second).await.unwrap();

        assert!(!created);
        assert_eq!(event.duration_secs, 60);
        assert_eq!(event.rating, Some(3));
        assert_eq!(event.context.get("room"), Some(&json!("north")));
        assert_eq!(event.context.get("device"), Some(&json!("desktop")));

        let stored = store.behaviors_for(1).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], event);
    }

    #[tokio::test]
    async fn test_different_kind_is_separate_event() {
        let (store, tracker) = tracker().await;
        tracker.track(interaction(5, None)).await.unwrap();

        let mut like = interaction(0, None);
        like.kind = InteractionKind::Like;
        let (_, created) = tracker.track(like).await.unwrap();

        assert!(created);
        assert_eq!(store.behaviors_for(1).await.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let (store, tracker) = tracker().await;

        for bad in [interaction(-1, None), interaction(0, Some(0)), interaction(0, Some(6))] {
            let result = tracker.track(bad).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
        assert!(store.behaviors_for(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_artwork_not_found() {
        let (_, tracker) = tracker().await;
        let mut unknown = interaction(0, None);
        unknown.artwork_id = 999;

        let result = tracker.track(unknown).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
