use super::{CatalogStore, CurationPolicy};
use crate::error::{AppError, Result};
use crate::models::{
    Artwork, ArtworkId, ArtworkSimilarity, BehaviorEvent, InteractionKind, NewInteraction,
    Placement, Recommendation, UserId, UserSimilarity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    artworks: BTreeMap<ArtworkId, Artwork>,
    favorites: HashMap<UserId, Vec<ArtworkId>>,
    viewed: HashMap<UserId, HashSet<ArtworkId>>,
    search_history: HashMap<UserId, Vec<String>>,
    behaviors: Vec<BehaviorEvent>,
    next_behavior_id: i64,
    user_similarities: Vec<UserSimilarity>,
    artwork_similarities: Vec<ArtworkSimilarity>,
    recommendations: Vec<Recommendation>,
    layouts: HashMap<String, Vec<Placement>>,
}

/// Store kept entirely in memory. Catalog order is ascending artwork id.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_artwork(&self, artwork: Artwork) {
        self.state.write().await.artworks.insert(artwork.id, artwork);
    }

    pub async fn add_favorite(&self, user: UserId, artwork: ArtworkId) {
        let mut state = self.state.write().await;
        let favorites = state.favorites.entry(user).or_default();
        if !favorites.contains(&artwork) {
            favorites.push(artwork);
        }
    }

    pub async fn add_view(&self, user: UserId, artwork: ArtworkId) {
        self.state
            .write()
            .await
            .viewed
            .entry(user)
            .or_default()
            .insert(artwork);
    }

    pub async fn add_search_term(&self, user: UserId, term: impl Into<String>) {
        self.state
            .write()
            .await
            .search_history
            .entry(user)
            .or_default()
            .push(term.into());
    }

    /// Appends a behavior row stamped with the current time.
    pub async fn record(&self, user: UserId, artwork: ArtworkId, kind: InteractionKind) {
        let interaction = NewInteraction {
            user_id: user,
            artwork_id: artwork,
            kind,
            duration_secs: 0,
            rating: None,
            context: serde_json::Map::new(),
        };
        let mut state = self.state.write().await;
        let at = Utc::now() + chrono::Duration::microseconds(state.next_behavior_id);
        push_behavior(&mut state, &interaction, at);
    }

    pub async fn add_user_similarity(&self, row: UserSimilarity) {
        self.state.write().await.user_similarities.push(row);
    }

    pub async fn user_similarities(&self) -> Vec<UserSimilarity> {
        self.state.read().await.user_similarities.clone()
    }

    pub async fn artwork_similarities(&self) -> Vec<ArtworkSimilarity> {
        self.state.read().await.artwork_similarities.clone()
    }

    pub async fn recommendations_for(&self, user: UserId) -> Vec<Recommendation> {
        self.state
            .read()
            .await
            .recommendations
            .iter()
            .filter(|r| r.user_id == user)
            .cloned()
            .collect()
    }

    pub async fn behaviors_for(&self, user: UserId) -> Vec<BehaviorEvent> {
        self.state
            .read()
            .await
            .behaviors
            .iter()
            .filter(|b| b.user_id == user)
            .cloned()
            .collect()
    }

    pub async fn layout(&self, resource: &str) -> Option<Vec<Placement>> {
        self.state.read().await.layouts.get(resource).cloned()
    }
}

fn push_behavior(
    state: &mut MemoryState,
    interaction: &NewInteraction,
    at: DateTime<Utc>,
) -> BehaviorEvent {
    state.next_behavior_id += 1;
    let event = BehaviorEvent {
        id: state.next_behavior_id,
        user_id: interaction.user_id,
        artwork_id: interaction.artwork_id,
        kind: interaction.kind,
        timestamp: at,
        duration_secs: interaction.duration_secs,
        rating: interaction.rating,
        context: interaction.context.clone(),
    };
    state.behaviors.push(event.clone());
    event
}

fn matches_term(artwork: &Artwork, needle: &str) -> bool {
    let contains = |value: Option<&str>| {
        value
            .map(|v| v.to_lowercase().contains(needle))
            .unwrap_or(false)
    };

    contains(artwork.theme())
        || contains(artwork.style())
        || artwork.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_artwork(&self, id: ArtworkId) -> Result<Option<Artwork>> {
        Ok(self.state.read().await.artworks.get(&id).cloned())
    }

    async fn get_artworks(&self, ids: &[ArtworkId]) -> Result<Vec<Artwork>> {
        let wanted: HashSet<ArtworkId> = ids.iter().copied().collect();
        Ok(self
            .state
            .read()
            .await
            .artworks
            .values()
            .filter(|a| wanted.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn list_artworks(
        &self,
        exclude: &HashSet<ArtworkId>,
        limit: usize,
    ) -> Result<Vec<Artwork>> {
        Ok(self
            .state
            .read()
            .await
            .artworks
            .values()
            .filter(|a| !exclude.contains(&a.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn search_artworks(&self, term: &str, limit: usize) -> Result<Vec<Artwork>> {
        let needle = term.trim().to_lowercase();
        Ok(self
            .state
            .read()
            .await
            .artworks
            .values()
            .filter(|a| matches_term(a, &needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_user_favorites(&self, user: UserId) -> Result<Vec<ArtworkId>> {
        Ok(self
            .state
            .read()
            .await
            .favorites
            .get(&user)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_user_viewed(&self, user: UserId) -> Result<HashSet<ArtworkId>> {
        Ok(self
            .state
            .read()
            .await
            .viewed
            .get(&user)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_search_history(&self, user: UserId) -> Result<Vec<String>> {
        Ok(self
            .state
            .read()
            .await
            .search_history
            .get(&user)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_behaviors(
        &self,
        user: UserId,
        kinds: &[InteractionKind],
    ) -> Result<Vec<BehaviorEvent>> {
        let mut events: Vec<BehaviorEvent> = self
            .state
            .read()
            .await
            .behaviors
            .iter()
            .filter(|b| b.user_id == user && kinds.contains(&b.kind))
            .cloned()
            .collect();
        // Newest first, like the behavior log's default ordering
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(events)
    }

    async fn get_user_similarities(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<UserSimilarity>> {
        let mut rows: Vec<UserSimilarity> = self
            .state
            .read()
            .await
            .user_similarities
            .iter()
            .filter(|s| s.involves(user))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn find_latest_behavior(
        &self,
        user: UserId,
        artwork: ArtworkId,
        kind: InteractionKind,
    ) -> Result<Option<BehaviorEvent>> {
        Ok(self
            .state
            .read()
            .await
            .behaviors
            .iter()
            .filter(|b| b.user_id == user && b.artwork_id == artwork && b.kind == kind)
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn insert_behavior(
        &self,
        interaction: &NewInteraction,
        at: DateTime<Utc>,
    ) -> Result<BehaviorEvent> {
        let mut state = self.state.write().await;
        let duplicate = state.behaviors.iter().any(|b| {
            b.user_id == interaction.user_id
                && b.artwork_id == interaction.artwork_id
                && b.kind == interaction.kind
                && b.timestamp == at
        });
        if duplicate {
            return Err(AppError::Database(format!(
                "duplicate behavior for user {} artwork {} kind {} at {}",
                interaction.user_id, interaction.artwork_id, interaction.kind, at
            )));
        }
        Ok(push_behavior(&mut state, interaction, at))
    }

    async fn update_behavior(&self, event: &BehaviorEvent) -> Result<()> {
        let mut state = self.state.write().await;
        let row = state
            .behaviors
            .iter_mut()
            .find(|b| b.id == event.id)
            .ok_or_else(|| AppError::NotFound(format!("behavior {}", event.id)))?;
        *row = event.clone();
        Ok(())
    }

    async fn list_users_with_interactions(
        &self,
        kinds: &[InteractionKind],
        limit: usize,
    ) -> Result<Vec<UserId>> {
        let users: std::collections::BTreeSet<UserId> = self
            .state
            .read()
            .await
            .behaviors
            .iter()
            .filter(|b| kinds.contains(&b.kind))
            .map(|b| b.user_id)
            .collect();
        Ok(users.into_iter().take(limit).collect())
    }

    async fn upsert_user_similarity(&self, row: &UserSimilarity) -> Result<()> {
        let mut state = self.state.write().await;
        match state.user_similarities.iter_mut().find(|s| {
            s.user_a == row.user_a && s.user_b == row.user_b && s.algorithm == row.algorithm
        }) {
            Some(existing) => *existing = row.clone(),
            None => state.user_similarities.push(row.clone()),
        }
        Ok(())
    }

    async fn upsert_artwork_similarity(&self, row: &ArtworkSimilarity) -> Result<()> {
        let mut state = self.state.write().await;
        match state.artwork_similarities.iter_mut().find(|s| {
            s.artwork_a == row.artwork_a
                && s.artwork_b == row.artwork_b
                && s.algorithm == row.algorithm
                && s.similarity_type == row.similarity_type
        }) {
            Some(existing) => *existing = row.clone(),
            None => state.artwork_similarities.push(row.clone()),
        }
        Ok(())
    }

    async fn replace_recommendations(
        &self,
        user: UserId,
        recommendations: &[Recommendation],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.recommendations.retain(|r| r.user_id != user);
        state.recommendations.extend_from_slice(recommendations);
        Ok(())
    }

    async fn save_layout(&self, resource: &str, placements: &[Placement]) -> Result<()> {
        self.state
            .write()
            .await
            .layouts
            .insert(resource.to_string(), placements.to_vec());
        Ok(())
    }
}

/// Curation policy backed by a fixed set of curator ids.
#[derive(Debug, Clone, Default)]
pub struct StaticCurationPolicy {
    curators: HashSet<UserId>,
}

impl StaticCurationPolicy {
    pub fn new(curators: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            curators: curators.into_iter().collect(),
        }
    }
}

#[async_trait]
impl CurationPolicy for StaticCurationPolicy {
    async fn can_curate(&self, user: UserId, _resource: &str) -> bool {
        self.curators.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn similarity(a: UserId, b: UserId, score: f64) -> UserSimilarity {
        UserSimilarity {
            user_a: a,
            user_b: b,
            score,
            algorithm: "jaccard_likes".to_string(),
            common_interactions: 1,
            features: json!({}),
        }
    }

    #[tokio::test]
    async fn test_similarities_found_in_both_orderings() {
        let store = InMemoryStore::new();
        store.add_user_similarity(similarity(1, 2, 0.4)).await;
        store.add_user_similarity(similarity(3, 1, 0.9)).await;
        store.add_user_similarity(similarity(2, 3, 0.7)).await;

        let rows = store.get_user_similarities(1, 5).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].other(1), Some(3));
        assert_eq!(rows[1].other(1), Some(2));

        let limited = store.get_user_similarities(1, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].score, 0.9);
    }

    #[tokio::test]
    async fn test_list_artworks_excludes_and_limits() {
        let store = InMemoryStore::new();
        for id in 1..=5 {
            store.insert_artwork(Artwork::new(id, format!("A{}", id))).await;
        }
        let exclude: HashSet<ArtworkId> = [2, 3].into_iter().collect();
        let listed = store.list_artworks(&exclude, 2).await.unwrap();
        let ids: Vec<ArtworkId> = listed.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[tokio::test]
    async fn test_search_matches_theme_style_and_tags() {
        let store = InMemoryStore::new();
        store
            .insert_artwork(Artwork::new(1, "Harbor").with_theme("Seascape"))
            .await;
        store
            .insert_artwork(Artwork::new(2, "Waves").with_tags(["stormy sea"]))
            .await;
        store
            .insert_artwork(Artwork::new(3, "Portrait").with_style("Baroque"))
            .await;

        let found = store.search_artworks("SEA", 10).await.unwrap();
        let ids: Vec<ArtworkId> = found.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_insert_behavior_rejects_duplicate_key() {
        let store = InMemoryStore::new();
        let interaction = NewInteraction {
            user_id: 1,
            artwork_id: 2,
            kind: InteractionKind::Like,
            duration_secs: 0,
            rating: None,
            context: serde_json::Map::new(),
        };
        let at = Utc::now();
        assert!(store.insert_behavior(&interaction, at).await.is_ok());
        assert!(store.insert_behavior(&interaction, at).await.is_err());
    }

    #[tokio::test]
    async fn test_static_curation_policy() {
        let policy = StaticCurationPolicy::new([7]);
        assert!(policy.can_curate(7, "gallery:1").await);
        assert!(!policy.can_curate(8, "gallery:1").await);
    }
}
