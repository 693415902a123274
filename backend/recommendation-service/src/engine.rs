//! Caller-facing facade over the recommendation, placement and tour services.
//!
//! Recommendation calls never fail: store or scoring errors are logged and turned into
//! [`RecommendationOutcome::Degraded`]. Everything else returns [`Result`], with input
//! problems reported as [`AppError::Validation`] before any work starts.

use crate::config::{Config, PlacementConfig, RecommendationConfig, TourConfig};
use crate::error::{AppError, Result};
use crate::models::{
    ArtworkId, BehaviorEvent, NewInteraction, Placement, Recommendation,
    RecommendationOutcome, Tour, UserId,
};
use crate::services::blender::to_recommendations;
use crate::services::{
    BehaviorTracker, CollaborativeRecommender, ContentBasedRecommender, PlacementMode,
    PlacementPlanner, RecommendationBlender, Recommender, TourBuilder,
};
use crate::store::{CatalogStore, CurationPolicy};
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub recommendation: RecommendationConfig,
    pub placement: PlacementConfig,
    pub tour: TourConfig,
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            recommendation: config.recommendation.clone(),
            placement: config.placement.clone(),
            tour: config.tour.clone(),
        }
    }
}

pub struct RecommendationEngine {
    store: Arc<dyn CatalogStore>,
    curation: Arc<dyn CurationPolicy>,
    content: Arc<dyn Recommender>,
    collaborative: Arc<dyn Recommender>,
    blender: Arc<RecommendationBlender>,
    planner: PlacementPlanner,
    tours: TourBuilder,
    tracker: BehaviorTracker,
}

impl RecommendationEngine {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        curation: Arc<dyn CurationPolicy>,
        config: EngineConfig,
    ) -> Self {
        let content: Arc<dyn Recommender> = Arc::new(ContentBasedRecommender::new(
            store.clone(),
            config.recommendation.clone(),
        ));
        let collaborative: Arc<dyn Recommender> = Arc::new(CollaborativeRecommender::new(
            store.clone(),
            config.recommendation,
        ));
        let blender = Arc::new(RecommendationBlender::new(
            content.clone(),
            collaborative.clone(),
        ));

        Self {
            planner: PlacementPlanner::new(config.placement),
            tours: TourBuilder::new(store.clone(), blender.clone(), config.tour),
            tracker: BehaviorTracker::new(store.clone()),
            store,
            curation,
            content,
            collaborative,
            blender,
        }
    }

    pub fn blender(&self) -> Arc<RecommendationBlender> {
        self.blender.clone()
    }

    pub async fn personalized_recommendations(
        &self,
        user: UserId,
        limit: usize,
    ) -> RecommendationOutcome {
        self.blender.blend(user, limit).await
    }

    pub async fn content_based_recommendations(
        &self,
        user: UserId,
        limit: usize,
    ) -> RecommendationOutcome {
        run_single(self.content.as_ref(), user, limit).await
    }

    pub async fn collaborative_recommendations(
        &self,
        user: UserId,
        limit: usize,
    ) -> RecommendationOutcome {
        run_single(self.collaborative.as_ref(), user, limit).await
    }

    /// Lays out the requested artworks, in request order.
    ///
    /// Repeated ids are placed once; ids missing from the catalog are skipped.
    /// Omitted room dimensions use the configured default room.
    pub async fn optimize_placement(
        &self,
        artwork_ids: &[ArtworkId],
        room_width: Option<f64>,
        room_height: Option<f64>,
        group_by_similarity: bool,
    ) -> Result<Vec<Placement>> {
        if artwork_ids.is_empty() {
            return Err(AppError::Validation(
                "at least one artwork id is required".to_string(),
            ));
        }
        let room = self.planner.room(room_width, room_height)?;

        let mut seen = HashSet::new();
        let requested: Vec<ArtworkId> = artwork_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let mut by_id: HashMap<ArtworkId, _> = self
            .store
            .get_artworks(&requested)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        let artworks: Vec<_> = requested.iter().filter_map(|id| by_id.remove(id)).collect();

        if artworks.len() < requested.len() {
            warn!(
                requested = requested.len(),
                found = artworks.len(),
                "Some artworks for placement were not found, skipping them"
            );
        }

        let mode = PlacementMode::from_grouping(group_by_similarity);
        let placements = self.planner.place(&artworks, room, mode);

        info!(
            artworks = placements.len(),
            grouped = group_by_similarity,
            "Computed placement"
        );

        Ok(placements)
    }

    /// Persists a layout for `resource`; only curators of that resource may do so.
    pub async fn save_layout(
        &self,
        user: UserId,
        resource: &str,
        placements: &[Placement],
    ) -> Result<()> {
        if !self.curation.can_curate(user, resource).await {
            warn!(user_id = user, resource = %resource, "Layout save denied");
            return Err(AppError::Forbidden(format!(
                "user {} cannot curate {}",
                user, resource
            )));
        }

        if let Some(bad) = placements
            .iter()
            .find(|p| !p.position.is_finite() || !p.rotation.is_finite() || p.scale <= 0.0)
        {
            return Err(AppError::Validation(format!(
                "invalid placement for artwork {}",
                bad.artwork_id
            )));
        }

        self.store.save_layout(resource, placements).await?;
        info!(
            user_id = user,
            resource = %resource,
            placements = placements.len(),
            "Saved layout"
        );
        Ok(())
    }

    pub async fn thematic_tour(
        &self,
        theme: &str,
        user: Option<UserId>,
        max_artworks: Option<usize>,
    ) -> Result<Tour> {
        self.tours.thematic_tour(theme, user, max_artworks).await
    }

    pub async fn personalized_tour(
        &self,
        user: UserId,
        max_artworks: Option<usize>,
    ) -> Result<Tour> {
        self.tours.personalized_tour(user, max_artworks).await
    }

    pub async fn track_interaction(
        &self,
        interaction: NewInteraction,
    ) -> Result<(BehaviorEvent, bool)> {
        self.tracker.track(interaction).await
    }

    /// Replaces the user's stored snapshot with a fresh blended list.
    ///
    /// A degraded blend leaves the existing snapshot untouched.
    pub async fn materialize_recommendations(
        &self,
        user: UserId,
        limit: usize,
        ttl: Option<Duration>,
    ) -> Result<Vec<Recommendation>> {
        let items = match self.blender.blend(user, limit).await {
            RecommendationOutcome::Ready(items) => items,
            RecommendationOutcome::Degraded { reason } => {
                return Err(AppError::Internal(format!(
                    "recommendations unavailable: {}",
                    reason
                )));
            }
        };

        let rows = to_recommendations(user, &items, Utc::now(), ttl);
        self.store.replace_recommendations(user, &rows).await?;
        Ok(rows)
    }
}

async fn run_single(
    recommender: &dyn Recommender,
    user: UserId,
    limit: usize,
) -> RecommendationOutcome {
    match recommender.recommend(user, limit).await {
        Ok(items) => RecommendationOutcome::Ready(items),
        Err(e) => {
            error!(
                user_id = user,
                source = recommender.source().as_str(),
                error = %e,
                "Recommendation failed"
            );
            RecommendationOutcome::Degraded {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artwork, InteractionKind, Vec3};
    use crate::store::{InMemoryStore, MockCatalogStore, StaticCurationPolicy};

    fn engine(store: Arc<dyn CatalogStore>) -> RecommendationEngine {
        RecommendationEngine::new(
            store,
            Arc::new(StaticCurationPolicy::new([1])),
            EngineConfig::default(),
        )
    }

    async fn store_with(ids: &[(i64, Option<&str>)]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for (id, style) in ids {
            let artwork = Artwork::new(*id, format!("A{}", id));
            let artwork = match style {
                Some(style) => artwork.with_style(*style),
                None => artwork,
            };
            store.insert_artwork(artwork).await;
        }
        store
    }

    #[tokio::test]
    async fn test_store_failure_degrades_recommendations() {
        let mut store = MockCatalogStore::new();
        store
            .expect_get_user_favorites()
            .returning(|_| Err(AppError::Database("gone".to_string())));
        store
            .expect_get_user_similarities()
            .returning(|_, _| Err(AppError::Database("gone".to_string())));
        let engine = engine(Arc::new(store));

        assert!(engine.content_based_recommendations(1, 10).await.is_degraded());
        assert!(engine.collaborative_recommendations(1, 10).await.is_degraded());
        let blended = engine.personalized_recommendations(1, 10).await;
        assert!(blended.is_degraded());
        assert!(blended.into_items().is_empty());
    }

    #[tokio::test]
    async fn test_cold_user_is_ready_but_empty() {
        let engine = engine(store_with(&[(1, Some("a"))]).await);
        let outcome = engine.personalized_recommendations(5, 10).await;
        assert_eq!(outcome, RecommendationOutcome::Ready(Vec::new()));
    }

    #[tokio::test]
    async fn test_optimize_placement_validation() {
        let engine = engine(store_with(&[(1, None)]).await);

        let empty = engine.optimize_placement(&[], Some(300.0), Some(200.0), false).await;
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let bad_room = engine.optimize_placement(&[1], Some(0.0), Some(200.0), false).await;
        assert!(matches!(bad_room, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_optimize_placement_keeps_request_order() {
        let engine = engine(store_with(&[(1, None), (2, None), (3, None), (4, None)]).await);

        let placements = engine
            .optimize_placement(&[4, 2, 99, 2, 1, 3], Some(300.0), Some(200.0), false)
            .await
            .unwrap();

        let ids: Vec<i64> = placements.iter().map(|p| p.artwork_id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
        assert!((placements[0].position.x - 100.0).abs() < 1e-9);
        assert!((placements[3].position.y - 400.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_optimize_placement_default_room() {
        let engine = engine(store_with(&[(1, None), (2, None)]).await);

        let placements = engine
            .optimize_placement(&[1], None, None, false)
            .await
            .unwrap();
        assert_eq!(placements[0].position, Vec3::on_floor(500.0, 400.0));

        let placements = engine
            .optimize_placement(&[1, 2], Some(300.0), None, false)
            .await
            .unwrap();
        assert_eq!(placements[0].position, Vec3::on_floor(100.0, 400.0));
        assert_eq!(placements[1].position, Vec3::on_floor(200.0, 400.0));
    }

    #[tokio::test]
    async fn test_grouped_placement_labels() {
        let engine = engine(store_with(&[(1, Some("a")), (2, None)]).await);

        let placements = engine
            .optimize_placement(&[1, 2], Some(300.0), Some(200.0), true)
            .await
            .unwrap();

        assert_eq!(placements[0].group.as_deref(), Some("a"));
        assert_eq!(placements[1].group.as_deref(), Some("unknown"));
        assert_eq!(placements[0].position, Vec3::on_floor(100.0, 100.0));
    }

    #[tokio::test]
    async fn test_save_layout_requires_curator() {
        let store = store_with(&[(1, None)]).await;
        let engine = engine(store.clone());
        let placements = vec![Placement::at(1, Vec3::on_floor(10.0, 10.0))];

        let denied = engine.save_layout(2, "room-1", &placements).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));
        assert!(store.layout("room-1").await.is_none());

        engine.save_layout(1, "room-1", &placements).await.unwrap();
        assert_eq!(store.layout("room-1").await, Some(placements));
    }

    #[tokio::test]
    async fn test_save_layout_rejects_bad_scale() {
        let engine = engine(store_with(&[(1, None)]).await);
        let mut placement = Placement::at(1, Vec3::on_floor(10.0, 10.0));
        placement.scale = 0.0;

        let result = engine.save_layout(1, "room-1", &[placement]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_materialize_replaces_snapshot() {
        let store = store_with(&[(1, Some("pop")), (2, Some("pop")), (3, Some("op"))]).await;
        store.add_favorite(7, 1).await;
        store.record(7, 1, InteractionKind::Favorite).await;
        let engine = engine(store.clone());

        let rows = engine
            .materialize_recommendations(7, 10, Some(Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].artwork_id, 2);
        assert_eq!(rows[0].algorithm, "content_based");
        assert_eq!(store.recommendations_for(7).await, rows);

        // A second run overwrites rather than appends
        engine.materialize_recommendations(7, 10, None).await.unwrap();
        assert_eq!(store.recommendations_for(7).await.len(), 1);
    }
}
