//! Catalog, behavior log and similarity tables consumed by the engine.
//!
//! The engine never talks to a database directly; it reads a snapshot through
//! [`CatalogStore`]. [`PgCatalogStore`] backs production, [`InMemoryStore`] backs tests
//! and local runs.

mod memory;
mod postgres;

use crate::error::Result;
use crate::models::{
    Artwork, ArtworkId, ArtworkSimilarity, BehaviorEvent, InteractionKind, NewInteraction,
    Placement, Recommendation, UserId, UserSimilarity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

pub use memory::{InMemoryStore, StaticCurationPolicy};
pub use postgres::PgCatalogStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_artwork(&self, id: ArtworkId) -> Result<Option<Artwork>>;

    /// Artworks for the given ids, in catalog order. Unknown ids are skipped.
    async fn get_artworks(&self, ids: &[ArtworkId]) -> Result<Vec<Artwork>>;

    /// Catalog artworks not in `exclude`, store default order, at most `limit`.
    async fn list_artworks(&self, exclude: &HashSet<ArtworkId>, limit: usize)
        -> Result<Vec<Artwork>>;

    /// Artworks whose theme, style or a tag contains `term` (case-insensitive).
    async fn search_artworks(&self, term: &str, limit: usize) -> Result<Vec<Artwork>>;

    /// Favorites in the order they were added.
    async fn get_user_favorites(&self, user: UserId) -> Result<Vec<ArtworkId>>;

    async fn get_user_viewed(&self, user: UserId) -> Result<HashSet<ArtworkId>>;

    async fn get_search_history(&self, user: UserId) -> Result<Vec<String>>;

    async fn get_behaviors(
        &self,
        user: UserId,
        kinds: &[InteractionKind],
    ) -> Result<Vec<BehaviorEvent>>;

    /// Rows involving `user` on either side, highest score first.
    async fn get_user_similarities(&self, user: UserId, limit: usize)
        -> Result<Vec<UserSimilarity>>;

    async fn find_latest_behavior(
        &self,
        user: UserId,
        artwork: ArtworkId,
        kind: InteractionKind,
    ) -> Result<Option<BehaviorEvent>>;

    async fn insert_behavior(
        &self,
        interaction: &NewInteraction,
        at: DateTime<Utc>,
    ) -> Result<BehaviorEvent>;

    async fn update_behavior(&self, event: &BehaviorEvent) -> Result<()>;

    async fn list_users_with_interactions(
        &self,
        kinds: &[InteractionKind],
        limit: usize,
    ) -> Result<Vec<UserId>>;

    async fn upsert_user_similarity(&self, row: &UserSimilarity) -> Result<()>;

    async fn upsert_artwork_similarity(&self, row: &ArtworkSimilarity) -> Result<()>;

    /// Replaces the user's stored recommendation snapshot.
    async fn replace_recommendations(
        &self,
        user: UserId,
        recommendations: &[Recommendation],
    ) -> Result<()>;

    async fn save_layout(&self, resource: &str, placements: &[Placement]) -> Result<()>;
}

/// Permission check owned by the surrounding application.
#[async_trait]
pub trait CurationPolicy: Send + Sync {
    async fn can_curate(&self, user: UserId, resource: &str) -> bool;
}
