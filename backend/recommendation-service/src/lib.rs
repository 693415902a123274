pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use engine::{EngineConfig, RecommendationEngine};
pub use error::{AppError, Result};
pub use jobs::{BatchJobStats, SimilarityBatchJob};
pub use services::{
    CollaborativeRecommender, ContentBasedRecommender, PlacementMode, PlacementPlanner,
    RecommendationBlender, Recommender, RoomBounds,
};
pub use store::{CatalogStore, CurationPolicy, InMemoryStore, PgCatalogStore};
