use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub recommendation: RecommendationConfig,
    pub placement: PlacementConfig,
    pub tour: TourConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Tunables of the content-based and collaborative recommenders.
///
/// The seed/candidate caps bound the work done per request; they trade recall for
/// latency and carry no meaning beyond that.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationConfig {
    /// Number of favorites (in stored order) used as content seeds
    pub favorite_seed_limit: usize,
    /// Catalog artworks compared against each seed
    pub candidates_per_favorite: usize,
    /// A candidate must score strictly above this to be kept
    pub min_content_similarity: f64,
    /// Precomputed similar users consulted by collaborative filtering
    pub similar_user_limit: usize,
    /// Multiplier applied to user similarity for secondhand likes
    pub collaborative_damping: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            favorite_seed_limit: 5,
            candidates_per_favorite: 20,
            min_content_similarity: 0.3,
            similar_user_limit: 5,
            collaborative_damping: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlacementConfig {
    pub default_room_width: f64,
    pub default_room_height: f64,
    /// Upper bound for the circle radius of a similarity group
    pub max_group_radius: f64,
    /// Radius grows as `radius_per_member * sqrt(group_size)` up to the bound
    pub radius_per_member: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            default_room_width: 1000.0,
            default_room_height: 800.0,
            max_group_radius: 100.0,
            radius_per_member: 50.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TourConfig {
    pub thematic_max_artworks: usize,
    pub personalized_max_artworks: usize,
    pub thematic_stop_secs: u32,
    pub personalized_stop_secs: u32,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            thematic_max_artworks: 15,
            personalized_max_artworks: 12,
            thematic_stop_secs: 120,
            personalized_stop_secs: 180,
        }
    }
}

/// Similarity batch job configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of users loaded per pass
    pub max_users: usize,
    /// Maximum number of catalog artworks compared pairwise
    pub max_catalog_artworks: usize,
    pub min_user_similarity: f64,
    pub min_artwork_similarity: f64,
    /// Size of the stored recommendation snapshot per user
    pub recommendations_per_user: usize,
    pub recommendation_ttl_secs: i64,
    /// Whether to run continuously or exit after one pass
    pub run_once: bool,
    /// Interval between full passes (if not run_once)
    pub interval_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_users: 5000,
            max_catalog_artworks: 2000,
            min_user_similarity: 0.1,
            min_artwork_similarity: 0.3,
            recommendations_per_user: 20,
            recommendation_ttl_secs: 3600 * 24,
            run_once: true,
            interval_secs: 3600 * 4, // 4 hours
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("recommendation.favorite_seed_limit", 5)?
            .set_default("recommendation.candidates_per_favorite", 20)?
            .set_default("recommendation.min_content_similarity", 0.3)?
            .set_default("recommendation.similar_user_limit", 5)?
            .set_default("recommendation.collaborative_damping", 0.8)?
            .set_default("placement.default_room_width", 1000.0)?
            .set_default("placement.default_room_height", 800.0)?
            .set_default("placement.max_group_radius", 100.0)?
            .set_default("placement.radius_per_member", 50.0)?
            .set_default("tour.thematic_max_artworks", 15)?
            .set_default("tour.personalized_max_artworks", 12)?
            .set_default("tour.thematic_stop_secs", 120)?
            .set_default("tour.personalized_stop_secs", 180)?
            .set_default("batch.max_users", 5000)?
            .set_default("batch.max_catalog_artworks", 2000)?
            .set_default("batch.min_user_similarity", 0.1)?
            .set_default("batch.min_artwork_similarity", 0.3)?
            .set_default("batch.recommendations_per_user", 20)?
            .set_default("batch.recommendation_ttl_secs", 86400)? // 1 day
            .set_default("batch.run_once", true)?
            .set_default("batch.interval_secs", 14400)? // 4 hours
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(anyhow!("Database URL is required"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("Database max connections must be greater than 0"));
        }

        self.recommendation.validate()?;

        let placement = &self.placement;
        if !(placement.default_room_width > 0.0 && placement.default_room_height > 0.0) {
            return Err(anyhow!("Default room dimensions must be positive"));
        }
        if placement.max_group_radius < 0.0 || placement.radius_per_member < 0.0 {
            return Err(anyhow!("Group radius settings must not be negative"));
        }

        if !(0.0..=1.0).contains(&self.batch.min_user_similarity)
            || !(0.0..=1.0).contains(&self.batch.min_artwork_similarity)
        {
            return Err(anyhow!("Batch similarity thresholds must be within [0, 1]"));
        }

        if self.batch.recommendation_ttl_secs <= 0 {
            return Err(anyhow!("Recommendation TTL must be greater than 0"));
        }

        Ok(())
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.favorite_seed_limit == 0 || self.candidates_per_favorite == 0 {
            return Err(anyhow!("Content-based seed and candidate limits must be > 0"));
        }

        if self.similar_user_limit == 0 {
            return Err(anyhow!("Similar user limit must be > 0"));
        }

        if !(0.0..=1.0).contains(&self.min_content_similarity) {
            return Err(anyhow!("Minimum content similarity must be within [0, 1]"));
        }

        // Keeps collaborative scores inside [0, 1]
        if !(0.0..=1.0).contains(&self.collaborative_damping) {
            return Err(anyhow!("Collaborative damping must be within [0, 1]"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://localhost/museum".to_string(),
                max_connections: 10,
            },
            recommendation: RecommendationConfig::default(),
            placement: PlacementConfig::default(),
            tour: TourConfig::default(),
            batch: BatchConfig::default(),
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_missing_database_url() {
        let mut config = test_config();
        config.database.url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_damping() {
        let mut config = test_config();
        config.recommendation.collaborative_damping = 1.5;
        assert!(config.validate().is_err());

        config.recommendation.collaborative_damping = 0.8;
        config.recommendation.favorite_seed_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_similar_user_limit() {
        let mut config = test_config();
        config.recommendation.similar_user_limit = 0;
        assert!(config.validate().is_err());
        assert!(config.recommendation.validate().is_err());
    }

    #[test]
    fn test_invalid_room_defaults() {
        let mut config = test_config();
        config.placement.default_room_width = 0.0;
        assert!(config.validate().is_err());
    }
}
