use super::RecommendationBlender;
use crate::config::TourConfig;
use crate::error::{AppError, Result};
use crate::models::{Artwork, RecommendationOutcome, Tour, TourStop, UserId};
use crate::store::CatalogStore;
use std::sync::Arc;
use tracing::{info, warn};

pub const PERSONALIZED_THEME: &str = "Personalized Recommendations";

const DESCRIPTION_PREVIEW_CHARS: usize = 100;

/// Builds guided tours: an ordered list of stops with estimated viewing time.
pub struct TourBuilder {
    store: Arc<dyn CatalogStore>,
    blender: Arc<RecommendationBlender>,
    config: TourConfig,
}

impl TourBuilder {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        blender: Arc<RecommendationBlender>,
        config: TourConfig,
    ) -> Self {
        Self {
            store,
            blender,
            config,
        }
    }

    /// Artworks whose theme, style or tags mention `theme`.
    ///
    /// With a user, artworks they have not viewed are preferred; if every match was
    /// already viewed the full match list is kept.
    pub async fn thematic_tour(
        &self,
        theme: &str,
        user: Option<UserId>,
        max_artworks: Option<usize>,
    ) -> Result<Tour> {
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(AppError::Validation("theme is required".to_string()));
        }
        let max = resolve_max(max_artworks, self.config.thematic_max_artworks)?;

        let mut artworks = self.store.search_artworks(theme, max).await?;

        if let Some(user) = user {
            let viewed = self.store.get_user_viewed(user).await?;
            let unseen: Vec<Artwork> = artworks
                .iter()
                .filter(|a| !viewed.contains(&a.id))
                .cloned()
                .collect();
            if !unseen.is_empty() {
                artworks = unseen;
            }
        }

        let stops = artworks
            .iter()
            .enumerate()
            .map(|(i, artwork)| TourStop {
                order: i + 1,
                artwork_id: artwork.id,
                title: artwork.title.clone(),
                description: explore_description(artwork),
                estimated_secs: self.config.thematic_stop_secs,
                recommendation_score: None,
            })
            .collect();

        let tour = Tour::new(theme, stops);
        info!(
            theme = %tour.theme,
            stops = tour.artwork_count,
            personalized = user.is_some(),
            "Built thematic tour"
        );
        Ok(tour)
    }

    /// A tour over the user's blended recommendations, best first.
    pub async fn personalized_tour(
        &self,
        user: UserId,
        max_artworks: Option<usize>,
    ) -> Result<Tour> {
        let max = resolve_max(max_artworks, self.config.personalized_max_artworks)?;

        let items = match self.blender.blend(user, max).await {
            RecommendationOutcome::Ready(items) => items,
            RecommendationOutcome::Degraded { reason } => {
                warn!(user_id = user, reason = %reason, "Cannot build personalized tour");
                return Err(AppError::Internal(format!(
                    "recommendations unavailable: {}",
                    reason
                )));
            }
        };

        let stops = items
            .iter()
            .enumerate()
            .map(|(i, item)| TourStop {
                order: i + 1,
                artwork_id: item.artwork.id,
                title: item.artwork.title.clone(),
                description: format!("Recommended for you: {}", item.reason),
                estimated_secs: self.config.personalized_stop_secs,
                recommendation_score: Some(item.score),
            })
            .collect();

        let tour = Tour::new(PERSONALIZED_THEME, stops);
        info!(
            user_id = user,
            stops = tour.artwork_count,
            "Built personalized tour"
        );
        Ok(tour)
    }
}

fn resolve_max(requested: Option<usize>, default: usize) -> Result<usize> {
    match requested {
        Some(0) => Err(AppError::Validation(
            "max_artworks must be positive".to_string(),
        )),
        Some(max) => Ok(max),
        None => Ok(default),
    }
}

fn explore_description(artwork: &Artwork) -> String {
    let preview: String = artwork
        .description
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(DESCRIPTION_PREVIEW_CHARS)
        .collect();
    format!("Explore {} - {}...", artwork.title, preview)
}
