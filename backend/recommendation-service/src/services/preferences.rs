use crate::error::Result;
use crate::models::{ArtworkId, InteractionKind, Tally, UserId, UserPreferences};
use crate::store::CatalogStore;
use std::collections::HashMap;
use tracing::debug;

fn bump(tally: &mut Tally, value: Option<&str>) {
    if let Some(value) = value {
        *tally.entry(value.to_string()).or_insert(0) += 1;
    }
}

/// Builds the preference snapshot of a user from profile data and the behavior log.
///
/// Every like/favorite event contributes its artwork's style, theme and color once,
/// so an artwork both liked and favorited counts twice.
pub async fn build_preferences(store: &dyn CatalogStore, user: UserId) -> Result<UserPreferences> {
    let favorite_artwork_ids = store.get_user_favorites(user).await?;
    let viewed_artwork_ids = store.get_user_viewed(user).await?;
    let search_terms = store.get_search_history(user).await?;

    let behaviors = store
        .get_behaviors(user, &InteractionKind::POSITIVE)
        .await?;

    let mut ids: Vec<ArtworkId> = behaviors.iter().map(|b| b.artwork_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let artworks: HashMap<ArtworkId, _> = store
        .get_artworks(&ids)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let mut preferences = UserPreferences {
        favorite_artwork_ids,
        viewed_artwork_ids,
        search_terms,
        ..Default::default()
    };

    for behavior in &behaviors {
        // Behaviors pointing at deleted artworks carry no attributes
        let Some(artwork) = artworks.get(&behavior.artwork_id) else {
            continue;
        };
        bump(&mut preferences.liked_styles, artwork.style());
        bump(&mut preferences.liked_themes, artwork.theme());
        bump(&mut preferences.liked_colors, artwork.primary_color());
    }

    debug!(
        user_id = user,
        favorites = preferences.favorite_artwork_ids.len(),
        viewed = preferences.viewed_artwork_ids.len(),
        liked_styles = preferences.liked_styles.len(),
        "Built user preferences"
    );

    Ok(preferences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Artwork;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_build_preferences() {
        let store = InMemoryStore::new();
        store
            .insert_artwork(
                Artwork::new(1, "Starry Night")
                    .with_style("post-impressionism")
                    .with_theme("night")
                    .with_primary_color("blue"),
            )
            .await;
        store
            .insert_artwork(Artwork::new(2, "Sunflowers").with_style("post-impressionism"))
            .await;
        store.insert_artwork(Artwork::new(3, "Guernica")).await;

        store.add_favorite(42, 2).await;
        store.add_favorite(42, 1).await;
        store.add_view(42, 3).await;
        store.add_search_term(42, "van gogh").await;
        store.record(42, 1, InteractionKind::Like).await;
        store.record(42, 1, InteractionKind::Favorite).await;
        store.record(42, 2, InteractionKind::Like).await;
        store.record(42, 3, InteractionKind::View).await;

        let prefs = build_preferences(&store, 42).await.unwrap();

        assert_eq!(prefs.favorite_artwork_ids, vec![2, 1]);
        assert!(prefs.viewed_artwork_ids.contains(&3));
        assert_eq!(prefs.search_terms, vec!["van gogh".to_string()]);
        assert_eq!(prefs.liked_styles["post-impressionism"], 3);
        assert_eq!(prefs.liked_themes["night"], 2);
        assert_eq!(prefs.liked_colors["blue"], 2);
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_preferences() {
        let store = InMemoryStore::new();
        let prefs = build_preferences(&store, 1).await.unwrap();
        assert_eq!(prefs, UserPreferences::default());
    }
}
