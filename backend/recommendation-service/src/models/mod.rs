use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub type ArtworkId = i64;
pub type UserId = i64;

/// Catalog artwork as seen by the recommendation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
    pub id: ArtworkId,
    pub title: String,
    pub description: Option<String>,
    pub style: Option<String>,
    pub theme: Option<String>,
    pub primary_color: Option<String>,
    pub tags: BTreeSet<String>,
    pub popularity: f64,
}

impl Artwork {
    pub fn new(id: ArtworkId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            style: None,
            theme: None,
            primary_color: None,
            tags: BTreeSet::new(),
            popularity: 0.0,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_primary_color(mut self, color: impl Into<String>) -> Self {
        self.primary_color = Some(color.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Style, ignoring blank values
    pub fn style(&self) -> Option<&str> {
        non_blank(&self.style)
    }

    pub fn theme(&self) -> Option<&str> {
        non_blank(&self.theme)
    }

    pub fn primary_color(&self) -> Option<&str> {
        non_blank(&self.primary_color)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Like,
    Favorite,
    Share,
    Comment,
    Purchase,
    Download,
}

impl InteractionKind {
    /// Kinds that count as an explicit positive signal.
    pub const POSITIVE: [InteractionKind; 2] = [InteractionKind::Like, InteractionKind::Favorite];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Like => "like",
            InteractionKind::Favorite => "favorite",
            InteractionKind::Share => "share",
            InteractionKind::Comment => "comment",
            InteractionKind::Purchase => "purchase",
            InteractionKind::Download => "download",
        }
    }

    pub fn is_positive(&self) -> bool {
        Self::POSITIVE.contains(self)
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(InteractionKind::View),
            "like" => Ok(InteractionKind::Like),
            "favorite" => Ok(InteractionKind::Favorite),
            "share" => Ok(InteractionKind::Share),
            "comment" => Ok(InteractionKind::Comment),
            "purchase" => Ok(InteractionKind::Purchase),
            "download" => Ok(InteractionKind::Download),
            other => Err(format!("unknown interaction kind: {}", other)),
        }
    }
}

/// One row of the behavior log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub id: i64,
    pub user_id: UserId,
    pub artwork_id: ArtworkId,
    pub kind: InteractionKind,
    pub timestamp: DateTime<Utc>,
    /// Seconds spent on the artwork
    pub duration_secs: i64,
    pub rating: Option<i16>,
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl BehaviorEvent {
    /// Folds a repeated interaction into this row: longest duration wins, a supplied
    /// rating replaces the old one, context keys are unioned (new values overwrite).
    pub fn merge(&mut self, interaction: &NewInteraction) {
        self.duration_secs = self.duration_secs.max(interaction.duration_secs);
        if let Some(rating) = interaction.rating {
            self.rating = Some(rating);
        }
        for (key, value) in &interaction.context {
            self.context.insert(key.clone(), value.clone());
        }
    }
}

/// Interaction reported by a client, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInteraction {
    pub user_id: UserId,
    pub artwork_id: ArtworkId,
    pub kind: InteractionKind,
    #[serde(default)]
    pub duration_secs: i64,
    #[serde(default)]
    pub rating: Option<i16>,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// Counted multiset of attribute values.
pub type Tally = HashMap<String, usize>;

/// Snapshot of what a user has shown interest in. Rebuilt on every call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPreferences {
    /// Ordered as stored, earliest added first
    pub favorite_artwork_ids: Vec<ArtworkId>,
    pub viewed_artwork_ids: HashSet<ArtworkId>,
    pub liked_styles: Tally,
    pub liked_themes: Tally,
    pub liked_colors: Tally,
    pub search_terms: Vec<String>,
}

/// Precomputed user-user similarity. Stored directed, meaning undirected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSimilarity {
    pub user_a: UserId,
    pub user_b: UserId,
    pub score: f64,
    pub algorithm: String,
    pub common_interactions: i32,
    pub features: serde_json::Value,
}

impl UserSimilarity {
    /// The user on the other side of the pair, if `user` is part of it.
    pub fn other(&self, user: UserId) -> Option<UserId> {
        if self.user_a == user {
            Some(self.user_b)
        } else if self.user_b == user {
            Some(self.user_a)
        } else {
            None
        }
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.user_a == user || self.user_b == user
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityType {
    Visual,
    Content,
    Style,
    Theme,
    Metadata,
}

impl SimilarityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityType::Visual => "visual",
            SimilarityType::Content => "content",
            SimilarityType::Style => "style",
            SimilarityType::Theme => "theme",
            SimilarityType::Metadata => "metadata",
        }
    }
}

/// Cached output of the similarity scorer for an artwork pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtworkSimilarity {
    pub artwork_a: ArtworkId,
    pub artwork_b: ArtworkId,
    pub score: f64,
    pub algorithm: String,
    pub similarity_type: SimilarityType,
    pub features: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    ContentBased,
    Collaborative,
    /// Recommended by more than one engine
    Hybrid,
}

impl RecommendationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationSource::ContentBased => "content_based",
            RecommendationSource::Collaborative => "collaborative",
            RecommendationSource::Hybrid => "hybrid",
        }
    }
}

/// A recommender's output entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredArtwork {
    pub artwork: Artwork,
    pub score: f64,
    pub reason: String,
    pub source: RecommendationSource,
}

/// Wire shape of a recommendation handed to the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub artwork_id: ArtworkId,
    pub title: String,
    pub score: f64,
    pub reason: String,
}

impl From<&ScoredArtwork> for RecommendationItem {
    fn from(scored: &ScoredArtwork) -> Self {
        Self {
            artwork_id: scored.artwork.id,
            title: scored.artwork.title.clone(),
            score: scored.score,
            reason: scored.reason.clone(),
        }
    }
}

/// Result of a recommendation call.
///
/// `Degraded` keeps "something failed" apart from "nothing matched"; both carry no
/// items.
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationOutcome {
    Ready(Vec<ScoredArtwork>),
    Degraded { reason: String },
}

impl RecommendationOutcome {
    pub fn items(&self) -> &[ScoredArtwork] {
        match self {
            RecommendationOutcome::Ready(items) => items,
            RecommendationOutcome::Degraded { .. } => &[],
        }
    }

    pub fn into_items(self) -> Vec<ScoredArtwork> {
        match self {
            RecommendationOutcome::Ready(items) => items,
            RecommendationOutcome::Degraded { .. } => Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RecommendationOutcome::Degraded { .. })
    }

    pub fn to_response(&self) -> Vec<RecommendationItem> {
        self.items().iter().map(RecommendationItem::from).collect()
    }
}

/// Persisted recommendation snapshot row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub user_id: UserId,
    pub artwork_id: ArtworkId,
    pub score: f64,
    pub algorithm: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Recommendation {
    pub fn from_scored(
        user_id: UserId,
        scored: &ScoredArtwork,
        algorithm: RecommendationSource,
        now: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            user_id,
            artwork_id: scored.artwork.id,
            score: scored.score.clamp(0.0, 1.0),
            algorithm: algorithm.as_str().to_string(),
            reason: scored.reason.clone(),
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            is_active: true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn on_floor(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Where an artwork hangs in a virtual room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub artwork_id: ArtworkId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Placement {
    pub fn at(artwork_id: ArtworkId, position: Vec3) -> Self {
        Self {
            artwork_id,
            position,
            rotation: Vec3::ZERO,
            scale: 1.0,
            group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourStop {
    pub order: usize,
    pub artwork_id: ArtworkId,
    pub title: String,
    pub description: String,
    pub estimated_secs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub theme: String,
    pub stops: Vec<TourStop>,
    pub total_secs: u32,
    pub artwork_count: usize,
}

impl Tour {
    pub fn new(theme: impl Into<String>, stops: Vec<TourStop>) -> Self {
        let total_secs = stops.iter().map(|s| s.estimated_secs).sum();
        let artwork_count = stops.len();
        Self {
            theme: theme.into(),
            stops,
            total_secs,
            artwork_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_attributes_are_missing() {
        let artwork = Artwork::new(1, "Untitled").with_style("  ").with_theme("sea");
        assert_eq!(artwork.style(), None);
        assert_eq!(artwork.theme(), Some("sea"));
        assert_eq!(artwork.primary_color(), None);
    }

    #[test]
    fn test_interaction_kind_round_trip_str() {
        for kind in [
            InteractionKind::View,
            InteractionKind::Like,
            InteractionKind::Favorite,
            InteractionKind::Share,
            InteractionKind::Comment,
            InteractionKind::Purchase,
            InteractionKind::Download,
        ] {
            assert_eq!(kind.as_str().parse::<InteractionKind>(), Ok(kind));
        }
        assert!("poke".parse::<InteractionKind>().is_err());
        assert!(InteractionKind::Favorite.is_positive());
        assert!(!InteractionKind::View.is_positive());
    }

    #[test]
    fn test_behavior_merge() {
        let mut event = BehaviorEvent {
            id: 1,
            user_id: 7,
            artwork_id: 3,
            kind: InteractionKind::View,
            timestamp: Utc::now(),
            duration_secs: 40,
            rating: Some(2),
            context: json!({"source": "search", "query": "monet"})
                .as_object()
                .cloned()
                .unwrap(),
        };

        let repeat = NewInteraction {
            user_id: 7,
            artwork_id: 3,
            kind: InteractionKind::View,
            duration_secs: 25,
            rating: None,
            context: json!({"source": "tour"}).as_object().cloned().unwrap(),
        };
        event.merge(&repeat);

        assert_eq!(event.duration_secs, 40);
        assert_eq!(event.rating, Some(2));
        assert_eq!(event.context["source"], json!("tour"));
        assert_eq!(event.context["query"], json!("monet"));

        let rated = NewInteraction {
            duration_secs: 90,
            rating: Some(5),
            context: serde_json::Map::new(),
            ..repeat
        };
        event.merge(&rated);
        assert_eq!(event.duration_secs, 90);
        assert_eq!(event.rating, Some(5));
    }

    #[test]
    fn test_user_similarity_other_side() {
        let row = UserSimilarity {
            user_a: 1,
            user_b: 2,
            score: 0.5,
            algorithm: "jaccard_likes".to_string(),
            common_interactions: 3,
            features: json!({}),
        };
        assert_eq!(row.other(1), Some(2));
        assert_eq!(row.other(2), Some(1));
        assert_eq!(row.other(3), None);
    }

    #[test]
    fn test_recommendation_expiry() {
        let now = Utc::now();
        let scored = ScoredArtwork {
            artwork: Artwork::new(4, "Water Lilies"),
            score: 0.7,
            reason: "Similar to Haystacks".to_string(),
            source: RecommendationSource::ContentBased,
        };
        let rec = Recommendation::from_scored(
            9,
            &scored,
            RecommendationSource::Hybrid,
            now,
            Some(Duration::hours(1)),
        );
        assert_eq!(rec.algorithm, "hybrid");
        assert!(!rec.is_expired(now));
        assert!(rec.is_expired(now + Duration::hours(2)));
    }

    #[test]
    fn test_degraded_outcome_has_no_items() {
        let outcome = RecommendationOutcome::Degraded {
            reason: "store unavailable".to_string(),
        };
        assert!(outcome.is_degraded());
        assert!(outcome.items().is_empty());
        assert!(outcome.to_response().is_empty());
    }

    #[test]
    fn test_tour_totals() {
        let stops = (1..=3)
            .map(|i| TourStop {
                order: i,
                artwork_id: i as i64,
                title: format!("Artwork {}", i),
                description: String::new(),
                estimated_secs: 120,
                recommendation_score: None,
            })
            .collect();
        let tour = Tour::new("impressionism", stops);
        assert_eq!(tour.total_secs, 360);
        assert_eq!(tour.artwork_count, 3);
    }
}
