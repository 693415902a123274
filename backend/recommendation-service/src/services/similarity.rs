//! Pairwise artwork similarity from categorical attributes and tag overlap.
//!
//! score = (matching attributes + tag jaccard) / compared factors
//!
//! An attribute only counts as a factor when both artworks carry it, so sparse
//! metadata is scored on whatever is present instead of being penalized.

use crate::models::{Artwork, ArtworkSimilarity, SimilarityType};
use serde_json::json;
use std::collections::BTreeSet;

pub const METADATA_ALGORITHM: &str = "attribute_overlap";

/// |A ∩ B| / |A ∪ B|, or 0 when both sets are empty.
pub fn jaccard<'a, T, A, B>(a: A, b: B) -> f64
where
    T: Ord + 'a,
    A: IntoIterator<Item = &'a T>,
    B: IntoIterator<Item = &'a T>,
{
    let a: BTreeSet<&T> = a.into_iter().collect();
    let b: BTreeSet<&T> = b.into_iter().collect();

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();

    intersection as f64 / union as f64
}

/// Per-factor breakdown of a similarity computation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimilarityBreakdown {
    pub style: Option<bool>,
    pub theme: Option<bool>,
    pub color: Option<bool>,
    pub tags: Option<f64>,
}

impl SimilarityBreakdown {
    pub fn factors(&self) -> usize {
        [self.style, self.theme, self.color]
            .iter()
            .filter(|f| f.is_some())
            .count()
            + usize::from(self.tags.is_some())
    }

    pub fn score(&self) -> f64 {
        let factors = self.factors();
        if factors == 0 {
            return 0.0;
        }

        let matches = [self.style, self.theme, self.color]
            .iter()
            .filter(|f| **f == Some(true))
            .count() as f64;
        let total = matches + self.tags.unwrap_or(0.0);

        (total / factors as f64).clamp(0.0, 1.0)
    }
}

fn compare_attribute(a: Option<&str>, b: Option<&str>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a == b),
        _ => None,
    }
}

pub fn breakdown(a: &Artwork, b: &Artwork) -> SimilarityBreakdown {
    let tags = if !a.tags.is_empty() && !b.tags.is_empty() {
        Some(jaccard(&a.tags, &b.tags))
    } else {
        None
    };

    SimilarityBreakdown {
        style: compare_attribute(a.style(), b.style()),
        theme: compare_attribute(a.theme(), b.theme()),
        color: compare_attribute(a.primary_color(), b.primary_color()),
        tags,
    }
}

/// Similarity of two artworks in [0, 1]. Symmetric and deterministic.
pub fn artwork_similarity(a: &Artwork, b: &Artwork) -> f64 {
    breakdown(a, b).score()
}

/// Cache row for a scored pair, stored with the smaller id first.
pub fn to_cached_similarity(a: &Artwork, b: &Artwork) -> ArtworkSimilarity {
    let detail = breakdown(a, b);
    let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };

    ArtworkSimilarity {
        artwork_a: first.id,
        artwork_b: second.id,
        score: detail.score(),
        algorithm: METADATA_ALGORITHM.to_string(),
        similarity_type: SimilarityType::Metadata,
        features: json!({
            "style": detail.style,
            "theme": detail.theme,
            "color": detail.color,
            "tags": detail.tags,
            "factors": detail.factors(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impressionist(id: i64) -> Artwork {
        Artwork::new(id, format!("Impression {}", id))
            .with_style("impressionism")
            .with_theme("landscape")
            .with_primary_color("blue")
            .with_tags(["water", "light", "garden"])
    }

    #[test]
    fn test_self_similarity_is_one() {
        let a = impressionist(1);
        assert_eq!(artwork_similarity(&a, &a), 1.0);

        let only_style = Artwork::new(2, "Sketch").with_style("cubism");
        assert_eq!(artwork_similarity(&only_style, &only_style), 1.0);
    }

    #[test]
    fn test_no_comparable_attributes_scores_zero() {
        let bare = Artwork::new(1, "Bare");
        let rich = impressionist(2);
        assert_eq!(artwork_similarity(&bare, &rich), 0.0);
        assert_eq!(artwork_similarity(&bare, &bare), 0.0);

        // Style on one side, theme on the other: nothing to compare
        let a = Artwork::new(3, "A").with_style("baroque");
        let b = Artwork::new(4, "B").with_theme("portrait");
        assert_eq!(artwork_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_missing_attributes_are_skipped_not_penalized() {
        let a = Artwork::new(1, "A").with_style("baroque").with_theme("portrait");
        let b = Artwork::new(2, "B").with_style("baroque");
        // Only style is comparable and it matches
        assert_eq!(artwork_similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_partial_match_with_tags() {
        let a = impressionist(1);
        let b = Artwork::new(2, "B")
            .with_style("impressionism")
            .with_theme("portrait")
            .with_primary_color("blue")
            .with_tags(["water", "night"]);
        // style 1 + theme 0 + color 1 + jaccard(1/4) over 4 factors
        let expected = (1.0 + 0.0 + 1.0 + 0.25) / 4.0;
        assert!((artwork_similarity(&a, &b) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_similarity_is_symmetric_and_bounded() {
        let artworks = vec![
            impressionist(1),
            Artwork::new(2, "B").with_style("cubism").with_tags(["face"]),
            Artwork::new(3, "C")
                .with_theme("landscape")
                .with_tags(["light", "hill"]),
            Artwork::new(4, "D").with_primary_color("blue"),
            Artwork::new(5, "E"),
        ];

        for a in &artworks {
            for b in &artworks {
                let ab = artwork_similarity(a, b);
                let ba = artwork_similarity(b, a);
                assert_eq!(ab, ba);
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn test_jaccard() {
        let a = [1, 2, 3];
        let b = [2, 3, 4];
        assert_eq!(jaccard(&a, &b), 0.5);
        let empty: [i32; 0] = [];
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn test_cached_similarity_is_canonical() {
        let a = impressionist(9);
        let b = impressionist(3);
        let row = to_cached_similarity(&a, &b);
        assert_eq!((row.artwork_a, row.artwork_b), (3, 9));
        assert_eq!(row.score, 1.0);
        assert_eq!(row.similarity_type, SimilarityType::Metadata);
        assert_eq!(row.features["factors"], serde_json::json!(4));
    }
}
