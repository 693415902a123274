//! Spatial layout of artworks in a virtual room.
//!
//! Two modes:
//! - Grid: row-major fill in input order, evenly spaced
//! - Grouped: artworks sharing a style are clustered on a circle around an anchor
//!
//! Coordinates are in room units with the origin at a corner; every position lies
//! inside `[0, width] x [0, height]`.

mod grid;
mod grouped;

pub use grid::place_grid;
pub use grouped::{partition_by_style, place_grouped, UNKNOWN_GROUP};

use crate::config::PlacementConfig;
use crate::error::{AppError, Result};
use crate::models::{Artwork, ArtworkId, Placement};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    #[default]
    Grid,
    GroupedBySimilarity,
}

impl PlacementMode {
    pub fn from_grouping(group_by_similarity: bool) -> Self {
        if group_by_similarity {
            PlacementMode::GroupedBySimilarity
        } else {
            PlacementMode::Grid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomBounds {
    width: f64,
    height: f64,
}

impl RoomBounds {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(AppError::Validation(format!(
                "room dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }

    /// Distance from a point to the closest wall.
    pub fn wall_clearance(&self, x: f64, y: f64) -> f64 {
        x.min(self.width - x).min(y).min(self.height - y).max(0.0)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("{groups} groups but {anchors} anchors")]
    AnchorMismatch { groups: usize, anchors: usize },

    #[error("non-finite position for artwork {artwork_id}")]
    NonFinite { artwork_id: ArtworkId },

    #[error("artwork {artwork_id} placed outside the room at ({x}, {y})")]
    OutOfBounds { artwork_id: ArtworkId, x: f64, y: f64 },
}

/// Stateless planner; identical input yields identical output.
#[derive(Debug, Clone, Default)]
pub struct PlacementPlanner {
    config: PlacementConfig,
}

impl PlacementPlanner {
    pub fn new(config: PlacementConfig) -> Self {
        Self { config }
    }

    /// Missing dimensions fall back to the configured default room.
    pub fn room(&self, width: Option<f64>, height: Option<f64>) -> Result<RoomBounds> {
        RoomBounds::new(
            width.unwrap_or(self.config.default_room_width),
            height.unwrap_or(self.config.default_room_height),
        )
    }

    /// One placement per input artwork. Grouped mode falls back to grid on failure.
    pub fn place(
        &self,
        artworks: &[Artwork],
        room: RoomBounds,
        mode: PlacementMode,
    ) -> Vec<Placement> {
        match mode {
            PlacementMode::Grid => place_grid(artworks, room),
            PlacementMode::GroupedBySimilarity => {
                match place_grouped(artworks, room, &self.config) {
                    Ok(placements) => placements,
                    Err(e) => {
                        warn!(
                            artworks = artworks.len(),
                            error = %e,
                            "Grouped placement failed, falling back to grid"
                        );
                        place_grid(artworks, room)
                    }
                }
            }
        }
    }
}
