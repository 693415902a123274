use super::grid::grid_points;
use super::{LayoutError, RoomBounds};
use crate::config::PlacementConfig;
use crate::models::{Artwork, Placement, Vec3};
use std::f64::consts::PI;

/// Group label for artworks without a style.
pub const UNKNOWN_GROUP: &str = "unknown";

/// Groups by style, ordered by first occurrence. Members keep input order.
pub fn partition_by_style(artworks: &[Artwork]) -> Vec<(String, Vec<&Artwork>)> {
    let mut groups: Vec<(String, Vec<&Artwork>)> = Vec::new();

    for artwork in artworks {
        let label = artwork.style().unwrap_or(UNKNOWN_GROUP);
        match groups.iter_mut().find(|(key, _)| key == label) {
            Some((_, members)) => members.push(artwork),
            None => groups.push((label.to_string(), vec![artwork])),
        }
    }

    groups
}

fn anchors(groups: usize, room: RoomBounds) -> Vec<(f64, f64)> {
    let (w, h) = (room.width(), room.height());
    match groups {
        0 => Vec::new(),
        1 => vec![(w / 2.0, h / 2.0)],
        2 => vec![(w / 3.0, h / 2.0), (2.0 * w / 3.0, h / 2.0)],
        3 | 4 => [
            (w / 3.0, h / 3.0),
            (2.0 * w / 3.0, h / 3.0),
            (w / 3.0, 2.0 * h / 3.0),
            (2.0 * w / 3.0, 2.0 * h / 3.0),
        ]
        .into_iter()
        .take(groups)
        .collect(),
        _ => grid_points(groups, room),
    }
}

fn group_radius(
    size: usize,
    anchor: (f64, f64),
    room: RoomBounds,
    config: &PlacementConfig,
) -> f64 {
    (config.radius_per_member * (size as f64).sqrt())
        .min(config.max_group_radius)
        .min(room.wall_clearance(anchor.0, anchor.1))
}

pub fn place_grouped(
    artworks: &[Artwork],
    room: RoomBounds,
    config: &PlacementConfig,
) -> Result<Vec<Placement>, LayoutError> {
    let groups = partition_by_style(artworks);
    let centers = anchors(groups.len(), room);

    if centers.len() != groups.len() {
        return Err(LayoutError::AnchorMismatch {
            groups: groups.len(),
            anchors: centers.len(),
        });
    }

    let mut placements = Vec::with_capacity(artworks.len());

    for ((label, members), anchor) in groups.iter().zip(centers) {
        let size = members.len();
        let radius = group_radius(size, anchor, room, config);

        for (i, artwork) in members.iter().enumerate() {
            let (x, y) = if size == 1 {
                anchor
            } else {
                let angle = 2.0 * PI * i as f64 / size as f64;
                (anchor.0 + radius * angle.cos(), anchor.1 + radius * angle.sin())
            };

            let position = Vec3::on_floor(x, y);
            if !position.is_finite() {
                return Err(LayoutError::NonFinite {
                    artwork_id: artwork.id,
                });
            }
            if !room.contains(x, y) {
                return Err(LayoutError::OutOfBounds {
                    artwork_id: artwork.id,
                    x,
                    y,
                });
            }

            placements.push(Placement::at(artwork.id, position).in_group(label.as_str()));
        }
    }

    Ok(placements)
}
