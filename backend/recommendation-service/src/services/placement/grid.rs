use super::RoomBounds;
use crate::models::{Artwork, Placement, Vec3};

/// `count` evenly spaced points, row-major.
///
/// cols = ceil(sqrt(count)), rows = ceil(count / cols); point i sits at
/// (W/(cols+1) * (col+1), H/(rows+1) * (row+1)).
pub(super) fn grid_points(count: usize, room: RoomBounds) -> Vec<(f64, f64)> {
    if count == 0 {
        return Vec::new();
    }

    let cols = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);

    let spacing_x = room.width() / (cols + 1) as f64;
    let spacing_y = room.height() / (rows + 1) as f64;

    (0..count)
        .map(|i| {
            let row = i / cols;
            let col = i % cols;
            (spacing_x * (col + 1) as f64, spacing_y * (row + 1) as f64)
        })
        .collect()
}

pub fn place_grid(artworks: &[Artwork], room: RoomBounds) -> Vec<Placement> {
    artworks
        .iter()
        .zip(grid_points(artworks.len(), room))
        .map(|(artwork, (x, y))| Placement::at(artwork.id, Vec3::on_floor(x, y)))
        .collect()
}
