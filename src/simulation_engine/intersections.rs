use crate::models::{IntersectionId, IntersectionState};

/// Intersections are laid out on a grid this many columns wide.
const GRID_COLUMNS: usize = 4;

/// Creates `count` intersections named "Intersection 1".."Intersection N"
/// with ids "intersection_1".."intersection_N", placed row by row on a grid.
pub fn create_intersections(count: usize, now: f64) -> Vec<IntersectionState> {
    (0..count)
        .map(|i| {
            let row = (i / GRID_COLUMNS) as f64;
            let col = (i % GRID_COLUMNS) as f64;
            IntersectionState::new(
                IntersectionId::new(format!("intersection_{}", i + 1)),
                format!("Intersection {}", i + 1),
                (row, col),
                now,
            )
        })
        .collect()
}
