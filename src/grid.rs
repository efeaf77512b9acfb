mod boxes;
mod cells;
mod coords;

/// Lon/lat bounding boxes.
pub use boxes::*;
/// H3 cell primitives.
pub use cells::*;
/// Coordinates.
pub use coords::*;
