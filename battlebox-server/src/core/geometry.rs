//! Cell Geometry
//!
//! Integer cell coordinates, inclusive cell volumes and free-form actor
//! locations. Volumes are stored with their corners as given and normalised on
//! every query, so callers may supply corners in any order.

use serde::{Serialize, Deserialize};

/// A single cell in the world grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl CellPos {
    /// Create a cell position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Translate by an offset.
    pub fn offset(self, by: CellPos) -> CellPos {
        CellPos::new(self.x + by.x, self.y + by.y, self.z + by.z)
    }

    /// Offset that moves `origin` onto `self`.
    pub fn delta_from(self, origin: CellPos) -> CellPos {
        CellPos::new(self.x - origin.x, self.y - origin.y, self.z - origin.z)
    }
}

/// Axis-aligned cell volume with inclusive bounds on all three axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// First corner.
    pub a: CellPos,
    /// Opposite corner.
    pub b: CellPos,
}

impl Volume {
    /// Create a volume from two unordered corners.
    pub const fn new(a: CellPos, b: CellPos) -> Self {
        Self { a, b }
    }

    /// Minimum corner.
    pub fn min(&self) -> CellPos {
        CellPos::new(
            self.a.x.min(self.b.x),
            self.a.y.min(self.b.y),
            self.a.z.min(self.b.z),
        )
    }

    /// Maximum corner.
    pub fn max(&self) -> CellPos {
        CellPos::new(
            self.a.x.max(self.b.x),
            self.a.y.max(self.b.y),
            self.a.z.max(self.b.z),
        )
    }

    /// Number of cells in the volume.
    pub fn cell_count(&self) -> u64 {
        let (min, max) = (self.min(), self.max());
        let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1) as u64;
        span(min.x, max.x) * span(min.y, max.y) * span(min.z, max.z)
    }

    /// Check whether a cell lies inside the volume.
    pub fn contains(&self, cell: CellPos) -> bool {
        let (min, max) = (self.min(), self.max());
        (min.x..=max.x).contains(&cell.x)
            && (min.y..=max.y).contains(&cell.y)
            && (min.z..=max.z).contains(&cell.z)
    }

    /// Translate both corners.
    pub fn translated(&self, by: CellPos) -> Volume {
        Volume::new(self.a.offset(by), self.b.offset(by))
    }

    /// Iterate every cell, x fastest, then z, then y.
    pub fn cells(&self) -> impl Iterator<Item = CellPos> {
        let (min, max) = (self.min(), self.max());
        (min.y..=max.y).flat_map(move |y| {
            (min.z..=max.z).flat_map(move |z| {
                (min.x..=max.x).map(move |x| CellPos::new(x, y, z))
            })
        })
    }
}

/// Free-form actor location (teleport target).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Horizontal facing, degrees.
    #[serde(default)]
    pub yaw: f32,
    /// Vertical facing, degrees.
    #[serde(default)]
    pub pitch: f32,
}

impl Location {
    /// Create a location facing yaw/pitch zero.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, yaw: 0.0, pitch: 0.0 }
    }

    /// Translate by a cell offset, keeping the facing.
    pub fn translated(&self, by: CellPos) -> Location {
        Location {
            x: self.x + f64::from(by.x),
            y: self.y + f64::from(by.y),
            z: self.z + f64::from(by.z),
            ..*self
        }
    }
}

/// A location qualified by the world it lives in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// World name.
    pub world: String,
    /// Position in that world.
    pub location: Location,
}
