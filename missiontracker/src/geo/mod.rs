//! Geographic primitives shared by the engines.
//!
//! Provides the value types for positions and mission areas, plus the
//! ellipsoidal distance used wherever accuracy matters (hazard containment).
//! Rendering approximations live next to the types that need them.

mod distance;
mod types;

pub use distance::{distance_meters, WGS84_SEMI_MAJOR_AXIS, WGS84_SEMI_MINOR_AXIS};
pub use types::{BoundingBox, CoordError, GeoPoint, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
