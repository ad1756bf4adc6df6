//! Coordinate value types.
//!
//! Both types compare by exact value. They are used as set elements and map
//! keys, so `Eq`/`Hash` are implemented over the bit patterns of the
//! coordinates (with `-0.0` folded into `0.0` to stay consistent with `==`).
//! Coordinates are expected to be finite; [`GeoPoint::try_new`] and
//! [`BoundingBox::try_new`] enforce that for untrusted input.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors from validating coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside -90..=90 or not finite.
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside -180..=180 or not finite.
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// South edge lies north of the north edge.
    #[error("Inverted bounds: south {south} is north of {north}")]
    InvertedBounds { south: f64, north: f64 },
}

#[inline]
fn canonical_bits(value: f64) -> u64 {
    // -0.0 == 0.0, so they must hash alike
    if value == 0.0 {
        0.0_f64.to_bits()
    } else {
        value.to_bits()
    }
}

fn check_lat(lat: f64) -> Result<f64, CoordError> {
    if lat.is_finite() && (MIN_LAT..=MAX_LAT).contains(&lat) {
        Ok(lat)
    } else {
        Err(CoordError::InvalidLatitude(lat))
    }
}

fn check_lon(lon: f64) -> Result<f64, CoordError> {
    if lon.is_finite() && (MIN_LON..=MAX_LON).contains(&lon) {
        Ok(lon)
    } else {
        Err(CoordError::InvalidLongitude(lon))
    }
}

// =============================================================================
// GeoPoint
// =============================================================================

/// A WGS84 position in degrees.
///
/// Serializes as `{"latitude": .., "longitude": ..}`, the shape the document
/// store uses for its geo-point fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point without validation.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a point, rejecting non-finite or out-of-range coordinates.
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, CoordError> {
        Ok(Self {
            latitude: check_lat(latitude)?,
            longitude: check_lon(longitude)?,
        })
    }

    /// Latitude in radians.
    #[inline]
    pub fn latitude_radians(&self) -> f64 {
        self.latitude.to_radians()
    }

    /// Longitude in radians.
    #[inline]
    pub fn longitude_radians(&self) -> f64 {
        self.longitude.to_radians()
    }
}

impl Eq for GeoPoint {}

impl Hash for GeoPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_bits(self.latitude).hash(state);
        canonical_bits(self.longitude).hash(state);
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

// =============================================================================
// BoundingBox
// =============================================================================

/// A rectangular mission area, stored as its four edges in degrees.
///
/// Mission documents describe the area by its northwest and southeast
/// corners; [`BoundingBox::from_corners`] performs that mapping. Two boxes
/// are the same area only if all four edges are bit-for-bit equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge latitude.
    pub south: f64,
    /// Western edge longitude.
    pub west: f64,
    /// Northern edge latitude.
    pub north: f64,
    /// Eastern edge longitude.
    pub east: f64,
}

impl BoundingBox {
    /// Create a box from its edges without validation.
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Create a box from its edges, rejecting invalid coordinates.
    ///
    /// West may exceed east (an area spanning the antimeridian), but south
    /// may not exceed north.
    pub fn try_new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, CoordError> {
        let south = check_lat(south)?;
        let north = check_lat(north)?;
        if south > north {
            return Err(CoordError::InvertedBounds { south, north });
        }
        Ok(Self {
            south,
            west: check_lon(west)?,
            north,
            east: check_lon(east)?,
        })
    }

    /// Build a box from its northwest and southeast corners.
    pub fn from_corners(northwest: GeoPoint, southeast: GeoPoint) -> Result<Self, CoordError> {
        Self::try_new(
            southeast.latitude,
            northwest.longitude,
            northwest.latitude,
            southeast.longitude,
        )
    }

    /// The northwest corner.
    pub fn northwest(&self) -> GeoPoint {
        GeoPoint::new(self.north, self.west)
    }

    /// The southeast corner.
    pub fn southeast(&self) -> GeoPoint {
        GeoPoint::new(self.south, self.east)
    }
}

impl Eq for BoundingBox {}

impl Hash for BoundingBox {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_bits(self.south).hash(state);
        canonical_bits(self.west).hash(state);
        canonical_bits(self.north).hash(state);
        canonical_bits(self.east).hash(state);
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[S {:.5} W {:.5} N {:.5} E {:.5}]",
            self.south, self.west, self.north, self.east
        )
    }
}
