//! Radiation area geometry.

use std::f64::consts::PI;

use serde_json::{json, Value};

use crate::geo::{distance_meters, GeoPoint};

/// Number of distinct vertices in a tessellated footprint.
pub const POLYGON_VERTICES: usize = 64;

/// Metres per degree of latitude used for rendering offsets.
pub const METERS_PER_DEGREE_LAT: f64 = 110_574.0;

/// Metres per degree of longitude at the equator used for rendering offsets.
pub const METERS_PER_DEGREE_LON: f64 = 111_320.0;

/// A circular radiation hazard.
///
/// Snapshots are immutable; a new collection snapshot replaces the whole list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiationArea {
    /// Centre of the footprint.
    pub center: GeoPoint,
    /// Radius in metres.
    pub radius_meters: f64,
    /// Hazard intensity (1 = low, >2 = severe).
    pub intensity: f64,
}

impl RadiationArea {
    /// Create a new radiation area.
    pub fn new(center: GeoPoint, radius_meters: f64, intensity: f64) -> Self {
        Self {
            center,
            radius_meters,
            intensity,
        }
    }

    /// Display tier for this area's intensity.
    pub fn tier(&self) -> HazardTier {
        HazardTier::from_intensity(self.intensity)
    }

    /// GeoJSON `Feature` for the map layer: the tessellated polygon with a
    /// `color` property.
    pub fn to_feature(&self) -> Value {
        let ring: Vec<[f64; 2]> = tessellate(self)
            .iter()
            .map(|p| [p.longitude, p.latitude])
            .collect();

        json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [ring],
            },
            "properties": {
                "color": self.tier().color_hex(),
            },
        })
    }
}

/// Whether `point` lies within the area's footprint.
///
/// The boundary is inclusive: a point exactly `radius_meters` away is inside.
pub fn contains(area: &RadiationArea, point: GeoPoint) -> bool {
    distance_meters(area.center, point) <= area.radius_meters
}

/// Highest intensity among the areas containing `point`.
///
/// Returns `None` when the position is unknown or no area contains it.
pub fn max_intensity(areas: &[RadiationArea], point: Option<GeoPoint>) -> Option<f64> {
    let point = point?;
    areas
        .iter()
        .filter(|area| contains(area, point))
        .map(|area| area.intensity)
        .fold(None, |max, intensity| match max {
            Some(m) if m >= intensity => Some(m),
            _ => Some(intensity),
        })
}

/// Closed polygon approximating the footprint for rendering.
///
/// Returns `POLYGON_VERTICES + 1` points; the last repeats the first.
pub fn tessellate(area: &RadiationArea) -> Vec<GeoPoint> {
    let center = area.center;
    let distance_lat = area.radius_meters / METERS_PER_DEGREE_LAT;
    let distance_lon =
        area.radius_meters / METERS_PER_DEGREE_LON / center.latitude_radians().cos();
    let angle_step = 2.0 * PI / POLYGON_VERTICES as f64;

    let mut vertices = Vec::with_capacity(POLYGON_VERTICES + 1);
    for i in 0..POLYGON_VERTICES {
        let angle = angle_step * i as f64;
        vertices.push(GeoPoint::new(
            center.latitude + distance_lat * angle.sin(),
            center.longitude + distance_lon * angle.cos(),
        ));
    }
    vertices.push(vertices[0]);
    vertices
}

/// Three-tier display scale for hazard intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardTier {
    /// Intensity up to 1.
    Amber,
    /// Intensity above 1, up to 2.
    Orange,
    /// Intensity above 2.
    Red,
}

impl HazardTier {
    /// Classify an intensity value.
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity <= 1.0 {
            HazardTier::Amber
        } else if intensity <= 2.0 {
            HazardTier::Orange
        } else {
            HazardTier::Red
        }
    }

    /// Fill colour as `#RRGGBB`.
    pub fn color_hex(&self) -> &'static str {
        match self {
            HazardTier::Amber => "#FFA500",
            HazardTier::Orange => "#FF7700",
            HazardTier::Red => "#FF0000",
        }
    }

    /// Short name for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardTier::Amber => "amber",
            HazardTier::Orange => "orange",
            HazardTier::Red => "red",
        }
    }
}

impl std::fmt::Display for HazardTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn origin_area() -> RadiationArea {
        RadiationArea::new(GeoPoint::new(0.0, 0.0), 1000.0, 1.5)
    }

    #[test]
    fn test_contains_point_inside_radius() {
        // ~995 m north of the centre
        assert!(contains(&origin_area(), GeoPoint::new(0.009, 0.0)));
    }

    #[test]
    fn test_contains_point_outside_radius() {
        // ~2211 m north of the centre
        assert!(!contains(&origin_area(), GeoPoint::new(0.02, 0.0)));
    }

    #[test]
    fn test_contains_boundary_is_inclusive() {
        let center = GeoPoint::new(60.17, 24.94);
        let edge = GeoPoint::new(60.175, 24.95);
        let area = RadiationArea::new(center, distance_meters(center, edge), 1.0);
        assert!(contains(&area, edge));
    }

    #[test]
    fn test_max_intensity_single_area() {
        let areas = [origin_area()];
        assert_eq!(max_intensity(&areas, Some(GeoPoint::new(0.009, 0.0))), Some(1.5));
        assert_eq!(max_intensity(&areas, Some(GeoPoint::new(0.02, 0.0))), None);
    }

    #[test]
    fn test_max_intensity_picks_highest_containing_area() {
        let areas = [
            RadiationArea::new(GeoPoint::new(0.0, 0.0), 5000.0, 1.0),
            RadiationArea::new(GeoPoint::new(0.001, 0.0), 500.0, 3.0),
            RadiationArea::new(GeoPoint::new(1.0, 1.0), 500.0, 9.0),
        ];
        assert_eq!(max_intensity(&areas, Some(GeoPoint::new(0.0, 0.0))), Some(3.0));
    }

    #[test]
    fn test_max_intensity_unknown_position() {
        assert_eq!(max_intensity(&[origin_area()], None), None);
    }

    #[test]
    fn test_tessellate_closes_ring() {
        let polygon = tessellate(&origin_area());
        assert_eq!(polygon.len(), POLYGON_VERTICES + 1);
        assert_eq!(polygon.first(), polygon.last());
    }

    #[test]
    fn test_tessellate_first_vertex_is_east() {
        let area = RadiationArea::new(GeoPoint::new(60.0, 25.0), 1000.0, 1.0);
        let polygon = tessellate(&area);
        // angle 0: no latitude offset, longitude widened by 1/cos(60°) = 2
        assert_eq!(polygon[0].latitude, 60.0);
        let expected_lon = 25.0 + 1000.0 / METERS_PER_DEGREE_LON * 2.0;
        assert!((polygon[0].longitude - expected_lon).abs() < 1e-9);
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(HazardTier::from_intensity(0.5), HazardTier::Amber);
        assert_eq!(HazardTier::from_intensity(1.0), HazardTier::Amber);
        assert_eq!(HazardTier::from_intensity(1.5), HazardTier::Orange);
        assert_eq!(HazardTier::from_intensity(2.0), HazardTier::Orange);
        assert_eq!(HazardTier::from_intensity(2.01), HazardTier::Red);
    }

    #[test]
    fn test_to_feature_carries_color_and_ring() {
        let feature = origin_area().to_feature();
        assert_eq!(feature["properties"]["color"], "#FF7700");
        let ring = feature["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), POLYGON_VERTICES + 1);
        assert_eq!(ring[0], ring[POLYGON_VERTICES]);
    }

    proptest! {
        #[test]
        fn prop_center_always_inside(
            lat in -80.0f64..80.0,
            lon in -179.0f64..179.0,
            radius in 10.0f64..10_000.0,
        ) {
            let area = RadiationArea::new(GeoPoint::new(lat, lon), radius, 1.0);
            prop_assert!(contains(&area, area.center));
        }

        #[test]
        fn prop_tessellated_vertices_near_radius(
            lat in -60.0f64..60.0,
            lon in -170.0f64..170.0,
            radius in 10.0f64..10_000.0,
        ) {
            let area = RadiationArea::new(GeoPoint::new(lat, lon), radius, 1.0);
            for vertex in tessellate(&area) {
                let d = distance_meters(area.center, vertex);
                // equirectangular approximation stays within a few percent
                prop_assert!((d - radius).abs() <= radius * 0.05, "d={} r={}", d, radius);
            }
        }
    }
}
