//! Decoding of mission and radiation documents.
//!
//! Documents are JSON objects. Geographic points are encoded as
//! `{"latitude": .., "longitude": ..}`.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::geo::{BoundingBox, CoordError, GeoPoint};
use crate::offline::DesiredBoundsSet;
use crate::radiation::RadiationArea;

/// Path of the game state document.
pub const STATE_DOCUMENT: &str = "missiondata/state";

/// Field of the state document naming the current mission document.
pub const CURRENT_MISSION_FIELD: &str = "current_mission";

/// Errors decoding a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    /// A required field is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape.
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Coordinates out of range.
    #[error("Invalid coordinates: {0}")]
    Coord(#[from] CoordError),
}

fn field<'a>(doc: &'a Value, name: &'static str) -> Result<&'a Value, DocumentError> {
    match doc.get(name) {
        None | Some(Value::Null) => Err(DocumentError::MissingField(name)),
        Some(value) => Ok(value),
    }
}

fn geo_point(doc: &Value, name: &'static str) -> Result<GeoPoint, DocumentError> {
    let point: GeoPoint =
        serde_json::from_value(field(doc, name)?.clone()).map_err(|e| {
            DocumentError::InvalidField {
                field: name,
                reason: e.to_string(),
            }
        })?;
    Ok(GeoPoint::try_new(point.latitude, point.longitude)?)
}

fn number(doc: &Value, name: &'static str) -> Result<f64, DocumentError> {
    field(doc, name)?
        .as_f64()
        .ok_or_else(|| DocumentError::InvalidField {
            field: name,
            reason: "not a number".to_string(),
        })
}

/// Bounds of a mission document from its `bounds_nw` and `bounds_se` corners.
pub fn mission_bounds(doc: &Value) -> Result<BoundingBox, DocumentError> {
    let nw = geo_point(doc, "bounds_nw")?;
    let se = geo_point(doc, "bounds_se")?;
    Ok(BoundingBox::from_corners(nw, se)?)
}

/// Desired bounds for a collection snapshot. Undecodable missions are skipped.
pub fn desired_bounds(docs: &[Value]) -> DesiredBoundsSet {
    docs.iter()
        .filter_map(|doc| match mission_bounds(doc) {
            Ok(bounds) => Some(bounds),
            Err(e) => {
                debug!(error = %e, "Skipping mission without bounds");
                None
            }
        })
        .collect()
}

/// Radiation area from a `center`/`radius`/`intensity` document.
pub fn radiation_area(doc: &Value) -> Result<RadiationArea, DocumentError> {
    let center = geo_point(doc, "center")?;
    let radius = number(doc, "radius")?;
    let intensity = number(doc, "intensity")?;
    if radius < 0.0 {
        return Err(DocumentError::InvalidField {
            field: "radius",
            reason: format!("negative radius {}", radius),
        });
    }
    Ok(RadiationArea::new(center, radius, intensity))
}

/// Radiation areas for a collection snapshot. Incomplete documents are skipped.
pub fn radiation_areas(docs: &[Value]) -> Vec<RadiationArea> {
    docs.iter()
        .filter_map(|doc| match radiation_area(doc) {
            Ok(area) => Some(area),
            Err(e) => {
                debug!(error = %e, "Skipping radiation document");
                None
            }
        })
        .collect()
}

/// Path of the current mission document named by the state document.
pub fn current_mission(state: &Value) -> Option<&str> {
    state.get(CURRENT_MISSION_FIELD)?.as_str()
}
