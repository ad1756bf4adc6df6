//! Hazard command - evaluate radiation areas at a single position.

use std::path::{Path, PathBuf};

use missiontracker::geo::GeoPoint;
use missiontracker::mission::radiation_areas;
use missiontracker::radiation::{max_intensity, HazardTier, RadiationArea};
use serde_json::{json, Value};

use crate::error::CliError;

/// Arguments for the hazard command.
pub struct HazardArgs {
    pub latitude: f64,
    pub longitude: f64,
    pub areas: PathBuf,
    pub geojson: bool,
}

/// Run the hazard command.
pub fn run(args: HazardArgs) -> Result<(), CliError> {
    let position = GeoPoint::try_new(args.latitude, args.longitude)
        .map_err(|e| CliError::Input(e.to_string()))?;
    let areas = load_areas(&args.areas)?;

    if args.geojson {
        let features: Vec<Value> = areas.iter().map(RadiationArea::to_feature).collect();
        let collection = json!({ "type": "FeatureCollection", "features": features });
        println!("{:#}", collection);
        return Ok(());
    }

    println!("Position: {}", position);
    println!("Areas:    {}", areas.len());
    println!("Warning:  {}", describe(max_intensity(&areas, Some(position))));
    Ok(())
}

fn load_areas(path: &Path) -> Result<Vec<RadiationArea>, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::Input(format!("{}: {}", path.display(), e)))?;
    let docs: Vec<Value> = serde_json::from_str(&text)
        .map_err(|e| CliError::Input(format!("{}: {}", path.display(), e)))?;
    Ok(radiation_areas(&docs))
}

/// Human-readable warning line.
fn describe(intensity: Option<f64>) -> String {
    match intensity {
        Some(value) => format!("{} ({})", value, HazardTier::from_intensity(value)),
        None => "clear".to_string(),
    }
}
