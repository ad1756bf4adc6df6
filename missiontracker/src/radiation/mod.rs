//! Radiation hazard evaluation.
//!
//! A mission may define circular radiation areas. This module answers two
//! questions about them:
//!
//! - **Is a player inside one?** [`contains`] uses the ellipsoidal distance,
//!   and [`max_intensity`] folds that over a snapshot of areas to drive the
//!   hazard warning.
//! - **What does it look like on the map?** [`tessellate`] produces a 64-gon
//!   using a local equirectangular approximation, and [`HazardTier`] maps
//!   intensity to a display colour.
//!
//! The polygon is only drawn, never tested against.
//!
//! [`HazardMonitor`] keeps the warning value current as area snapshots and
//! positions arrive.

mod area;
mod monitor;

pub use area::{
    contains, max_intensity, tessellate, HazardTier, RadiationArea, METERS_PER_DEGREE_LAT,
    METERS_PER_DEGREE_LON, POLYGON_VERTICES,
};
pub use monitor::HazardMonitor;
