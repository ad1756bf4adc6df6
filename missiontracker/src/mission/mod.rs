//! Mission documents and the feeds derived from them.
//!
//! The document store holds one document per mission plus a `radiation`
//! sub-collection. This module decodes those documents into domain values
//! and exposes them as streams the engines can follow.

mod document;
mod feed;

pub use document::{
    current_mission, desired_bounds, mission_bounds, radiation_area, radiation_areas,
    DocumentError, CURRENT_MISSION_FIELD, STATE_DOCUMENT,
};
pub use feed::{
    current_mission_feed, watch_feed, DesiredBoundsFeed, MissionCollectionFeed,
    RadiationCollectionFeed, RadiationFeed,
};
