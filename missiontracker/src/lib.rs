//! Mission Tracker - location, offline map and hazard coordination for
//! live-action role-play missions.
//!
//! The library holds the coordination engines behind the tracker app:
//!
//! - [`publish`]: rate-limited publishing of the player's position to the
//!   shared document store
//! - [`offline`]: keeping cached map regions in line with active missions
//! - [`radiation`]: radiation area geometry and the live hazard warning
//!
//! The document store and tile cache are reached through traits
//! ([`publish::WriteGateway`], [`offline::RegionStore`]); in-memory
//! implementations ship alongside for tests and the simulator.

pub mod config;
pub mod flight;
pub mod geo;
pub mod logging;
pub mod mission;
pub mod offline;
pub mod publish;
pub mod radiation;
