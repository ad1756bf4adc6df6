//! Offline map region reconciliation.
//!
//! The tile cache holds downloadable regions; the mission collection says
//! which areas should be available offline. [`RegionReconciler`] drives the
//! first toward the second:
//!
//! ```text
//!   desired bounds ──┐
//!                    ▼
//!             plan_pass(regions, desired)
//!                    │
//!        ┌───────────┼──────────────┐
//!        ▼           ▼              ▼
//!     delete      refresh         create
//!   (no match)  (activate if    (+ activate)
//!               incomplete)
//! ```
//!
//! Only one pass runs at a time; bounds arriving mid-pass trigger exactly one
//! follow-up pass. Failed creates and deletes are retried after
//! `retry_delay` or at the next pass, whichever comes first.

mod memory;
mod plan;
mod reconciler;
mod store;

pub use memory::{InMemoryRegionStore, StoreCommand};
pub use plan::{plan_pass, DesiredBoundsSet, PassPlan};
pub use reconciler::{
    OfflineConfig, ReconcilerStatus, RegionReconciler, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM,
    DEFAULT_PIXEL_RATIO, DEFAULT_RETRY_DELAY, DEFAULT_STYLE_URL,
};
pub use store::{
    CompletionStatus, DownloadState, OfflineRegionHandle, RegionDefinition, RegionId,
    RegionStatus, RegionStore, StoreError,
};
