//! Region store boundary.
//!
//! The tile cache service is an external collaborator. It owns the regions;
//! the reconciler only holds handles and issues commands through
//! [`RegionStore`].

use std::f64::consts::PI;
use std::fmt;

use thiserror::Error;

use crate::flight::BoxFuture;
use crate::geo::BoundingBox;

/// Identifier assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// What a region downloads: a tile pyramid over `bounds`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDefinition {
    /// Map style whose tiles are cached.
    pub style_url: String,
    /// Area covered.
    pub bounds: BoundingBox,
    /// Lowest zoom level cached.
    pub min_zoom: f64,
    /// Highest zoom level cached.
    pub max_zoom: f64,
    /// Device pixel ratio used to pick tile resolution.
    pub pixel_ratio: f32,
}

/// Latitude limit of the Web Mercator tile grid.
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Highest zoom level the tile grid is counted to.
const MAX_TILE_ZOOM: f64 = 22.0;

impl RegionDefinition {
    /// Number of Web Mercator tiles the region covers across its zoom range.
    pub fn tile_count(&self) -> u64 {
        let min = self.min_zoom.floor().clamp(0.0, MAX_TILE_ZOOM) as u32;
        let max = self.max_zoom.ceil().clamp(0.0, MAX_TILE_ZOOM) as u32;

        (min..=max)
            .map(|zoom| {
                let (west, north) = tile_index(self.bounds.north, self.bounds.west, zoom);
                let (east, south) = tile_index(self.bounds.south, self.bounds.east, zoom);
                (east.saturating_sub(west) + 1) * (south.saturating_sub(north) + 1)
            })
            .sum()
    }
}

/// Column and row of the tile containing a point.
fn tile_index(lat: f64, lon: f64, zoom: u32) -> (u64, u64) {
    let n = 2f64.powi(zoom as i32);
    let lat_rad = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
    let col = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, n - 1.0);
    let row = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
        .floor()
        .clamp(0.0, n - 1.0);
    (col as u64, row as u64)
}

/// Non-owning reference to a region held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineRegionHandle {
    /// Store-assigned id.
    pub id: RegionId,
    /// Definition the region was created with.
    pub definition: RegionDefinition,
}

impl OfflineRegionHandle {
    /// Bounds of the region definition.
    pub fn bounds(&self) -> BoundingBox {
        self.definition.bounds
    }
}

/// Whether the store is downloading tiles for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Inactive,
    Active,
}

/// Whether every tile of a region is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Incomplete,
    Complete,
}

/// Snapshot of a region's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStatus {
    pub download_state: DownloadState,
    pub completion: CompletionStatus,
    /// Last download error reported by the store, if any.
    pub last_error: Option<String>,
}

impl RegionStatus {
    /// Whether every tile is cached.
    pub fn is_complete(&self) -> bool {
        self.completion == CompletionStatus::Complete
    }
}

/// Errors reported by a region store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store's database could not be reached.
    #[error("Region store unavailable: {0}")]
    Unavailable(String),

    /// The region no longer exists in the store.
    #[error("Unknown region: {0}")]
    UnknownRegion(RegionId),

    /// Creating the region would take the cache past its tile limit.
    #[error("Tile count limit exceeded: {limit}")]
    TileLimitExceeded { limit: u64 },
}

/// Operations the reconciler needs from the tile cache.
///
/// # Dyn Compatibility
///
/// Methods return [`BoxFuture`] so the reconciler can hold an
/// `Arc<dyn RegionStore>`.
pub trait RegionStore: Send + Sync {
    /// List every region currently in the cache.
    fn list_all(&self) -> BoxFuture<'_, Result<Vec<OfflineRegionHandle>, StoreError>>;

    /// Create a region. The new region starts inactive.
    fn create(
        &self,
        definition: RegionDefinition,
    ) -> BoxFuture<'_, Result<OfflineRegionHandle, StoreError>>;

    /// Start or stop downloading tiles for a region. Idempotent.
    fn set_active(
        &self,
        region: &OfflineRegionHandle,
        active: bool,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Delete a region and its cached tiles.
    fn delete(&self, region: &OfflineRegionHandle) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Query a region's progress.
    fn status(&self, region: &OfflineRegionHandle) -> BoxFuture<'_, Result<RegionStatus, StoreError>>;
}
