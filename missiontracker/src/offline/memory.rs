//! In-memory region store.
//!
//! Stands in for the tile cache in tests and the simulator. Every command
//! is logged so tests can assert exactly what a pass issued.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;

use super::store::{
    CompletionStatus, DownloadState, OfflineRegionHandle, RegionDefinition, RegionId,
    RegionStatus, RegionStore, StoreError,
};
use crate::flight::BoxFuture;
use crate::geo::BoundingBox;

/// A mutating command observed by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    Create(BoundingBox),
    SetActive(RegionId, bool),
    Delete(RegionId),
}

struct StoredRegion {
    definition: RegionDefinition,
    download_state: DownloadState,
    completion: CompletionStatus,
}

#[derive(Default)]
struct StoreState {
    next_id: u64,
    regions: BTreeMap<RegionId, StoredRegion>,
    commands: Vec<StoreCommand>,
    fail_listing: bool,
    fail_creates: u32,
    fail_deletes: u32,
    fail_activations: u32,
    fail_status: u32,
    tile_limit: Option<u64>,
}

impl StoreState {
    fn insert(&mut self, definition: RegionDefinition, completion: CompletionStatus) -> RegionId {
        self.next_id += 1;
        let id = RegionId(self.next_id);
        self.regions.insert(
            id,
            StoredRegion {
                definition,
                download_state: DownloadState::Inactive,
                completion,
            },
        );
        id
    }
}

fn take_failure(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

/// Tile cache double with scripted failures and latency.
pub struct InMemoryRegionStore {
    state: Mutex<StoreState>,
    latency: Duration,
}

impl Default for InMemoryRegionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegionStore {
    /// Create an empty store with no latency.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject creates that would take the cache past `limit` tiles.
    pub fn with_tile_limit(self, limit: u64) -> Self {
        self.state.lock().tile_limit = Some(limit);
        self
    }

    /// Add an existing region without logging a command.
    pub fn seed(&self, definition: RegionDefinition, complete: bool) -> RegionId {
        let completion = if complete {
            CompletionStatus::Complete
        } else {
            CompletionStatus::Incomplete
        };
        self.state.lock().insert(definition, completion)
    }

    /// Make the initial listing fail.
    pub fn fail_listing(&self, fail: bool) {
        self.state.lock().fail_listing = fail;
    }

    /// Fail the next `count` creates.
    pub fn fail_next_creates(&self, count: u32) {
        self.state.lock().fail_creates = count;
    }

    /// Fail the next `count` deletes.
    pub fn fail_next_deletes(&self, count: u32) {
        self.state.lock().fail_deletes = count;
    }

    /// Fail the next `count` activations.
    pub fn fail_next_activations(&self, count: u32) {
        self.state.lock().fail_activations = count;
    }

    /// Fail the next `count` status queries.
    pub fn fail_next_status(&self, count: u32) {
        self.state.lock().fail_status = count;
    }

    /// Finish the download of one region. Returns `false` if it is unknown.
    pub fn mark_complete(&self, id: RegionId) -> bool {
        match self.state.lock().regions.get_mut(&id) {
            Some(region) => {
                region.completion = CompletionStatus::Complete;
                true
            }
            None => false,
        }
    }

    /// Finish the download of every active region.
    pub fn complete_active(&self) {
        for region in self.state.lock().regions.values_mut() {
            if region.download_state == DownloadState::Active {
                region.completion = CompletionStatus::Complete;
            }
        }
    }

    /// Bounds of every stored region.
    pub fn region_bounds(&self) -> HashSet<BoundingBox> {
        self.state
            .lock()
            .regions
            .values()
            .map(|region| region.definition.bounds)
            .collect()
    }

    /// Bounds of regions currently downloading.
    pub fn active_bounds(&self) -> HashSet<BoundingBox> {
        self.state
            .lock()
            .regions
            .values()
            .filter(|region| region.download_state == DownloadState::Active)
            .map(|region| region.definition.bounds)
            .collect()
    }

    /// Commands observed so far, in order.
    pub fn commands(&self) -> Vec<StoreCommand> {
        self.state.lock().commands.clone()
    }

    /// Forget logged commands.
    pub fn clear_commands(&self) {
        self.state.lock().commands.clear();
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl RegionStore for InMemoryRegionStore {
    fn list_all(&self) -> BoxFuture<'_, Result<Vec<OfflineRegionHandle>, StoreError>> {
        Box::pin(async move {
            self.delay().await;
            let state = self.state.lock();
            if state.fail_listing {
                return Err(StoreError::Unavailable("listing failed".to_string()));
            }
            Ok(state
                .regions
                .iter()
                .map(|(id, region)| OfflineRegionHandle {
                    id: *id,
                    definition: region.definition.clone(),
                })
                .collect())
        })
    }

    fn create(
        &self,
        definition: RegionDefinition,
    ) -> BoxFuture<'_, Result<OfflineRegionHandle, StoreError>> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state.lock();
            state.commands.push(StoreCommand::Create(definition.bounds));
            if take_failure(&mut state.fail_creates) {
                return Err(StoreError::Unavailable("create failed".to_string()));
            }
            if let Some(limit) = state.tile_limit {
                let cached: u64 = state
                    .regions
                    .values()
                    .map(|region| region.definition.tile_count())
                    .sum();
                if cached + definition.tile_count() > limit {
                    return Err(StoreError::TileLimitExceeded { limit });
                }
            }
            let id = state.insert(definition.clone(), CompletionStatus::Incomplete);
            Ok(OfflineRegionHandle { id, definition })
        })
    }

    fn set_active(
        &self,
        region: &OfflineRegionHandle,
        active: bool,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let id = region.id;
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state.lock();
            state.commands.push(StoreCommand::SetActive(id, active));
            if take_failure(&mut state.fail_activations) {
                return Err(StoreError::Unavailable("activation failed".to_string()));
            }
            let stored = state
                .regions
                .get_mut(&id)
                .ok_or(StoreError::UnknownRegion(id))?;
            stored.download_state = if active {
                DownloadState::Active
            } else {
                DownloadState::Inactive
            };
            Ok(())
        })
    }

    fn delete(&self, region: &OfflineRegionHandle) -> BoxFuture<'_, Result<(), StoreError>> {
        let id = region.id;
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state.lock();
            state.commands.push(StoreCommand::Delete(id));
            if take_failure(&mut state.fail_deletes) {
                return Err(StoreError::Unavailable("delete failed".to_string()));
            }
            state
                .regions
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::UnknownRegion(id))
        })
    }

    fn status(
        &self,
        region: &OfflineRegionHandle,
    ) -> BoxFuture<'_, Result<RegionStatus, StoreError>> {
        let id = region.id;
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state.lock();
            if take_failure(&mut state.fail_status) {
                return Err(StoreError::Unavailable("status query failed".to_string()));
            }
            let stored = state.regions.get(&id).ok_or(StoreError::UnknownRegion(id))?;
            Ok(RegionStatus {
                download_state: stored.download_state,
                completion: stored.completion,
                last_error: None,
            })
        })
    }
}
