//! The offline region reconciler.
//!
//! # State Machine
//!
//! ```text
//! Loading --[listing ok]--> Ready <--[set_active(true)]--> Suspended
//! Loading --[listing failed]--> Failed (terminal)
//! ```
//!
//! Passes run only while Ready, with a known desired set, and never
//! overlap. A pass executes its plan sequentially: deletes, then status
//! refreshes, then creates.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::plan::{plan_pass, DesiredBoundsSet};
use super::store::{OfflineRegionHandle, RegionDefinition, RegionId, RegionStore, StoreError};
use crate::flight::{run_engine, BoxFuture, Engine, EngineMetrics, MetricsSnapshot};
use crate::geo::BoundingBox;
use crate::mission::DesiredBoundsFeed;

/// Default satellite style cached for offline play.
pub const DEFAULT_STYLE_URL: &str = "mapbox://styles/mapbox/satellite-v9";

/// Default lowest cached zoom level.
pub const DEFAULT_MIN_ZOOM: f64 = 0.0;

/// Default highest cached zoom level.
pub const DEFAULT_MAX_ZOOM: f64 = 18.0;

/// Default device pixel ratio.
pub const DEFAULT_PIXEL_RATIO: f32 = 1.0;

/// Default delay before retrying failed creates or deletes.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Configuration for offline region management.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineConfig {
    /// Whether reconciliation starts enabled.
    pub enabled: bool,
    /// Map style whose tiles are cached.
    pub style_url: String,
    /// Lowest cached zoom level.
    pub min_zoom: f64,
    /// Highest cached zoom level.
    pub max_zoom: f64,
    /// Device pixel ratio.
    pub pixel_ratio: f32,
    /// Delay before a pass that left failed creates or deletes is repeated.
    ///
    /// This timer is in addition to the demand-driven retry: any new desired
    /// set or re-enable already re-attempts every outstanding mismatch.
    pub retry_delay: Duration,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            style_url: DEFAULT_STYLE_URL.to_string(),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            pixel_ratio: DEFAULT_PIXEL_RATIO,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl OfflineConfig {
    /// Region definition covering `bounds` with this configuration.
    pub fn definition_for(&self, bounds: BoundingBox) -> RegionDefinition {
        RegionDefinition {
            style_url: self.style_url.clone(),
            bounds,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            pixel_ratio: self.pixel_ratio,
        }
    }
}

/// Observable reconciler state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilerStatus {
    /// Waiting for the initial region listing.
    Loading,
    /// Reconciling; `regions` is the number of regions currently tracked.
    Ready { regions: usize },
    /// Disabled by `set_active(false)`.
    Suspended,
    /// The initial listing failed; no further reconciliation happens.
    Failed,
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug)]
enum ReconcileEvent {
    RegionsListed(Result<Vec<OfflineRegionHandle>, StoreError>),
    DesiredChanged(DesiredBoundsSet),
    SetActive(bool),
}

struct PassOutcome {
    regions: Vec<OfflineRegionHandle>,
    failures: usize,
}

struct ReconcileEngine {
    config: OfflineConfig,
    store: Arc<dyn RegionStore>,
    metrics: Arc<EngineMetrics>,
    /// `None` until the initial listing completes.
    regions: Option<Vec<OfflineRegionHandle>>,
    /// `None` until the first desired-bounds snapshot arrives.
    desired: Option<DesiredBoundsSet>,
    active: bool,
    failed: bool,
    retry_at: Option<Instant>,
    status: watch::Sender<ReconcilerStatus>,
}

impl ReconcileEngine {
    fn publish_status(&self) {
        let status = if self.failed {
            ReconcilerStatus::Failed
        } else if !self.active {
            ReconcilerStatus::Suspended
        } else {
            match &self.regions {
                None => ReconcilerStatus::Loading,
                Some(regions) => ReconcilerStatus::Ready {
                    regions: regions.len(),
                },
            }
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

impl Engine for ReconcileEngine {
    type Event = ReconcileEvent;
    type Outcome = PassOutcome;

    fn name(&self) -> &'static str {
        "region-reconciler"
    }

    fn apply(&mut self, event: ReconcileEvent) -> bool {
        let demand = match event {
            ReconcileEvent::RegionsListed(Ok(regions)) => {
                info!(count = regions.len(), "Offline regions listed");
                self.regions = Some(regions);
                true
            }
            ReconcileEvent::RegionsListed(Err(e)) => {
                error!(error = %e, "Listing offline regions failed, reconciliation disabled");
                self.failed = true;
                false
            }
            ReconcileEvent::DesiredChanged(desired) => {
                debug!(count = desired.len(), "Desired bounds changed");
                self.desired = Some(desired);
                true
            }
            ReconcileEvent::SetActive(enabled) => {
                if self.failed {
                    warn!(enabled, "Reconciler failed permanently, ignoring toggle");
                    false
                } else if enabled != self.active {
                    info!(enabled, "Offline reconciliation toggled");
                    self.active = enabled;
                    enabled
                } else {
                    false
                }
            }
        };
        self.publish_status();
        demand
    }

    fn ready(&self) -> bool {
        self.active && !self.failed && self.regions.is_some() && self.desired.is_some()
    }

    fn begin(&mut self) -> BoxFuture<'static, PassOutcome> {
        self.retry_at = None;

        let regions = self.regions.clone().unwrap_or_default();
        let desired = self.desired.clone().unwrap_or_default();
        let store = Arc::clone(&self.store);
        let metrics = Arc::clone(&self.metrics);
        let config = self.config.clone();

        Box::pin(run_pass(regions, desired, store, metrics, config))
    }

    fn finish(&mut self, outcome: PassOutcome) -> bool {
        if outcome.failures > 0 {
            let retry_at = Instant::now() + self.config.retry_delay;
            debug!(
                failures = outcome.failures,
                retry_in_ms = self.config.retry_delay.as_millis() as u64,
                "Pass left failures, scheduling retry"
            );
            self.retry_at = Some(retry_at);
        }
        self.regions = Some(outcome.regions);
        self.publish_status();
        false
    }

    fn next_wake(&self) -> Option<Instant> {
        self.retry_at
    }

    fn on_wake(&mut self) -> bool {
        self.retry_at = None;
        true
    }
}

/// Execute one reconciliation pass against the store.
async fn run_pass(
    regions: Vec<OfflineRegionHandle>,
    desired: DesiredBoundsSet,
    store: Arc<dyn RegionStore>,
    metrics: Arc<EngineMetrics>,
    config: OfflineConfig,
) -> PassOutcome {
    let plan = plan_pass(&regions, &desired);
    debug!(
        delete = plan.delete.len(),
        refresh = plan.refresh.len(),
        create = plan.create.len(),
        "Reconciliation pass"
    );

    let mut failures = 0;
    let mut deleted: HashSet<RegionId> = HashSet::new();

    for region in &plan.delete {
        metrics.operation_started();
        match store.delete(region).await {
            Ok(()) => {
                info!(region = %region.id, bounds = %region.bounds(), "Offline region deleted");
                metrics.operation_finished(true);
                deleted.insert(region.id);
            }
            Err(e) => {
                // Still unmatched, so the next pass tries again
                warn!(region = %region.id, error = %e, "Offline region delete failed");
                metrics.operation_finished(false);
                failures += 1;
            }
        }
    }

    for region in &plan.refresh {
        match store.status(region).await {
            Ok(status) if status.is_complete() => {
                info!(region = %region.id, "Offline region loaded");
            }
            Ok(status) => {
                if let Some(last_error) = &status.last_error {
                    warn!(region = %region.id, error = %last_error, "Offline region reported error");
                }
                metrics.operation_started();
                match store.set_active(region, true).await {
                    Ok(()) => metrics.operation_finished(true),
                    Err(e) => {
                        warn!(region = %region.id, error = %e, "Offline region activation failed");
                        metrics.operation_finished(false);
                    }
                }
            }
            Err(e) => {
                warn!(region = %region.id, error = %e, "Offline region status check failed");
            }
        }
    }

    let mut created = Vec::with_capacity(plan.create.len());
    for bounds in plan.create {
        metrics.operation_started();
        let region = match store.create(config.definition_for(bounds)).await {
            Ok(region) => {
                info!(region = %region.id, %bounds, "Offline region created");
                metrics.operation_finished(true);
                region
            }
            Err(e) => {
                // Still desired, so the next pass tries again
                warn!(%bounds, error = %e, "Offline region create failed");
                metrics.operation_finished(false);
                failures += 1;
                continue;
            }
        };

        metrics.operation_started();
        match store.set_active(&region, true).await {
            Ok(()) => metrics.operation_finished(true),
            Err(e) => {
                // The next pass's status check re-activates it
                warn!(region = %region.id, error = %e, "New offline region activation failed");
                metrics.operation_finished(false);
            }
        }
        created.push(region);
    }

    let regions = regions
        .into_iter()
        .filter(|region| !deleted.contains(&region.id))
        .chain(created)
        .collect();

    PassOutcome { regions, failures }
}

// =============================================================================
// Handle
// =============================================================================

/// Handle to a running region reconciler.
#[derive(Clone)]
pub struct RegionReconciler {
    events: mpsc::UnboundedSender<ReconcileEvent>,
    status: watch::Receiver<ReconcilerStatus>,
    metrics: Arc<EngineMetrics>,
}

impl RegionReconciler {
    /// Spawn the reconciler and start the initial region listing.
    pub fn spawn(
        config: OfflineConfig,
        store: Arc<dyn RegionStore>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (events, rx) = mpsc::unbounded_channel();
        let initial = if config.enabled {
            ReconcilerStatus::Loading
        } else {
            ReconcilerStatus::Suspended
        };
        let (status_tx, status) = watch::channel(initial);
        let metrics = Arc::new(EngineMetrics::new());

        info!(
            style = %config.style_url,
            min_zoom = config.min_zoom,
            max_zoom = config.max_zoom,
            enabled = config.enabled,
            "Starting offline region reconciler"
        );

        let engine = ReconcileEngine {
            active: config.enabled,
            config,
            store: Arc::clone(&store),
            metrics: Arc::clone(&metrics),
            regions: None,
            desired: None,
            failed: false,
            retry_at: None,
            status: status_tx,
        };
        let task = tokio::spawn(run_engine(engine, rx, Arc::clone(&metrics), shutdown));

        let listing_tx = events.clone();
        tokio::spawn(async move {
            let listed = store.list_all().await;
            let _ = listing_tx.send(ReconcileEvent::RegionsListed(listed));
        });

        (
            Self {
                events,
                status,
                metrics,
            },
            task,
        )
    }

    /// Replace the desired set of mission bounds.
    pub fn on_desired_bounds_changed(&self, desired: DesiredBoundsSet) {
        if self.events.send(ReconcileEvent::DesiredChanged(desired)).is_err() {
            debug!("Reconciler stopped, dropping desired bounds");
        }
    }

    /// Enable or suspend reconciliation. Re-enabling runs a pass at once.
    pub fn set_active(&self, enabled: bool) {
        if self.events.send(ReconcileEvent::SetActive(enabled)).is_err() {
            debug!("Reconciler stopped, dropping toggle");
        }
    }

    /// Forward every snapshot from `feed` into
    /// [`on_desired_bounds_changed`](Self::on_desired_bounds_changed).
    pub fn follow(&self, feed: &dyn DesiredBoundsFeed) -> JoinHandle<()> {
        use futures::StreamExt;

        let reconciler = self.clone();
        let mut snapshots = feed.observe();
        tokio::spawn(async move {
            while let Some(desired) = snapshots.next().await {
                reconciler.on_desired_bounds_changed(desired);
            }
        })
    }

    /// Current status.
    pub fn status(&self) -> ReconcilerStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<ReconcilerStatus> {
        self.status.clone()
    }

    /// Engine counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::memory::{InMemoryRegionStore, StoreCommand};

    fn bounds(n: f64) -> BoundingBox {
        BoundingBox::new(n, n, n + 0.1, n + 0.1)
    }

    fn desired(items: &[BoundingBox]) -> DesiredBoundsSet {
        items.iter().copied().collect()
    }

    fn spawn(store: &Arc<InMemoryRegionStore>, config: OfflineConfig) -> RegionReconciler {
        let (reconciler, _task) = RegionReconciler::spawn(
            config,
            Arc::clone(store) as Arc<dyn RegionStore>,
            CancellationToken::new(),
        );
        reconciler
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[test]
    fn test_default_config() {
        let config = OfflineConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_zoom, 18.0);
        let definition = config.definition_for(bounds(1.0));
        assert_eq!(definition.style_url, DEFAULT_STYLE_URL);
        assert_eq!(definition.bounds, bounds(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_creates_missing_region_and_keeps_complete_one() {
        let config = OfflineConfig::default();
        let store = Arc::new(InMemoryRegionStore::new());
        let a = store.seed(config.definition_for(bounds(1.0)), true);
        let reconciler = spawn(&store, config);

        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0), bounds(2.0)]));
        settle().await;

        assert_eq!(store.region_bounds(), desired(&[bounds(1.0), bounds(2.0)]));
        let commands = store.commands();
        assert!(!commands.contains(&StoreCommand::SetActive(a, true)));
        assert!(commands.contains(&StoreCommand::Create(bounds(2.0))));
        assert_eq!(reconciler.status(), ReconcilerStatus::Ready { regions: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_activates_incomplete_region() {
        let config = OfflineConfig::default();
        let store = Arc::new(InMemoryRegionStore::new());
        let a = store.seed(config.definition_for(bounds(1.0)), false);
        let reconciler = spawn(&store, config);

        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;

        assert_eq!(store.commands(), vec![StoreCommand::SetActive(a, true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_desired_deletes_all() {
        let config = OfflineConfig::default();
        let store = Arc::new(InMemoryRegionStore::new());
        store.seed(config.definition_for(bounds(1.0)), true);
        store.seed(config.definition_for(bounds(2.0)), false);
        let reconciler = spawn(&store, config);

        reconciler.on_desired_bounds_changed(DesiredBoundsSet::new());
        settle().await;

        assert!(store.region_bounds().is_empty());
        assert_eq!(reconciler.status(), ReconcilerStatus::Ready { regions: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pass_before_first_desired_snapshot() {
        let config = OfflineConfig::default();
        let store = Arc::new(InMemoryRegionStore::new());
        store.seed(config.definition_for(bounds(1.0)), true);
        let reconciler = spawn(&store, config);

        settle().await;
        assert_eq!(store.region_bounds().len(), 1);
        assert_eq!(reconciler.metrics().passes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_pass_with_same_desired_issues_nothing() {
        let store = Arc::new(InMemoryRegionStore::new());
        let reconciler = spawn(&store, OfflineConfig::default());

        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;
        store.complete_active();
        store.clear_commands();

        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;

        assert!(store.commands().is_empty());
        assert_eq!(reconciler.metrics().passes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_failure_is_terminal() {
        let store = Arc::new(InMemoryRegionStore::new());
        store.fail_listing(true);
        let reconciler = spawn(&store, OfflineConfig::default());

        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;
        reconciler.set_active(false);
        reconciler.set_active(true);
        settle().await;

        assert_eq!(reconciler.status(), ReconcilerStatus::Failed);
        assert!(store.region_bounds().is_empty());
        assert_eq!(reconciler.metrics().passes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspended_reconciler_holds_demand() {
        let store = Arc::new(InMemoryRegionStore::new());
        let reconciler = spawn(&store, OfflineConfig::default());

        reconciler.set_active(false);
        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;
        assert_eq!(reconciler.status(), ReconcilerStatus::Suspended);
        assert!(store.region_bounds().is_empty());

        reconciler.set_active(true);
        settle().await;
        assert_eq!(store.region_bounds(), desired(&[bounds(1.0)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_create_is_retried_after_delay() {
        let config = OfflineConfig {
            retry_delay: Duration::from_secs(5),
            ..OfflineConfig::default()
        };
        let store = Arc::new(InMemoryRegionStore::new());
        store.fail_next_creates(1);
        let reconciler = spawn(&store, config);

        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;
        assert!(store.region_bounds().is_empty());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.region_bounds(), desired(&[bounds(1.0)]));
        assert_eq!(reconciler.metrics().passes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delete_keeps_region_for_retry() {
        let config = OfflineConfig {
            retry_delay: Duration::from_secs(5),
            ..OfflineConfig::default()
        };
        let store = Arc::new(InMemoryRegionStore::new());
        store.seed(config.definition_for(bounds(1.0)), true);
        store.fail_next_deletes(1);
        let reconciler = spawn(&store, config);

        reconciler.on_desired_bounds_changed(DesiredBoundsSet::new());
        settle().await;
        assert_eq!(store.region_bounds().len(), 1);
        assert_eq!(reconciler.status(), ReconcilerStatus::Ready { regions: 1 });

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(store.region_bounds().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_failure_keeps_region() {
        let store = Arc::new(InMemoryRegionStore::new());
        store.fail_next_activations(1);
        let reconciler = spawn(&store, OfflineConfig::default());

        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;

        let id = RegionId(1);
        assert_eq!(reconciler.status(), ReconcilerStatus::Ready { regions: 1 });
        assert!(store.active_bounds().is_empty());
        assert_eq!(
            store.commands(),
            vec![
                StoreCommand::Create(bounds(1.0)),
                StoreCommand::SetActive(id, true)
            ]
        );

        // The next pass finds it incomplete and activates it again
        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;

        assert_eq!(
            store.commands(),
            vec![
                StoreCommand::Create(bounds(1.0)),
                StoreCommand::SetActive(id, true),
                StoreCommand::SetActive(id, true),
            ]
        );
        assert_eq!(store.active_bounds(), desired(&[bounds(1.0)]));
        assert_eq!(reconciler.metrics().passes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_failure_is_logged_only() {
        let config = OfflineConfig::default();
        let store = Arc::new(InMemoryRegionStore::new());
        let a = store.seed(config.definition_for(bounds(1.0)), false);
        store.fail_next_status(1);
        let reconciler = spawn(&store, config);

        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;
        assert!(store.commands().is_empty());
        assert_eq!(reconciler.status(), ReconcilerStatus::Ready { regions: 1 });

        // No retry timer: nothing runs past the retry delay
        tokio::time::sleep(DEFAULT_RETRY_DELAY * 2).await;
        assert_eq!(reconciler.metrics().passes, 1);
        assert!(store.commands().is_empty());

        reconciler.on_desired_bounds_changed(desired(&[bounds(1.0)]));
        settle().await;
        assert_eq!(store.commands(), vec![StoreCommand::SetActive(a, true)]);
        assert_eq!(reconciler.metrics().passes, 2);
    }
}
