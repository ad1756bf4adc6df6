//! The location publish coalescer.
//!
//! # Control loop
//!
//! ```text
//! submit(p) ──► p == last? ──yes──► ignore
//!                  │ no
//!                  ▼
//!               pending = p, dirty
//!                  │
//!   dirty && idle && identity ok?
//!                  │
//!                  ▼
//!   earliest = now + min_interval
//!   write(pending) ──► failed? re-dirty
//!   sleep_until(earliest)
//!   release guard, loop again
//! ```
//!
//! The post-write wait is unconditional, so the start times of any two
//! writes are at least `min_interval` apart regardless of write latency.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::gateway::{PublishTarget, WriteGateway};
use crate::flight::{run_engine, BoxFuture, Engine, EngineMetrics, MetricsSnapshot};
use crate::geo::GeoPoint;

/// Default minimum interval between write starts in milliseconds.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 3000;

/// Default minimum interval between write starts.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(DEFAULT_MIN_INTERVAL_MS);

/// Configuration for the location publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    /// Minimum time between the starts of two writes.
    pub min_interval: Duration,
    /// Where positions are written.
    pub target: PublishTarget,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            target: PublishTarget::default(),
        }
    }
}

/// Observable publisher state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublisherStatus {
    /// Last position the store acknowledged.
    pub last_published: Option<GeoPoint>,
    /// Failed writes since the last success.
    pub consecutive_failures: u32,
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug)]
enum PublishEvent {
    Location(GeoPoint),
    Identity(Option<String>),
}

struct PublishOutcome {
    location: GeoPoint,
    success: bool,
}

struct PublishEngine {
    config: PublisherConfig,
    gateway: Arc<dyn WriteGateway>,
    metrics: Arc<EngineMetrics>,
    /// Newest submitted position; overwritten in place, never queued.
    pending: Option<GeoPoint>,
    identity: Option<String>,
    status: watch::Sender<PublisherStatus>,
}

impl Engine for PublishEngine {
    type Event = PublishEvent;
    type Outcome = Option<PublishOutcome>;

    fn name(&self) -> &'static str {
        "location-publisher"
    }

    fn apply(&mut self, event: PublishEvent) -> bool {
        match event {
            PublishEvent::Location(location) => {
                if self.pending == Some(location) {
                    return false;
                }
                self.pending = Some(location);
                true
            }
            PublishEvent::Identity(identity) => {
                if identity != self.identity {
                    info!(known = identity.is_some(), "Publisher identity changed");
                    self.identity = identity;
                }
                false
            }
        }
    }

    fn ready(&self) -> bool {
        !self.config.target.requires_identity() || self.identity.is_some()
    }

    fn begin(&mut self) -> BoxFuture<'static, Option<PublishOutcome>> {
        let earliest_next = Instant::now() + self.config.min_interval;
        let write = self.pending.and_then(|location| {
            self.config
                .target
                .mutation(location, self.identity.as_deref())
                .map(|write| (location, write))
        });

        let Some((location, write)) = write else {
            return Box::pin(async { None });
        };

        let gateway = Arc::clone(&self.gateway);
        let metrics = Arc::clone(&self.metrics);

        Box::pin(async move {
            metrics.operation_started();
            let success = match gateway.write(write).await {
                Ok(()) => {
                    debug!(%location, "Location published");
                    true
                }
                Err(e) => {
                    warn!(%location, error = %e, "Location write failed, will retry");
                    false
                }
            };
            metrics.operation_finished(success);

            tokio::time::sleep_until(earliest_next).await;
            Some(PublishOutcome { location, success })
        })
    }

    fn finish(&mut self, outcome: Option<PublishOutcome>) -> bool {
        let Some(outcome) = outcome else {
            return false;
        };

        self.status.send_modify(|status| {
            if outcome.success {
                status.last_published = Some(outcome.location);
                status.consecutive_failures = 0;
            } else {
                status.consecutive_failures += 1;
            }
        });

        !outcome.success
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Handle to a running location publisher.
///
/// Cheap to clone. All methods return immediately; failures are handled
/// inside the engine and never surface here.
#[derive(Clone)]
pub struct LocationPublisher {
    events: mpsc::UnboundedSender<PublishEvent>,
    status: watch::Receiver<PublisherStatus>,
    metrics: Arc<EngineMetrics>,
}

impl LocationPublisher {
    /// Spawn the publisher task on the current runtime.
    ///
    /// The task ends when `shutdown` is cancelled or every handle is dropped.
    pub fn spawn(
        config: PublisherConfig,
        gateway: Arc<dyn WriteGateway>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(PublisherStatus::default());
        let metrics = Arc::new(EngineMetrics::new());

        info!(
            min_interval_ms = config.min_interval.as_millis() as u64,
            target = ?config.target,
            "Starting location publisher"
        );

        let engine = PublishEngine {
            config,
            gateway,
            metrics: Arc::clone(&metrics),
            pending: None,
            identity: None,
            status: status_tx,
        };
        let task = tokio::spawn(run_engine(engine, rx, Arc::clone(&metrics), shutdown));

        (
            Self {
                events,
                status,
                metrics,
            },
            task,
        )
    }

    /// Record a new position. Identical consecutive positions are ignored.
    pub fn submit(&self, location: GeoPoint) {
        if self.events.send(PublishEvent::Location(location)).is_err() {
            debug!("Publisher stopped, dropping location");
        }
    }

    /// Set or clear the caller identity used by member-document targets.
    pub fn set_identity(&self, identity: Option<String>) {
        if self.events.send(PublishEvent::Identity(identity)).is_err() {
            debug!("Publisher stopped, dropping identity update");
        }
    }

    /// Forward every position from `positions` into [`submit`](Self::submit).
    pub fn follow<S>(&self, positions: S) -> JoinHandle<()>
    where
        S: Stream<Item = GeoPoint> + Send + 'static,
    {
        let publisher = self.clone();
        tokio::spawn(async move {
            let mut positions = Box::pin(positions);
            while let Some(location) = positions.next().await {
                publisher.submit(location);
            }
        })
    }

    /// Current status.
    pub fn status(&self) -> PublisherStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<PublisherStatus> {
        self.status.clone()
    }

    /// Engine counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
