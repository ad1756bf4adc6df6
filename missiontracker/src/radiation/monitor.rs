//! Live hazard warning.

use std::sync::Arc;

use futures::stream::{self, BoxStream, Fuse};
use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::area::{max_intensity, RadiationArea};
use crate::geo::GeoPoint;
use crate::mission::RadiationFeed;

enum HazardEvent {
    Areas(Vec<RadiationArea>),
    Position(GeoPoint),
}

/// Tracks the strongest radiation area containing the player.
///
/// The warning is `None` while the player is outside every area or no
/// position is known. Subscribers are only notified when the value changes.
#[derive(Clone)]
pub struct HazardMonitor {
    events: mpsc::UnboundedSender<HazardEvent>,
    warning: watch::Receiver<Option<f64>>,
    areas: Arc<RwLock<Vec<RadiationArea>>>,
}

impl HazardMonitor {
    /// Spawn the monitor task.
    pub fn spawn(shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (events, mut rx) = mpsc::unbounded_channel();
        let (warning_tx, warning) = watch::channel(None);
        let areas = Arc::new(RwLock::new(Vec::new()));
        let shared = Arc::clone(&areas);

        let task = tokio::spawn(async move {
            let mut position: Option<GeoPoint> = None;

            loop {
                let event = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                match event {
                    HazardEvent::Areas(snapshot) => {
                        debug!(count = snapshot.len(), "Radiation areas updated");
                        *shared.write() = snapshot;
                    }
                    HazardEvent::Position(point) => position = Some(point),
                }

                let intensity = max_intensity(&shared.read(), position);
                warning_tx.send_if_modified(|current| {
                    if *current == intensity {
                        return false;
                    }
                    match intensity {
                        Some(value) => warn!(intensity = value, "Inside radiation area"),
                        None => info!("Left radiation areas"),
                    }
                    *current = intensity;
                    true
                });
            }

            debug!("Hazard monitor stopped");
        });

        (
            Self {
                events,
                warning,
                areas,
            },
            task,
        )
    }

    /// Replace the radiation area snapshot.
    pub fn update_areas(&self, areas: Vec<RadiationArea>) {
        let _ = self.events.send(HazardEvent::Areas(areas));
    }

    /// Report the player's position.
    pub fn update_position(&self, point: GeoPoint) {
        let _ = self.events.send(HazardEvent::Position(point));
    }

    /// Feed area snapshots from a stream.
    pub fn follow_areas<S>(&self, snapshots: S) -> JoinHandle<()>
    where
        S: Stream<Item = Vec<RadiationArea>> + Send + 'static,
    {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut snapshots = Box::pin(snapshots);
            while let Some(areas) = snapshots.next().await {
                monitor.update_areas(areas);
            }
        })
    }

    /// Follow the radiation collection of `mission`.
    pub fn follow(&self, feed: &dyn RadiationFeed, mission: &str) -> JoinHandle<()> {
        self.follow_areas(feed.observe(mission))
    }

    /// Follow the radiation collection of whichever mission `missions`
    /// currently names, switching when it changes. With no current mission
    /// the area snapshot is empty.
    pub fn follow_current_mission<S>(
        &self,
        feed: Arc<dyn RadiationFeed>,
        missions: S,
    ) -> JoinHandle<()>
    where
        S: Stream<Item = Option<String>> + Send + 'static,
    {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut missions = Box::pin(missions).fuse();
            let mut areas: Fuse<BoxStream<'static, Vec<RadiationArea>>> =
                stream::pending().boxed().fuse();

            loop {
                tokio::select! {
                    mission = missions.next() => match mission {
                        Some(Some(mission)) => {
                            info!(%mission, "Following mission radiation");
                            areas = feed.observe(&mission).fuse();
                        }
                        Some(None) => {
                            info!("No current mission");
                            areas = stream::pending().boxed().fuse();
                            monitor.update_areas(Vec::new());
                        }
                        None => break,
                    },
                    Some(snapshot) = areas.next() => monitor.update_areas(snapshot),
                }
            }
        })
    }

    /// Feed positions from a stream.
    pub fn follow_positions<S>(&self, positions: S) -> JoinHandle<()>
    where
        S: Stream<Item = GeoPoint> + Send + 'static,
    {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut positions = Box::pin(positions);
            while let Some(point) = positions.next().await {
                monitor.update_position(point);
            }
        })
    }

    /// Current warning intensity.
    pub fn warning(&self) -> Option<f64> {
        *self.warning.borrow()
    }

    /// Subscribe to warning changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<f64>> {
        self.warning.clone()
    }

    /// GeoJSON features for the current area snapshot.
    pub fn features(&self) -> Vec<serde_json::Value> {
        self.areas.read().iter().map(RadiationArea::to_feature).collect()
    }
}
