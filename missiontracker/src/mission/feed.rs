//! Feeds observed by the engines.

use std::collections::HashMap;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::watch;

use super::document::{current_mission, desired_bounds, radiation_areas};
use crate::offline::DesiredBoundsSet;
use crate::radiation::RadiationArea;

/// Source of desired-bounds snapshots, one per change of the mission
/// collection.
pub trait DesiredBoundsFeed: Send + Sync {
    /// Stream of snapshots, starting with the current one.
    fn observe(&self) -> BoxStream<'static, DesiredBoundsSet>;
}

/// Source of radiation area snapshots for a mission.
pub trait RadiationFeed: Send + Sync {
    /// Stream of snapshots of `mission`'s radiation collection, starting with
    /// the current one.
    fn observe(&self, mission: &str) -> BoxStream<'static, Vec<RadiationArea>>;
}

/// Stream a watch channel: the current value, then every change.
///
/// Ends when the sender is dropped.
pub fn watch_feed<T>(rx: watch::Receiver<T>) -> BoxStream<'static, T>
where
    T: Clone + Send + Sync + 'static,
{
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let value = rx.borrow_and_update().clone();
        Some((value, (rx, false)))
    })
    .boxed()
}

/// The current mission path from live snapshots of the state document.
///
/// Consecutive snapshots naming the same mission yield one item.
pub fn current_mission_feed(state: watch::Receiver<Value>) -> BoxStream<'static, Option<String>> {
    watch_feed(state)
        .map(|doc| current_mission(&doc).map(str::to_string))
        .scan(None::<Option<String>>, |last, mission| {
            let changed = last.as_ref() != Some(&mission);
            *last = Some(mission.clone());
            futures::future::ready(Some(changed.then_some(mission)))
        })
        .filter_map(futures::future::ready)
        .boxed()
}

/// Desired bounds decoded from a live snapshot of mission documents.
#[derive(Clone)]
pub struct MissionCollectionFeed {
    missions: watch::Receiver<Vec<Value>>,
}

impl MissionCollectionFeed {
    pub fn new(missions: watch::Receiver<Vec<Value>>) -> Self {
        Self { missions }
    }
}

impl DesiredBoundsFeed for MissionCollectionFeed {
    fn observe(&self) -> BoxStream<'static, DesiredBoundsSet> {
        watch_feed(self.missions.clone())
            .map(|docs| desired_bounds(&docs))
            .boxed()
    }
}

/// Radiation areas decoded from live snapshots of each mission's
/// `radiation` collection, keyed by mission document path.
#[derive(Clone)]
pub struct RadiationCollectionFeed {
    collections: watch::Receiver<HashMap<String, Vec<Value>>>,
}

impl RadiationCollectionFeed {
    pub fn new(collections: watch::Receiver<HashMap<String, Vec<Value>>>) -> Self {
        Self { collections }
    }
}

impl RadiationFeed for RadiationCollectionFeed {
    fn observe(&self, mission: &str) -> BoxStream<'static, Vec<RadiationArea>> {
        let mission = mission.to_string();
        watch_feed(self.collections.clone())
            .map(move |collections| {
                collections
                    .get(&mission)
                    .map(|docs| radiation_areas(docs))
                    .unwrap_or_default()
            })
            .boxed()
    }
}
