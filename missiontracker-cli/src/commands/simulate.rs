//! Simulate command - run every engine against in-memory backends.
//!
//! A player walks east across two missions while the mission set changes
//! under the reconciler. Writes fail at the requested rate so retries show
//! up in the metrics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use missiontracker::config::ConfigFile;
use missiontracker::geo::GeoPoint;
use missiontracker::mission::{
    current_mission_feed, MissionCollectionFeed, RadiationCollectionFeed, CURRENT_MISSION_FIELD,
    STATE_DOCUMENT,
};
use missiontracker::offline::{InMemoryRegionStore, RegionReconciler, RegionStore};
use missiontracker::publish::{InMemoryGateway, LocationPublisher, PublishTarget, WriteGateway};
use missiontracker::radiation::HazardMonitor;
use serde_json::{json, Map, Value};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

/// Missions the game state alternates between.
const MISSIONS: [&str; 2] = ["missions/crossing", "missions/extraction"];
const STEP: Duration = Duration::from_millis(250);
const STORE_LATENCY: Duration = Duration::from_millis(120);

/// Arguments for the simulate command.
pub struct SimulateArgs {
    pub seconds: u64,
    pub fail_rate: f64,
}

/// Run the simulate command.
pub fn run(config: &ConfigFile, args: SimulateArgs) -> Result<(), CliError> {
    if !(0.0..=1.0).contains(&args.fail_rate) {
        return Err(CliError::Input(format!(
            "--fail-rate must be between 0 and 1, got {}",
            args.fail_rate
        )));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    ctrlc::set_handler(move || ctrlc_token.cancel())
        .map_err(|e| CliError::Runtime(format!("Failed to set Ctrl-C handler: {}", e)))?;

    runtime.block_on(simulate(config.clone(), args, shutdown));
    Ok(())
}

/// Every `n`th write fails for a failure fraction `rate`.
fn failure_period(rate: f64) -> Option<u32> {
    if rate <= 0.0 {
        None
    } else {
        Some((1.0 / rate).round().max(1.0) as u32)
    }
}

fn mission(north: f64, west: f64, south: f64, east: f64) -> Value {
    json!({
        "bounds_nw": { "latitude": north, "longitude": west },
        "bounds_se": { "latitude": south, "longitude": east },
    })
}

/// State document naming `mission` as current.
fn state_document(mission: &str) -> Value {
    let mut state = Map::new();
    state.insert(CURRENT_MISSION_FIELD.to_string(), Value::from(mission));
    Value::Object(state)
}

fn radiation(latitude: f64, longitude: f64, radius: f64, intensity: f64) -> Value {
    json!({
        "center": { "latitude": latitude, "longitude": longitude },
        "radius": radius,
        "intensity": intensity,
    })
}

async fn simulate(config: ConfigFile, args: SimulateArgs, shutdown: CancellationToken) {
    let gateway = Arc::new(match &config.publisher.target {
        PublishTarget::SharedField { document, .. } => {
            InMemoryGateway::with_document(document.clone(), json!({}))
        }
        PublishTarget::MemberDocument { .. } => InMemoryGateway::new(),
    });
    gateway.fail_every(failure_period(args.fail_rate));

    let store = Arc::new(InMemoryRegionStore::new().with_latency(STORE_LATENCY));

    let (publisher, publisher_task) = LocationPublisher::spawn(
        config.publisher.clone(),
        Arc::clone(&gateway) as Arc<dyn WriteGateway>,
        shutdown.clone(),
    );
    publisher.set_identity(Some("simulated-player".to_string()));

    let (reconciler, reconciler_task) = RegionReconciler::spawn(
        config.offline.clone(),
        Arc::clone(&store) as Arc<dyn RegionStore>,
        shutdown.clone(),
    );
    let (missions_tx, missions_rx) = watch::channel(vec![mission(60.20, 24.90, 60.15, 24.95)]);
    reconciler.follow(&MissionCollectionFeed::new(missions_rx));

    let (monitor, monitor_task) = HazardMonitor::spawn(shutdown.clone());
    let collections = HashMap::from([
        (
            MISSIONS[0].to_string(),
            vec![
                radiation(60.17, 24.93, 300.0, 0.8),
                radiation(60.17, 24.96, 150.0, 2.5),
            ],
        ),
        (
            MISSIONS[1].to_string(),
            vec![radiation(60.17, 24.95, 800.0, 1.5)],
        ),
    ]);
    let (_radiation_tx, radiation_rx) = watch::channel(collections);
    let (state_tx, state_rx) = watch::channel(state_document(MISSIONS[0]));
    monitor.follow_current_mission(
        Arc::new(RadiationCollectionFeed::new(radiation_rx)),
        current_mission_feed(state_rx),
    );

    let mut warnings = monitor.subscribe();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.seconds);
    let mut position = GeoPoint::new(60.17, 24.90);
    let mut ticks: u64 = 0;

    println!("Simulating for {}s (Ctrl-C to stop)...", args.seconds);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep_until(deadline) => break,
            Ok(()) = warnings.changed() => {
                let warning = *warnings.borrow_and_update();
                match warning {
                    Some(intensity) => println!("  radiation warning: {}", intensity),
                    None => println!("  radiation warning cleared"),
                }
            }
            _ = tokio::time::sleep(STEP) => {
                ticks += 1;
                position = GeoPoint::new(position.latitude, position.longitude + 0.0004);
                publisher.submit(position);
                monitor.update_position(position);

                // Mission set changes every 5 seconds
                if ticks % 20 == 0 {
                    let east = 24.95 + 0.05 * (ticks / 20) as f64;
                    let _ = missions_tx.send(vec![
                        mission(60.20, 24.90, 60.15, 24.95),
                        mission(60.20, east - 0.05, 60.15, east),
                    ]);
                    info!(ticks, "Mission set changed");
                }
                // Current mission switches every 10 seconds
                if ticks % 40 == 0 {
                    let current = MISSIONS[(ticks / 40) as usize % MISSIONS.len()];
                    let _ = state_tx.send(state_document(current));
                    info!(document = STATE_DOCUMENT, mission = current, "Current mission changed");
                }
                if ticks % 8 == 0 {
                    store.complete_active();
                }
            }
        }
    }

    shutdown.cancel();
    let _ = tokio::join!(publisher_task, reconciler_task, monitor_task);

    println!();
    println!("Publisher:  {}", publisher.metrics());
    println!("            last published {:?}", publisher.status().last_published);
    println!("Reconciler: {}", reconciler.metrics());
    println!("            status {:?}", reconciler.status());
    println!("            {} regions cached", store.region_bounds().len());
    println!("Gateway:    {} writes", gateway.write_count());
}
