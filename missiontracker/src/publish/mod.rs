//! Rate-limited location publishing.
//!
//! The device reports its position far more often than the shared document
//! store should be written. [`LocationPublisher`] keeps only the newest
//! position and writes it at most once per `min_interval` (3 s by default),
//! never overlapping writes and retrying failed writes until a newer or the
//! same position lands.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use missiontracker::geo::GeoPoint;
//! use missiontracker::publish::{
//!     InMemoryGateway, LocationPublisher, PublisherConfig, WriteGateway,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let gateway: Arc<dyn WriteGateway> = Arc::new(InMemoryGateway::new());
//! let shutdown = CancellationToken::new();
//!
//! let (publisher, task) =
//!     LocationPublisher::spawn(PublisherConfig::default(), gateway, shutdown.clone());
//! publisher.submit(GeoPoint::new(60.17, 24.94));
//!
//! shutdown.cancel();
//! let _ = task.await;
//! # }
//! ```

mod coalescer;
mod gateway;
mod memory;

pub use coalescer::{
    LocationPublisher, PublisherConfig, PublisherStatus, DEFAULT_MIN_INTERVAL,
    DEFAULT_MIN_INTERVAL_MS,
};
pub use gateway::{
    DocumentWrite, GatewayError, PublishTarget, WriteGateway, WriteKind,
    DEFAULT_LOCATIONS_DOCUMENT, DEFAULT_MEMBERS_COLLECTION, DEFAULT_TEAM_FIELD,
};
pub use memory::{InMemoryGateway, RecordedWrite};
