//! In-memory document store gateway.
//!
//! Stands in for the remote document store in tests and the simulator.
//! Writes are applied to a map of JSON documents and recorded with their
//! start instant so interval properties can be checked.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::time::Instant;

use super::gateway::{DocumentWrite, GatewayError, WriteGateway, WriteKind};
use crate::flight::BoxFuture;
use crate::geo::GeoPoint;

/// One write observed by the gateway.
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    /// The mutation as issued.
    pub write: DocumentWrite,
    /// When the write call started.
    pub started: Instant,
    /// Whether it was applied.
    pub succeeded: bool,
}

impl RecordedWrite {
    /// The published position carried by the write, if any.
    pub fn location(&self) -> Option<GeoPoint> {
        let value = match &self.write.kind {
            WriteKind::UpdateField { value, .. } => value,
            WriteKind::Set(document) => document.get("location")?,
        };
        serde_json::from_value(value.clone()).ok()
    }
}

#[derive(Default)]
struct GatewayState {
    documents: HashMap<String, Value>,
    denied: HashSet<String>,
    log: Vec<RecordedWrite>,
    fail_next: u32,
    fail_every: Option<u32>,
    attempts: u32,
}

impl GatewayState {
    fn should_fail(&mut self) -> bool {
        self.attempts += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        matches!(self.fail_every, Some(n) if n > 0 && self.attempts % n == 0)
    }

    fn apply(&mut self, write: &DocumentWrite) -> Result<(), GatewayError> {
        if self.denied.contains(&write.path) {
            return Err(GatewayError::PermissionDenied {
                path: write.path.clone(),
            });
        }
        match &write.kind {
            WriteKind::Set(document) => {
                self.documents.insert(write.path.clone(), document.clone());
                Ok(())
            }
            WriteKind::UpdateField { field, value } => {
                let document =
                    self.documents
                        .get_mut(&write.path)
                        .ok_or_else(|| GatewayError::NotFound {
                            path: write.path.clone(),
                        })?;
                if !document.is_object() {
                    *document = Value::Object(Map::new());
                }
                if let Value::Object(fields) = document {
                    fields.insert(field.clone(), value.clone());
                }
                Ok(())
            }
        }
    }
}

/// Document store double with scripted failures and latency.
pub struct InMemoryGateway {
    state: Mutex<GatewayState>,
    latency: Duration,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    /// Create an empty store with no latency.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState::default()),
            latency: Duration::ZERO,
        }
    }

    /// Create a store holding one existing document.
    pub fn with_document(path: impl Into<String>, document: Value) -> Self {
        let gateway = Self::new();
        gateway.state.lock().documents.insert(path.into(), document);
        gateway
    }

    /// Delay every write by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next `count` writes.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().fail_next = count;
    }

    /// Fail every `n`th write attempt (`None` disables).
    pub fn fail_every(&self, n: Option<u32>) {
        self.state.lock().fail_every = n;
    }

    /// Reject writes to `path` with [`GatewayError::PermissionDenied`].
    pub fn deny(&self, path: impl Into<String>) {
        self.state.lock().denied.insert(path.into());
    }

    /// Lift a restriction set by [`deny`](Self::deny).
    pub fn allow(&self, path: &str) {
        self.state.lock().denied.remove(path);
    }

    /// Current contents of a document.
    pub fn document(&self, path: &str) -> Option<Value> {
        self.state.lock().documents.get(path).cloned()
    }

    /// Every write observed so far, in order.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.lock().log.clone()
    }

    /// Number of writes observed.
    pub fn write_count(&self) -> usize {
        self.state.lock().log.len()
    }
}

impl WriteGateway for InMemoryGateway {
    fn write(&self, write: DocumentWrite) -> BoxFuture<'_, Result<(), GatewayError>> {
        Box::pin(async move {
            let started = Instant::now();
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let mut state = self.state.lock();
            let result = if state.should_fail() {
                Err(GatewayError::Unavailable("injected failure".to_string()))
            } else {
                state.apply(&write)
            };

            state.log.push(RecordedWrite {
                write,
                started,
                succeeded: result.is_ok(),
            });
            result
        })
    }
}
