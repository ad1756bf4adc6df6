//! Generic event loop for single-flight engines.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::OptionFuture;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{EngineMetrics, SingleFlight};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A state machine driven by [`run_engine`].
///
/// Implementors own all engine state. The runner calls these methods from a
/// single task, never concurrently, so `&mut self` is all the
/// synchronization needed.
pub trait Engine: Send + 'static {
    /// External demand (submissions, feed updates, toggles).
    type Event: Send + 'static;

    /// Result of one pass, handed back to [`Engine::finish`].
    type Outcome: Send + 'static;

    /// Name used in log output.
    fn name(&self) -> &'static str;

    /// Apply an event to engine state.
    ///
    /// Returns `true` if the event created demand for a pass.
    fn apply(&mut self, event: Self::Event) -> bool;

    /// Engine-specific gate checked in addition to dirty and in-flight.
    fn ready(&self) -> bool;

    /// Start a pass.
    ///
    /// The returned future must capture everything it needs; engine state
    /// is not touched again until [`Engine::finish`].
    fn begin(&mut self) -> BoxFuture<'static, Self::Outcome>;

    /// Settle a pass.
    ///
    /// Returns `true` if the pass left work undone and should run again.
    fn finish(&mut self, outcome: Self::Outcome) -> bool;

    /// Deadline at which the engine wants [`Engine::on_wake`] called.
    fn next_wake(&self) -> Option<Instant> {
        None
    }

    /// Timer expiry. Must clear or move the deadline reported by
    /// [`Engine::next_wake`]. Returns `true` if it creates demand for a pass.
    fn on_wake(&mut self) -> bool {
        false
    }
}

/// Drive an engine until shutdown or until every event sender is dropped.
///
/// Once the event channel closes no new pass is started; an operation
/// already in flight still runs to completion.
pub async fn run_engine<E: Engine>(
    mut engine: E,
    mut events: mpsc::UnboundedReceiver<E::Event>,
    metrics: Arc<EngineMetrics>,
    shutdown: CancellationToken,
) {
    let name = engine.name();
    info!(engine = name, "Engine starting");

    let mut flight = SingleFlight::new();
    let mut in_flight: Option<BoxFuture<'static, E::Outcome>> = None;
    let mut events_open = true;

    loop {
        if events_open && flight.try_begin(engine.ready()) {
            metrics.pass_started();
            debug!(engine = name, pass = flight.passes(), "Pass starting");
            in_flight = Some(engine.begin());
        }

        if !events_open && in_flight.is_none() {
            break;
        }

        let wake = engine.next_wake();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(engine = name, "Engine shutting down");
                break;
            }

            Some(outcome) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                in_flight = None;
                flight.complete();
                if engine.finish(outcome) {
                    flight.mark_dirty();
                }
                debug!(engine = name, dirty = flight.is_dirty(), "Pass settled");
            }

            Some(()) = OptionFuture::from(wake.map(tokio::time::sleep_until)), if wake.is_some() => {
                if engine.on_wake() {
                    flight.mark_dirty();
                }
            }

            event = events.recv(), if events_open => {
                match event {
                    Some(event) => {
                        if engine.apply(event) {
                            flight.mark_dirty();
                        }
                    }
                    None => {
                        debug!(engine = name, "All handles dropped");
                        events_open = false;
                    }
                }
            }
        }
    }

    info!(engine = name, passes = flight.passes(), "Engine stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Records the demand value seen by each pass; fails while `failures > 0`.
    struct RecordingEngine {
        latest: u32,
        gate_open: bool,
        failures: u32,
        seen: Arc<Mutex<Vec<u32>>>,
    }

    enum TestEvent {
        Value(u32),
        Gate(bool),
    }

    impl Engine for RecordingEngine {
        type Event = TestEvent;
        type Outcome = bool;

        fn name(&self) -> &'static str {
            "test"
        }

        fn apply(&mut self, event: TestEvent) -> bool {
            match event {
                TestEvent::Value(v) => {
                    self.latest = v;
                    true
                }
                TestEvent::Gate(open) => {
                    self.gate_open = open;
                    false
                }
            }
        }

        fn ready(&self) -> bool {
            self.gate_open
        }

        fn begin(&mut self) -> BoxFuture<'static, bool> {
            let value = self.latest;
            let seen = Arc::clone(&self.seen);
            let fail = self.failures > 0;
            if fail {
                self.failures -= 1;
            }
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                seen.lock().push(value);
                !fail
            })
        }

        fn finish(&mut self, success: bool) -> bool {
            !success
        }
    }

    fn spawn_engine(
        gate_open: bool,
        failures: u32,
    ) -> (
        mpsc::UnboundedSender<TestEvent>,
        Arc<Mutex<Vec<u32>>>,
        Arc<EngineMetrics>,
        tokio::task::JoinHandle<()>,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let engine = RecordingEngine {
            latest: 0,
            gate_open,
            failures,
            seen: Arc::clone(&seen),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(EngineMetrics::new());
        let handle = tokio::spawn(run_engine(
            engine,
            rx,
            Arc::clone(&metrics),
            CancellationToken::new(),
        ));
        (tx, seen, metrics, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_demand_during_flight_coalesces() {
        let (tx, seen, metrics, handle) = spawn_engine(true, 0);

        tx.send(TestEvent::Value(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Arrive while pass for 1 is in flight
        tx.send(TestEvent::Value(2)).unwrap();
        tx.send(TestEvent::Value(3)).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(*seen.lock(), vec![1, 3]);
        assert_eq!(metrics.snapshot().passes, 2);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pass_reruns() {
        let (tx, seen, _, handle) = spawn_engine(true, 2);

        tx.send(TestEvent::Value(7)).unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(*seen.lock(), vec![7, 7, 7]);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_gate_holds_demand_until_opened() {
        let (tx, seen, _, handle) = spawn_engine(false, 0);

        tx.send(TestEvent::Value(5)).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(seen.lock().is_empty());

        // Gate events do not create demand themselves, but the held demand runs
        tx.send(TestEvent::Gate(true)).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*seen.lock(), vec![5]);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_engine() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let engine = RecordingEngine {
            latest: 0,
            gate_open: true,
            failures: 0,
            seen,
        };
        let (_tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_engine(
            engine,
            rx,
            Arc::new(EngineMetrics::new()),
            shutdown.clone(),
        ));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("engine should stop")
            .unwrap();
    }
}
