//! Single-flight engine runtime.
//!
//! Both coordination engines (location publishing and offline regions) share
//! one control discipline: at most one outbound operation in flight, and any
//! demand arriving meanwhile is remembered as a dirty flag that buys exactly
//! one follow-up pass. This module implements that discipline once.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       run_engine (one task)                       │
//! │                                                                   │
//! │  handle.send(Event) ──► apply() ──► dirty? ─┐                     │
//! │                                             ▼                     │
//! │                               ┌───────────────────────────┐       │
//! │                               │ SingleFlight::try_begin    │       │
//! │                               │ dirty && idle && ready()   │       │
//! │                               └─────────────┬─────────────┘       │
//! │                                             ▼                     │
//! │                                 begin() ──► BoxFuture (polled     │
//! │                                             in the same select)   │
//! │                                             ▼                     │
//! │                                 finish(outcome) ──► re-dirty?     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events and completions are handled one at a time on the engine's own
//! task, so engine state never needs a lock.

mod engine;
mod guard;
mod metrics;

pub use engine::{run_engine, BoxFuture, Engine};
pub use guard::SingleFlight;
pub use metrics::{EngineMetrics, MetricsSnapshot};
