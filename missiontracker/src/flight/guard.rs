//! Dirty flag plus in-flight guard.

/// Tracks outstanding demand and whether an operation is running.
///
/// The invariant is simple: `try_begin` succeeds only when there is demand
/// and nothing is in flight, and it consumes the demand. Demand recorded
/// while in flight therefore yields exactly one more pass once `complete`
/// is called.
#[derive(Debug, Default, Clone)]
pub struct SingleFlight {
    dirty: bool,
    in_flight: bool,
    passes: u64,
}

impl SingleFlight {
    /// Create an idle guard with no demand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record new demand.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Start a pass if there is demand, nothing in flight, and the caller's
    /// own gate is open. Clears the dirty flag on success.
    pub fn try_begin(&mut self, ready: bool) -> bool {
        if self.dirty && !self.in_flight && ready {
            self.dirty = false;
            self.in_flight = true;
            self.passes += 1;
            true
        } else {
            false
        }
    }

    /// Release the in-flight guard.
    pub fn complete(&mut self) {
        self.in_flight = false;
    }

    /// Whether unprocessed demand exists.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether an operation is running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Number of passes started so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }
}
