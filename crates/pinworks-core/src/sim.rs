//! Simulation clock, per-step reports and the determinism hash.

use crate::fixed::Ticks;
use crate::position::GridPosition;

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable simulation state tracked by the engine.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Current tick counter. Incremented by 1 for each simulation step.
    pub tick: Ticks,
}

impl SimState {
    /// Create a new simulation state starting at tick 0.
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// What happened during one `Engine::step()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The tick that was executed.
    pub tick: Ticks,
    /// New replenishment orders raised by the stockpile scan.
    pub orders_placed: u32,
    /// Idle workers paired with replenishment orders.
    pub replenishments_dispatched: u32,
    /// Idle workers paired with queued jobs.
    pub jobs_dispatched: u32,
    /// Machines whose production timer expired.
    pub productions_completed: u32,
}

impl TickReport {
    /// Fold another report into this one (used by multi-step advances).
    pub fn accumulate(&mut self, other: &TickReport) {
        self.tick = other.tick;
        self.orders_placed += other.orders_placed;
        self.replenishments_dispatched += other.replenishments_dispatched;
        self.jobs_dispatched += other.jobs_dispatched;
        self.productions_completed += other.productions_completed;
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_position(&mut self, p: GridPosition) {
        self.write(&p.x.to_le_bytes());
        self.write(&p.y.to_le_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
