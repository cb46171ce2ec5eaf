use serde::{Deserialize, Serialize};

/// Engine limits. Exceeding any of them is a fatal configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_workers: usize,
    pub max_machines: usize,
    pub max_stockpiles: usize,
    pub job_queue_capacity: usize,
    pub replenishment_slots: usize,
    /// Events kept in the ring before the oldest are dropped.
    pub event_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            max_machines: 10,
            max_stockpiles: 50,
            job_queue_capacity: 100,
            replenishment_slots: 100,
            event_log_capacity: 256,
        }
    }
}
