use crate::error::SimError;
use crate::id::ObjectRef;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Kinds of work a worker can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    OperateMachine,
    EmptyMachineOutput,
    FillInputBuffer,
    Replenish,
}

impl JobKind {
    pub fn name(self) -> &'static str {
        match self {
            JobKind::OperateMachine => "operate_machine",
            JobKind::EmptyMachineOutput => "empty_machine_output",
            JobKind::FillInputBuffer => "fill_input_buffer",
            JobKind::Replenish => "replenish",
        }
    }

    /// Whether entries of this kind may sit in the job queue. Input filling
    /// and replenishment are never queued.
    pub fn is_queueable(self) -> bool {
        matches!(self, JobKind::OperateMachine | JobKind::EmptyMachineOutput)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit of work waiting for an idle worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub target: ObjectRef,
    pub kind: JobKind,
}

/// Bounded FIFO of queued jobs. A full queue rejects new entries instead of
/// overwriting unconsumed ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobQueue {
    entries: VecDeque<QueuedJob>,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the tail.
    pub fn push(&mut self, job: QueuedJob) -> Result<(), SimError> {
        if self.entries.len() >= self.capacity {
            return Err(SimError::JobQueueFull {
                capacity: self.capacity,
            });
        }
        self.entries.push_back(job);
        Ok(())
    }

    /// Remove from the head; `None` when empty.
    pub fn pop(&mut self) -> Option<QueuedJob> {
        self.entries.pop_front()
    }

    pub fn peek(&self) -> Option<&QueuedJob> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedJob> {
        self.entries.iter()
    }
}
