//! Human-readable event log.
//!
//! Every notable state change during a tick is recorded as a typed [`Event`]
//! in an [`EventLog`] ring buffer. The log is an observability side channel:
//! nothing in the engine reads it back for control flow.
//!
//! Event kinds can be suppressed via [`EventLog::suppress`]; suppressed events
//! are neither stored nor traced.

use crate::fixed::Ticks;
use crate::id::*;
use crate::job_queue::{JobKind, QueuedJob};
use crate::material::Material;
use std::fmt;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Commands --
    RecipeAssigned {
        machine: MachineId,
        recipe: RecipeId,
        /// Held as the pending recipe rather than activated.
        queued: bool,
        tick: Ticks,
    },

    // -- Dispatch --
    ReplenishmentOrdered {
        order: OrderId,
        stockpile: StockpileId,
        material: Material,
        quantity: u32,
        tick: Ticks,
    },
    ReplenishmentClaimed {
        order: OrderId,
        worker: WorkerId,
        source: StockpileId,
        quantity: u32,
        tick: Ticks,
    },
    JobAssigned {
        worker: WorkerId,
        job: JobKind,
        target: ObjectRef,
        tick: Ticks,
    },
    JobDiscarded {
        job: QueuedJob,
        tick: Ticks,
    },

    // -- Hauling --
    MaterialPickedUp {
        worker: WorkerId,
        from: ObjectRef,
        material: Material,
        quantity: u32,
        tick: Ticks,
    },
    MaterialDropped {
        worker: WorkerId,
        to: ObjectRef,
        material: Material,
        quantity: u32,
        tick: Ticks,
    },
    ReplenishmentDelivered {
        order: OrderId,
        stockpile: StockpileId,
        quantity: u32,
        /// The order is fully delivered and its slot released.
        fulfilled: bool,
        tick: Ticks,
    },

    // -- Production --
    ProductionStarted {
        machine: MachineId,
        recipe: RecipeId,
        worker: WorkerId,
        tick: Ticks,
    },
    ProductionCompleted {
        machine: MachineId,
        recipe: RecipeId,
        tick: Ticks,
    },

    // -- Worker state --
    WorkerBlocked {
        worker: WorkerId,
        job: JobKind,
        tick: Ticks,
    },
    WorkerResumed {
        worker: WorkerId,
        job: JobKind,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RecipeAssigned,
    ReplenishmentOrdered,
    ReplenishmentClaimed,
    JobAssigned,
    JobDiscarded,
    MaterialPickedUp,
    MaterialDropped,
    ReplenishmentDelivered,
    ProductionStarted,
    ProductionCompleted,
    WorkerBlocked,
    WorkerResumed,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 12;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RecipeAssigned { .. } => EventKind::RecipeAssigned,
            Event::ReplenishmentOrdered { .. } => EventKind::ReplenishmentOrdered,
            Event::ReplenishmentClaimed { .. } => EventKind::ReplenishmentClaimed,
            Event::JobAssigned { .. } => EventKind::JobAssigned,
            Event::JobDiscarded { .. } => EventKind::JobDiscarded,
            Event::MaterialPickedUp { .. } => EventKind::MaterialPickedUp,
            Event::MaterialDropped { .. } => EventKind::MaterialDropped,
            Event::ReplenishmentDelivered { .. } => EventKind::ReplenishmentDelivered,
            Event::ProductionStarted { .. } => EventKind::ProductionStarted,
            Event::ProductionCompleted { .. } => EventKind::ProductionCompleted,
            Event::WorkerBlocked { .. } => EventKind::WorkerBlocked,
            Event::WorkerResumed { .. } => EventKind::WorkerResumed,
        }
    }

    pub fn tick(&self) -> Ticks {
        match *self {
            Event::RecipeAssigned { tick, .. }
            | Event::ReplenishmentOrdered { tick, .. }
            | Event::ReplenishmentClaimed { tick, .. }
            | Event::JobAssigned { tick, .. }
            | Event::JobDiscarded { tick, .. }
            | Event::MaterialPickedUp { tick, .. }
            | Event::MaterialDropped { tick, .. }
            | Event::ReplenishmentDelivered { tick, .. }
            | Event::ProductionStarted { tick, .. }
            | Event::ProductionCompleted { tick, .. }
            | Event::WorkerBlocked { tick, .. }
            | Event::WorkerResumed { tick, .. } => tick,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[t{}] ", self.tick())?;
        match *self {
            Event::RecipeAssigned {
                machine,
                recipe,
                queued,
                ..
            } => {
                let how = if queued { "queued" } else { "assigned" };
                write!(f, "{} {how} {recipe}", ObjectRef::from(machine))
            }
            Event::ReplenishmentOrdered {
                order,
                stockpile,
                material,
                quantity,
                ..
            } => write!(
                f,
                "{} placed {order} for {quantity} {material}",
                ObjectRef::from(stockpile)
            ),
            Event::ReplenishmentClaimed {
                order,
                worker,
                source,
                quantity,
                ..
            } => write!(
                f,
                "{} claimed {quantity} from {} for {order}",
                ObjectRef::from(worker),
                ObjectRef::from(source)
            ),
            Event::JobAssigned {
                worker,
                job,
                target,
                ..
            } => write!(f, "{} took {job} job on {target}", ObjectRef::from(worker)),
            Event::JobDiscarded { job, .. } => {
                write!(f, "discarded stale {} job on {}", job.kind, job.target)
            }
            Event::MaterialPickedUp {
                worker,
                from,
                material,
                quantity,
                ..
            } => write!(
                f,
                "{} picked up {quantity} {material} from {from}",
                ObjectRef::from(worker)
            ),
            Event::MaterialDropped {
                worker,
                to,
                material,
                quantity,
                ..
            } => write!(
                f,
                "{} dropped {quantity} {material} at {to}",
                ObjectRef::from(worker)
            ),
            Event::ReplenishmentDelivered {
                order,
                stockpile,
                quantity,
                fulfilled,
                ..
            } => {
                write!(f, "{order} delivered {quantity} to {}", ObjectRef::from(stockpile))?;
                if fulfilled {
                    f.write_str(" (fulfilled)")?;
                }
                Ok(())
            }
            Event::ProductionStarted {
                machine,
                recipe,
                worker,
                ..
            } => write!(
                f,
                "{} started {recipe} operated by {}",
                ObjectRef::from(machine),
                ObjectRef::from(worker)
            ),
            Event::ProductionCompleted { machine, recipe, .. } => {
                write!(f, "{} completed {recipe}", ObjectRef::from(machine))
            }
            Event::WorkerBlocked { worker, job, .. } => {
                write!(f, "{} blocked on {job}", ObjectRef::from(worker))
            }
            Event::WorkerResumed { worker, job, .. } => {
                write!(f, "{} resumed {job}", ObjectRef::from(worker))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventLog {
    /// Pre-allocated storage.
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    /// Number of events currently stored (may be less than capacity).
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
    suppressed: [bool; EVENT_KIND_COUNT],
}

impl EventLog {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
            suppressed: [false; EVENT_KIND_COUNT],
        }
    }

    /// Record an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        if self.suppressed[event.kind().index()] {
            return;
        }
        tracing::debug!(target: "pinworks::event", "{event}");
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    /// Stop recording events of `kind`.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    /// Resume recording events of `kind`.
    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// The total capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    /// Number of events currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total events written since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate over events in order from oldest to newest.
    pub fn iter(&self) -> EventLogIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            // head points to the next write position, which is the oldest entry
            self.head
        };
        EventLogIter {
            log: self,
            index: start,
            remaining: self.len,
        }
    }

    /// Events recorded during `tick`, oldest first.
    pub fn at_tick(&self, tick: Ticks) -> impl Iterator<Item = &Event> {
        self.iter().filter(move |e| e.tick() == tick)
    }

    /// Clear all stored events. Totals are kept.
    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over events in an [`EventLog`], from oldest to newest.
pub struct EventLogIter<'a> {
    log: &'a EventLog,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.log.events[self.index].as_ref();
        self.index = (self.index + 1) % self.log.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventLogIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn machine_id() -> MachineId {
        SlotMap::<MachineId, ()>::with_key().insert(())
    }

    fn completed(tick: Ticks) -> Event {
        Event::ProductionCompleted {
            machine: machine_id(),
            recipe: RecipeId(0),
            tick,
        }
    }

    #[test]
    fn ring_drops_oldest() {
        let mut log = EventLog::new(3);
        for tick in 0..5 {
            log.push(completed(tick));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.total_written(), 5);
        assert_eq!(log.dropped_count(), 2);
        let ticks: Vec<_> = log.iter().map(Event::tick).collect();
        assert_eq!(ticks, vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_clamped() {
        let mut log = EventLog::new(0);
        log.push(completed(1));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn suppressed_kind_not_recorded() {
        let mut log = EventLog::new(8);
        log.suppress(EventKind::ProductionCompleted);
        log.push(completed(1));
        assert!(log.is_empty());
        log.unsuppress(EventKind::ProductionCompleted);
        log.push(completed(2));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn at_tick_filters() {
        let mut log = EventLog::new(8);
        log.push(completed(1));
        log.push(completed(2));
        log.push(completed(2));
        assert_eq!(log.at_tick(2).count(), 2);
    }

    #[test]
    fn display_is_owned_text() {
        let mut stockpiles = SlotMap::<StockpileId, ()>::with_key();
        let s = stockpiles.insert(());
        let event = Event::ReplenishmentOrdered {
            order: OrderId(3),
            stockpile: s,
            material: Material::SpindledWireCoil,
            quantity: 5,
            tick: 7,
        };
        let first = event.to_string();
        let second = completed(8).to_string();
        assert!(first.starts_with("[t7] S"), "got: {first}");
        assert!(first.ends_with("placed RO3 for 5 spindled_wire_coil"), "got: {first}");
        assert!(second.contains("completed recipe#0"), "got: {second}");
    }
}
