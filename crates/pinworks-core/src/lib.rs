//! Pinworks Core -- a tick-based production economy for a wire-to-pin line.
//!
//! Workers walk a grid, hauling materials between stockpiles and machines.
//! Machines turn inputs into outputs by running recipes while an operator
//! stands by. Stockpiles keep a ledger of what they hold, with earmarks for
//! units already promised to a worker, and a manifest of what they want to
//! hold. Shortfalls become replenishment orders; machine work becomes queued
//! jobs.
//!
//! # Six-Phase Tick Pipeline
//!
//! Each call to [`engine::Engine::step`] advances the simulation by one tick
//! through the following phases:
//!
//! 1. **Scan** -- Stockpiles raise replenishment orders for unmet manifest
//!    entries, at most one new order per stockpile per tick.
//! 2. **Replenishment dispatch** -- Idle workers claim fillable orders and
//!    the sourced units are earmarked.
//! 3. **Job dispatch** -- Remaining idle workers take queued machine jobs.
//! 4. **Machines** -- Production timers advance; finished machines send
//!    their operator to empty the output buffer.
//! 5. **Workers** -- Each worker takes one step or acts on arrival.
//! 6. **Bookkeeping** -- Increment tick counter and compute the state hash.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns every pool and queue; runs the pipeline.
//! - [`catalog::Catalog`] -- Immutable recipes and machine types.
//! - [`stockpile::Stockpile`] -- Ledger with earmarks, plus a manifest.
//! - [`machine::Machine`] -- Production state machine with input and output
//!   buffers.
//! - [`worker::Worker`] -- A hauler whose [`worker::WorkerTask`] carries its
//!   job, stage and load together.
//! - [`replenishment::ReplenishmentTable`] -- Slotted table of orders.
//! - [`event::EventLog`] -- Bounded, human-readable log of what happened.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod fixed;
pub mod id;
pub mod job_queue;
pub mod machine;
pub mod material;
pub mod position;
pub mod query;
pub mod replenishment;
pub mod sim;
pub mod stockpile;
pub mod worker;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use engine::Engine;
pub use error::SimError;
