//! Background job registry for the hardware agent.
//!
//! Tracks detached processes in a durable ledger, reconciles recorded status
//! against the live process table, and exposes the probe/signal seam the
//! executor uses to stop jobs.

pub mod job_events;
pub mod job_record;
pub mod job_registry;
pub mod job_store;
pub mod process_probe;

pub use job_events::*;
pub use job_record::*;
pub use job_registry::*;
pub use job_store::*;
pub use process_probe::*;
