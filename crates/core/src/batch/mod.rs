//! Batch job scheduling and run history.
//!
//! # Modules
//!
//! - `types` - Run records and statuses
//! - `error` - Scheduler error types
//! - `handler` - `JobHandler`, its context and the closure adapter
//! - `scheduler` - `JobScheduler` (register, trigger, timers, history)

pub mod error;
pub mod handler;
pub mod scheduler;
pub mod types;

pub use error::BatchError;
pub use handler::{ConfigReader, FnJob, JobContext, JobHandler, job_fn};
pub use scheduler::JobScheduler;
pub use types::{BatchRecord, BatchStatus, TriggerSource};
