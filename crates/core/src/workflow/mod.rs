//! Maker-checker workflow for configuration and monetary mutations.
//!
//! # Modules
//!
//! - `types` - Instances, mutation requests and resolution actions
//! - `error` - Workflow-specific error types
//! - `service` - State transitions and the checker authorization rule
//! - `ledger` - Gateway used to post approved monetary requests
//! - `engine` - `WorkflowEngine` (submit, approve, reject, queues)

pub mod engine;
pub mod error;
pub mod ledger;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use engine::{WorkflowDeps, WorkflowEngine};
pub use error::WorkflowError;
pub use ledger::{
    LedgerError, LedgerGateway, PostingInstruction, PostingReceipt, RecordingLedger,
    UnconfiguredLedger,
};
pub use service::WorkflowService;
pub use types::{
    AppliedMutation, InstanceStatus, MutationRequest, WorkflowAction, WorkflowInstance,
    WorkflowOutcome,
};
