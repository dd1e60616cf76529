//! `SeaORM` entity definitions.
//!
//! Status and type columns are stored as the same upper/snake-case strings
//! the core types serialize to; repositories convert at the boundary.

pub mod audit_log;
pub mod batch_records;
pub mod config_active_pointers;
pub mod config_versions;
pub mod workflow_instances;
