//! Approval policy and role model.
//!
//! # Modules
//!
//! - `roles` - Role hierarchy and the injected actor directory
//! - `resolver` - `ApprovalPolicyResolver`

pub mod resolver;
pub mod roles;

#[cfg(test)]
mod resolver_props;

pub use resolver::{ApprovalPolicyResolver, Policy, PolicyConfigError};
pub use roles::{RoleDirectory, RoleHierarchy, StaticRoleDirectory};
