//! Common types used across the application.

pub mod id;
pub mod identity;
pub mod money;
pub mod pagination;

pub use id::*;
pub use identity::{ActorId, Role};
pub use money::{Currency, Money};
pub use pagination::{PageRequest, PageResponse};
