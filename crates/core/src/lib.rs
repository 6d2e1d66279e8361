//! `brightpath-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every bounded
//! context (no infrastructure concerns).

pub mod context;
pub mod error;
pub mod id;

pub use context::BoundedContext;
pub use error::{DomainError, DomainResult};
pub use id::{CorrelationId, EventId};
