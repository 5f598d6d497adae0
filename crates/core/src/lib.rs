//! Cadenza domain vocabulary -- model tiers, generation status, transaction
//! kinds, the token cost model, and display formatting.
//!
//! This crate is pure: no I/O, no async, no clocks. Everything here is a
//! total function over the domain types, shared by the storage records, the
//! generation engine, and the CLI surface.

pub mod cost;
pub mod format;
pub mod model;

pub use cost::{cost, duration_in_bounds};
pub use model::{GenerationStatus, ModelTier, ParseTierError, TransactionKind};
