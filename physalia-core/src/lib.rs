//! Shared primitives for the Physalia alignment toolkit.
//!
//! `physalia-core` provides the foundation the domain crates build on:
//!
//! - **Error types** — [`PhysaliaError`] and [`Result`] for structured error handling
//! - **Ranges** — [`Range`], the half-open interval type used for all coordinates
//! - **Log-space arithmetic** — [`log_sum_exp`] for stable score combination
//! - **Traits** — [`Scored`] for types carrying an alignment or model score

pub mod error;
pub mod logspace;
pub mod range;
pub mod traits;

pub use error::{PhysaliaError, Result};
pub use logspace::log_sum_exp;
pub use range::Range;
pub use traits::Scored;
