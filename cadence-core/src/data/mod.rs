//! Data layer: timeline alignment and input validation.
//!
//! Bars arrive fully materialized from the caller. Nothing here performs I/O.

pub mod align;
pub mod validate;

pub use align::{BarSlot, Step, Steps, Timeline};
pub use validate::validate_series;
