//! Core types shared across the plait engine.
//!
//! Currently this is the error type and result alias; see [`error`] for the
//! full failure taxonomy.

pub mod error;

pub use error::{PlaitError, Result};
