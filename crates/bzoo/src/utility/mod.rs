//! # Utilities
//!
//! * [`checkpoint`] - loading ``torch`` checkpoints onto zoo blocks.

pub mod checkpoint;
