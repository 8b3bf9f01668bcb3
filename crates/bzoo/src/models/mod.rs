//! # Model Families
//!
//! * [`pretrained`] - registry of published zoo checkpoints.

pub mod pretrained;
