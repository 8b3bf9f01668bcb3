//! # Compat
//!
//! Wrappers and shape arithmetic not yet provided by the pinned ``burn`` release.

pub mod conv_shape;
pub mod normalization_wrapper;
