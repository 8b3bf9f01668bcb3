//! # Weight Caches
//!
//! * [`disk`] - read-through disk cache of downloaded resources.
//! * [`weights`] - pretrained weight descriptors and maps.

pub mod disk;
pub mod weights;
