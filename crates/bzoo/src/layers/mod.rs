//! Reusable neural network modules.
pub mod activation;
pub mod blocks;
