//! # Training Configuration
//!
//! * [`hyperparams`] - YOLO training hyperparameters.

pub mod hyperparams;
