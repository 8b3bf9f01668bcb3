//! # Activation Layers
//!
//! * [`activation_wrapper::ActivationConfig`] - the activation registry.
//! * [`activation_wrapper::Activation`] - wrapped activation module.
//! * [`stateless`] - activations not provided by ``burn::nn``.

pub mod activation_wrapper;
pub mod stateless;

pub use activation_wrapper::{Activation, ActivationConfig};
