#![warn(missing_docs)]
//!# bzoo - Burn Model-Zoo Blocks
//!
//! ## Notable Components
//!
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::activation`] - the activation registry.
//!   * [`layers::blocks`] - convolutional blocks.
//!     * [`layers::blocks::conv_bn_act`] - ``Conv2d + Norm + Activation``, with optional skip.
//!     * [`layers::blocks::dw_conv`] - depthwise conv block.
//!     * [`layers::blocks::ghost_conv`] - ghost convolution.
//!     * [`layers::blocks::focus`] - space-to-depth stem.
//!     * [`layers::blocks::robust_conv`] - large-kernel depthwise blocks with layer scale.
//! * [`compat`] - compat code, ported or planned for an upcoming release of ``burn``.
//!   * [`compat::normalization_wrapper::Normalization`] - norm layer abstraction wrapper.
//! * [`cache`] - weight download cache.
//! * [`models`] - published checkpoints.
//! * [`utility::checkpoint`] - loading ``torch`` checkpoints onto blocks.
//! * [`config`] - training hyperparameters.
//! * [`errors`] - [`errors::ZooError`].

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;

pub mod errors;

#[cfg(test)]
pub(crate) mod testing;

pub mod layers;

pub mod cache;
pub mod config;
pub mod models;
pub mod utility;
