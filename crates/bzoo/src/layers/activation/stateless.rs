//! # Stateless Activation Modules
//!
//! Elementwise activations which ``burn::nn`` does not ship as modules.
//!
//! Each is parameter-free, and typed by its backend so it can sit in a
//! backend-generic module enum; every block gets its own instance.

use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation;
use core::marker::PhantomData;

macro_rules! stateless_default {
    ($name:ident) => {
        impl<B: Backend> Default for $name<B> {
            fn default() -> Self {
                Self {
                    phantom: PhantomData,
                }
            }
        }
    };
}

/// Pass-through activation.
#[derive(Module, Debug)]
pub struct Identity<B: Backend> {
    phantom: PhantomData<B>,
}

stateless_default!(Identity);

impl<B: Backend> Identity<B> {
    /// Forward pass; returns the input.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        input
    }
}

/// ``ReLU6``: ``min(max(x, 0), 6)``.
#[derive(Module, Debug)]
pub struct Relu6<B: Backend> {
    phantom: PhantomData<B>,
}

stateless_default!(Relu6);

impl<B: Backend> Relu6<B> {
    /// Forward pass.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        input.clamp(0.0, 6.0)
    }
}

/// Slope of the torch-compatible hard sigmoid: ``x / 6 + 1/2``.
pub const HARD_SIGMOID_ALPHA: f64 = 1.0 / 6.0;

/// Offset of the torch-compatible hard sigmoid.
pub const HARD_SIGMOID_BETA: f64 = 0.5;

/// ``HardSwish``: ``x * hard_sigmoid(x)``.
#[derive(Module, Debug)]
pub struct HardSwish<B: Backend> {
    phantom: PhantomData<B>,
}

stateless_default!(HardSwish);

impl<B: Backend> HardSwish<B> {
    /// Forward pass.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        input.clone() * activation::hard_sigmoid(input, HARD_SIGMOID_ALPHA, HARD_SIGMOID_BETA)
    }
}

/// ``SiLU`` (swish): ``x * sigmoid(x)``.
#[derive(Module, Debug)]
pub struct Silu<B: Backend> {
    phantom: PhantomData<B>,
}

stateless_default!(Silu);

impl<B: Backend> Silu<B> {
    /// Forward pass.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        activation::silu(input)
    }
}

/// ``Mish``: ``x * tanh(softplus(x))``.
///
/// See <https://github.com/digantamisra98/Mish>.
#[derive(Module, Debug)]
pub struct Mish<B: Backend> {
    phantom: PhantomData<B>,
}

stateless_default!(Mish);

impl<B: Backend> Mish<B> {
    /// Forward pass.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        input.clone() * activation::softplus(input, 1.0).tanh()
    }
}
