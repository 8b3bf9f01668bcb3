//! # `Focus` - space-to-depth stem.
//!
//! Moves each 2x2 spatial neighborhood into channels, then applies a
//! [`ConvBnAct`] over the ``4 * in_channels`` result.

use crate::errors::ZooError;
use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::conv_bn_act::{ConvBnAct, ConvBnActConfig, ConvBnActMeta};
use bimm_contracts::unpack_shape_contract;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// Fold 2x2 spatial blocks into channels.
///
/// Channel blocks are ordered:
/// 1. even rows, even cols;
/// 2. odd rows, even cols;
/// 3. even rows, odd cols;
/// 4. odd rows, odd cols.
///
/// # Arguments
///
/// - `input`: ``[batch, channels, height, width]``; `height` and `width` even.
///
/// # Returns
///
/// ``[batch, 4 * channels, height / 2, width / 2]``
pub fn space_to_depth<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    let [batch, channels, half_height, half_width] = unpack_shape_contract!(
        [
            "batch",
            "channels",
            "height" = "half_height" * "fold",
            "width" = "half_width" * "fold"
        ],
        &input,
        &["batch", "channels", "half_height", "half_width"],
        &[("fold", 2)]
    );

    input
        .reshape([batch, channels, half_height, 2, half_width, 2])
        // [batch, col_parity, row_parity, channels, half_height, half_width]
        .permute([0, 5, 3, 1, 2, 4])
        .reshape([batch, 4 * channels, half_height, half_width])
}

/// [`Focus`] Config.
#[derive(Config, Debug)]
pub struct FocusConfig {
    /// Number of input channels, before space-to-depth.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Kernel size.
    #[config(default = 1)]
    pub kernel_size: usize,

    /// Stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Explicit padding; "same" padding when `None`.
    #[config(default = "None")]
    pub padding: Option<usize>,

    /// Number of groups.
    #[config(default = 1)]
    pub groups: usize,

    /// [`crate::layers::activation::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl FocusConfig {
    /// The [`ConvBnActConfig`] applied after space-to-depth.
    pub fn conv_config(&self) -> ConvBnActConfig {
        ConvBnActConfig::new(4 * self.in_channels, self.out_channels)
            .with_kernel_size([self.kernel_size, self.kernel_size])
            .with_stride(self.stride)
            .with_padding(self.padding.map(|p| [p, p]))
            .with_groups(self.groups)
            .with_act(self.act.clone())
    }

    /// Initialize a [`Focus`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<Focus<B>, ZooError> {
        Ok(Focus {
            conv: self.conv_config().init(device)?,
        })
    }
}

/// Space-to-depth followed by a [`ConvBnAct`].
#[derive(Module, Debug)]
pub struct Focus<B: Backend> {
    /// Conv over the ``4 * in_channels`` folded input.
    pub conv: ConvBnAct<B>,
}

impl<B: Backend> Focus<B> {
    /// Number of input channels, before space-to-depth.
    pub fn in_channels(&self) -> usize {
        self.conv.in_channels() / 4
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.conv.out_channels()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``; `height` and `width` even.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.conv.forward(space_to_depth(input))
    }
}
