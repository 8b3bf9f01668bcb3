//! # `DWConv` - depthwise [`ConvBnAct`].
//!
//! A [`ConvBnAct`] with one group per channel; the checkpoint layout is
//! that of the wrapped block.

use crate::errors::ZooError;
use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::conv_bn_act::{ConvBnAct, ConvBnActConfig, ConvBnActMeta};
use burn::config::Config;
use burn::prelude::Backend;

/// A depthwise conv block is a [`ConvBnAct`] with `groups == in_channels`.
pub type DWConv<B> = ConvBnAct<B>;

/// [`DWConv`] Config.
#[derive(Config, Debug)]
pub struct DWConvConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels; must equal `in_channels`.
    pub out_channels: usize,

    /// Kernel size.
    #[config(default = "[1, 1]")]
    pub kernel_size: [usize; 2],

    /// Stride.
    #[config(default = 1)]
    pub stride: usize,

    /// [`crate::layers::activation::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,

    /// Add a skip connection.
    #[config(default = false)]
    pub residual: bool,

    /// Apply batch norm after the conv.
    #[config(default = true)]
    pub use_bn: bool,

    /// Round the output channels to a multiple of this.
    #[config(default = 1)]
    pub channel_divisor: usize,
}

impl DWConvConfig {
    /// Set a square kernel.
    pub fn with_kernel(
        self,
        kernel: usize,
    ) -> Self {
        self.with_kernel_size([kernel, kernel])
    }

    /// The equivalent [`ConvBnActConfig`].
    pub fn to_conv_bn_act(&self) -> ConvBnActConfig {
        ConvBnActConfig::new(self.in_channels, self.out_channels)
            .with_kernel_size(self.kernel_size)
            .with_stride(self.stride)
            .with_groups(self.in_channels)
            .with_act(self.act.clone())
            .with_residual(self.residual)
            .with_use_bn(self.use_bn)
            .with_channel_divisor(self.channel_divisor)
    }

    /// Initialize a [`DWConv`].
    ///
    /// # Errors
    ///
    /// - [`ZooError::ChannelMismatch`] if `in_channels != out_channels`,
    ///   before or after channel rounding.
    /// - Any [`ConvBnActConfig::init`] error.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<DWConv<B>, ZooError> {
        let mismatch = |out_channels| ZooError::ChannelMismatch {
            block: "DWConv",
            in_channels: self.in_channels,
            out_channels,
        };
        if self.in_channels != self.out_channels {
            return Err(mismatch(self.out_channels));
        }

        let config = self.to_conv_bn_act();
        if self.channel_divisor > 0 && config.out_channels() != self.in_channels {
            return Err(mismatch(config.out_channels()));
        }

        config.init(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::prelude::Tensor;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn test_channel_mismatch() {
        let device = Default::default();
        let result: Result<DWConv<B>, _> = DWConvConfig::new(8, 16).init(&device);

        match result {
            Err(err @ ZooError::ChannelMismatch { .. }) => assert_eq!(
                err.to_string(),
                "input and output channel count of DWConv does not match: 8 != 16"
            ),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_rounded_channel_mismatch() {
        let device = Default::default();
        let result: Result<DWConv<B>, _> = DWConvConfig::new(12, 12)
            .with_channel_divisor(8)
            .init(&device);

        assert!(matches!(
            result,
            Err(ZooError::ChannelMismatch {
                in_channels: 12,
                out_channels: 16,
                ..
            })
        ));
    }

    #[test]
    fn test_depthwise() {
        let device = Default::default();
        let block: DWConv<B> = DWConvConfig::new(8, 8)
            .with_kernel(3)
            .with_stride(2)
            .init(&device)
            .unwrap();

        assert_eq!(block.groups(), 8);
        assert_eq!(block.in_channels(), 8);
        assert_eq!(block.out_channels(), 8);
        assert_eq!(block.conv.weight.val().dims(), [8, 1, 3, 3]);

        let input = Tensor::random([2, 8, 16, 16], Distribution::Default, &device);
        assert_eq!(block.forward(input).dims(), [2, 8, 8, 8]);
    }

    #[test]
    fn test_residual() {
        let device = Default::default();
        let block: DWConv<B> = DWConvConfig::new(4, 4)
            .with_kernel(5)
            .with_residual(true)
            .init(&device)
            .unwrap();
        assert!(block.residual);
        assert!(block.identity_conv.is_none());

        let input = Tensor::random([1, 4, 8, 8], Distribution::Default, &device);
        assert_eq!(block.forward(input).dims(), [1, 4, 8, 8]);
    }
}
