//! # `GhostConv` - Ghost Convolution.
//!
//! A primary [`ConvBnAct`] produces `out_channels / shrink_factor` features;
//! a cheap depthwise [`ConvBnAct`] derives the remaining "ghost" features
//! from them; the two are concatenated along channels.
//!
//! When `out_channels` does not split evenly, the block degrades to a
//! single [`ConvBnAct`] with no ghost stage and no residual. A
//! `shrink_factor` of 1 also has no ghost stage, but keeps the residual.
//!
//! See: [GhostNet](https://github.com/huawei-noah/ghostnet)

use crate::errors::{ZooError, expect_positive};
use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::conv_bn_act::{ConvBnAct, ConvBnActConfig, ConvBnActMeta};
use bimm_contracts::assert_shape_contract_periodically;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// [`GhostConv`] Meta.
pub trait GhostConvMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Channels produced by the primary conv; `out_channels` on the fallback path.
    fn primary_channels(&self) -> usize;

    /// Channels produced by the ghost conv; 0 on the fallback path.
    fn ghost_channels(&self) -> usize;

    /// Does this block have a ghost stage?
    fn has_ghost_stage(&self) -> bool {
        self.ghost_channels() > 0
    }
}

/// [`GhostConv`] Config.
#[derive(Config, Debug)]
pub struct GhostConvConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Primary kernel size.
    #[config(default = 1)]
    pub kernel_size: usize,

    /// Primary stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Primary groups.
    #[config(default = 1)]
    pub groups: usize,

    /// [`crate::layers::activation::Activation`] config, for both stages.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,

    /// Ghost (depthwise) kernel size.
    #[config(default = 3)]
    pub dw_kernel_size: usize,

    /// Ghost (depthwise) stride.
    #[config(default = 1)]
    pub dw_stride: usize,

    /// Add the input to the output; requires matching shapes.
    #[config(default = false)]
    pub residual: bool,

    /// Ratio of output channels to primary channels.
    #[config(default = 2)]
    pub shrink_factor: usize,
}

impl GhostConvMeta for GhostConvConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn primary_channels(&self) -> usize {
        match self.split() {
            Some((primary, _)) => primary,
            None => self.out_channels,
        }
    }

    fn ghost_channels(&self) -> usize {
        match self.split() {
            Some((_, ghost)) => ghost,
            None => 0,
        }
    }
}

impl GhostConvConfig {
    /// Split `out_channels` into `(primary, ghost)` channel counts.
    ///
    /// `None` when the split does not sum to `out_channels`.
    fn split(&self) -> Option<(usize, usize)> {
        if self.shrink_factor == 0 {
            return None;
        }
        let primary = self.out_channels / self.shrink_factor;
        let ghost = primary * (self.shrink_factor - 1);
        (primary > 0 && primary + ghost == self.out_channels).then_some((primary, ghost))
    }

    /// Initialize a [`GhostConv`].
    ///
    /// # Errors
    ///
    /// - [`ZooError::InvalidConfig`] if `shrink_factor` is 0.
    /// - Any [`ConvBnActConfig::init`] error.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<GhostConv<B>, ZooError> {
        expect_positive("shrink_factor", self.shrink_factor)?;

        let primary = |out_channels| {
            ConvBnActConfig::new(self.in_channels, out_channels)
                .with_kernel_size([self.kernel_size, self.kernel_size])
                .with_stride(self.stride)
                .with_groups(self.groups)
                .with_act(self.act.clone())
        };

        match self.split() {
            None => {
                tracing::debug!(
                    out_channels = self.out_channels,
                    shrink_factor = self.shrink_factor,
                    "GhostConv: uneven channel split, using a single conv"
                );
                if self.residual {
                    tracing::debug!("GhostConv: residual ignored without a ghost stage");
                }
                Ok(GhostConv {
                    cv1: primary(self.out_channels).init(device)?,
                    cv2: None,
                    residual: false,
                })
            }
            Some((primary_channels, 0)) => Ok(GhostConv {
                cv1: primary(primary_channels).init(device)?,
                cv2: None,
                residual: self.residual,
            }),
            Some((primary_channels, ghost_channels)) => Ok(GhostConv {
                cv1: primary(primary_channels).init(device)?,
                cv2: Some(
                    ConvBnActConfig::new(primary_channels, ghost_channels)
                        .with_kernel_size([self.dw_kernel_size, self.dw_kernel_size])
                        .with_stride(self.dw_stride)
                        .with_groups(primary_channels)
                        .with_act(self.act.clone())
                        .init(device)?,
                ),
                residual: self.residual,
            }),
        }
    }
}

/// Ghost Convolution block.
///
/// Implements [`GhostConvMeta`].
#[derive(Module, Debug)]
pub struct GhostConv<B: Backend> {
    /// Primary conv.
    pub cv1: ConvBnAct<B>,

    /// Ghost conv; absent when there are no ghost channels.
    pub cv2: Option<ConvBnAct<B>>,

    /// Add the input to the output.
    pub residual: bool,
}

impl<B: Backend> GhostConvMeta for GhostConv<B> {
    fn in_channels(&self) -> usize {
        self.cv1.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.primary_channels() + self.ghost_channels()
    }

    fn primary_channels(&self) -> usize {
        self.cv1.out_channels()
    }

    fn ghost_channels(&self) -> usize {
        self.cv2.as_ref().map_or(0, |cv2| cv2.out_channels())
    }
}

impl<B: Backend> GhostConv<B> {
    /// Forward Pass.
    ///
    /// ```rust,ignore
    /// let y = self.cv1(input);
    /// let y = cat([y, self.cv2(y)], channels);
    /// if self.residual { input + y } else { y }
    /// ```
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        assert_shape_contract_periodically!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &[("in_channels", self.in_channels())]
        );

        let y = self.cv1.forward(input.clone());
        let y = match &self.cv2 {
            Some(cv2) => Tensor::cat(vec![y.clone(), cv2.forward(y)], 1),
            None => y,
        };

        if self.residual { input + y } else { y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_close;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use hamcrest::prelude::*;

    type B = NdArray<f32>;

    #[test]
    fn test_config_split() {
        let config = GhostConvConfig::new(16, 32);
        assert_that!(config.primary_channels(), is(equal_to(16)));
        assert_that!(config.ghost_channels(), is(equal_to(16)));
        assert!(config.has_ghost_stage());

        let config = GhostConvConfig::new(16, 30).with_shrink_factor(3);
        assert_eq!(config.primary_channels(), 10);
        assert_eq!(config.ghost_channels(), 20);

        let config = GhostConvConfig::new(16, 31).with_shrink_factor(2);
        assert_eq!(config.primary_channels(), 31);
        assert_eq!(config.ghost_channels(), 0);
        assert!(!config.has_ghost_stage());
    }

    #[test]
    fn test_zero_shrink_factor() {
        let device = Default::default();
        let result: Result<GhostConv<B>, _> = GhostConvConfig::new(8, 8)
            .with_shrink_factor(0)
            .init(&device);
        assert!(matches!(result, Err(ZooError::InvalidConfig { .. })));
    }

    #[test]
    fn test_ghost_forward() {
        let device = Default::default();
        let block: GhostConv<B> = GhostConvConfig::new(8, 16)
            .with_kernel_size(3)
            .init(&device)
            .unwrap();

        let cv2 = block.cv2.as_ref().unwrap();
        assert_eq!(block.cv1.out_channels(), 8);
        assert_eq!(cv2.groups(), 8);
        assert_eq!(cv2.conv.weight.val().dims(), [8, 1, 3, 3]);

        let input = Tensor::random([2, 8, 10, 10], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_eq!(output.dims(), [2, 16, 10, 10]);

        let y = block.cv1.forward(input);
        let expected = Tensor::cat(vec![y.clone(), cv2.forward(y)], 1);
        assert_close(output, expected, 1e-6);
    }

    #[test]
    fn test_ghost_residual() {
        let device = Default::default();
        let block: GhostConv<B> = GhostConvConfig::new(12, 12)
            .with_shrink_factor(3)
            .with_residual(true)
            .init(&device)
            .unwrap();
        assert_eq!(block.primary_channels(), 4);
        assert_eq!(block.ghost_channels(), 8);

        let input = Tensor::random([1, 12, 6, 6], Distribution::Default, &device);
        let output = block.forward(input.clone());

        let y = block.cv1.forward(input.clone());
        let expected = input + Tensor::cat(vec![y.clone(), block.cv2.as_ref().unwrap().forward(y)], 1);
        assert_close(output, expected, 1e-6);
    }

    #[test]
    fn test_unit_shrink_factor() {
        let device = Default::default();
        let config = GhostConvConfig::new(8, 8)
            .with_kernel_size(3)
            .with_shrink_factor(1)
            .with_residual(true);
        assert_eq!(config.primary_channels(), 8);
        assert!(!config.has_ghost_stage());

        let block: GhostConv<B> = config.init(&device).unwrap();
        assert!(block.cv2.is_none());
        assert!(block.residual);
        assert_eq!(block.out_channels(), 8);

        let input = Tensor::random([1, 8, 6, 6], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_close(output, input.clone() + block.cv1.forward(input), 1e-6);

        let block: GhostConv<B> = GhostConvConfig::new(8, 16)
            .with_shrink_factor(1)
            .init(&device)
            .unwrap();
        assert_eq!(block.primary_channels(), 16);
        assert_eq!(
            block
                .forward(Tensor::zeros([1, 8, 4, 4], &device))
                .dims(),
            [1, 16, 4, 4]
        );
    }

    #[test]
    fn test_single_conv_fallback() {
        let device = Default::default();
        let block: GhostConv<B> = GhostConvConfig::new(8, 15)
            .with_residual(true)
            .init(&device)
            .unwrap();

        assert!(block.cv2.is_none());
        assert!(!block.residual);
        assert!(!block.has_ghost_stage());
        assert_eq!(block.out_channels(), 15);

        let input = Tensor::random([1, 8, 6, 6], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_close(output, block.cv1.forward(input), 0.0);
    }
}
