//! # `ConvBnAct` - conv/batch-norm/activation block.
//!
//! A [`ConvBnAct`] module is:
//! * a [`Conv2d`] layer with "same" padding,
//! * an optional [`Normalization`] layer,
//! * an [`Activation`] layer,
//! * an optional residual connection; projected through a 1x1
//!   [`IdentityProjection`] when the input and output shapes differ.
//!
//! Output channels are rounded with [`round_channels`] before any layer is
//! built, so parameter shapes match checkpoints built the same way.

use crate::compat::conv_shape::expect_conv_output_shape;
use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use crate::errors::{ZooError, expect_positive};
use crate::layers::activation::{Activation, ActivationConfig};
use crate::layers::blocks::padding::{autopad, round_channels};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`ConvBnAct`] Meta.
pub trait ConvBnActMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels, after rounding.
    fn out_channels(&self) -> usize;

    /// Number of groups.
    fn groups(&self) -> usize;

    /// Kernel size.
    fn kernel_size(&self) -> [usize; 2];

    /// Stride, on both spatial dims.
    fn stride(&self) -> usize;

    /// Dilation, on both spatial dims.
    fn dilation(&self) -> usize;

    /// Effective padding.
    fn padding(&self) -> [usize; 2];

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the input is too small for the kernel.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        let stride = self.stride();
        let dilation = self.dilation();
        expect_conv_output_shape(
            input_resolution,
            self.kernel_size(),
            [stride, stride],
            self.padding(),
            [dilation, dilation],
        )
    }
}

/// [`ConvBnAct`] Config.
///
/// Implements [`ConvBnActMeta`].
#[derive(Config, Debug)]
pub struct ConvBnActConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Requested output channels; rounded by `channel_divisor`.
    pub out_channels: usize,

    /// Kernel size.
    #[config(default = "[1, 1]")]
    pub kernel_size: [usize; 2],

    /// Stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Explicit padding; "same" padding when `None`.
    #[config(default = "None")]
    pub padding: Option<[usize; 2]>,

    /// Number of groups.
    #[config(default = 1)]
    pub groups: usize,

    /// Conv bias; when `None`, enabled iff `use_bn` is false.
    #[config(default = "None")]
    pub bias: Option<bool>,

    /// [`Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,

    /// Dilation.
    #[config(default = 1)]
    pub dilation: usize,

    /// Add a skip connection.
    #[config(default = false)]
    pub residual: bool,

    /// Apply normalization after the conv.
    #[config(default = true)]
    pub use_bn: bool,

    /// [`Normalization`] config; the feature size is replaced.
    #[config(default = "NormalizationConfig::batch()")]
    pub norm: NormalizationConfig,

    /// Round the output channels to a multiple of this.
    #[config(default = 1)]
    pub channel_divisor: usize,
}

impl ConvBnActMeta for ConvBnActConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        round_channels(self.out_channels, self.channel_divisor)
    }

    fn groups(&self) -> usize {
        self.groups
    }

    fn kernel_size(&self) -> [usize; 2] {
        self.kernel_size
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn dilation(&self) -> usize {
        self.dilation
    }

    fn padding(&self) -> [usize; 2] {
        autopad(self.kernel_size, self.padding, self.dilation)
    }
}

impl ConvBnActConfig {
    /// Set a square kernel.
    pub fn with_kernel(
        self,
        kernel: usize,
    ) -> Self {
        self.with_kernel_size([kernel, kernel])
    }

    /// The effective conv bias flag.
    pub fn effective_bias(&self) -> bool {
        self.bias.unwrap_or(!self.use_bn)
    }

    /// Does this block need a 1x1 projection on the skip connection?
    pub fn needs_projection(&self) -> bool {
        self.residual && (self.in_channels != self.out_channels() || self.stride != 1)
    }

    fn validate(&self) -> Result<(), ZooError> {
        expect_positive("in_channels", self.in_channels)?;
        expect_positive("out_channels", self.out_channels)?;
        expect_positive("kernel_size[0]", self.kernel_size[0])?;
        expect_positive("kernel_size[1]", self.kernel_size[1])?;
        expect_positive("stride", self.stride)?;
        expect_positive("groups", self.groups)?;
        expect_positive("dilation", self.dilation)?;
        expect_positive("channel_divisor", self.channel_divisor)?;
        Ok(())
    }

    /// Initialize a [`ConvBnAct`].
    ///
    /// # Errors
    ///
    /// [`ZooError::InvalidConfig`] for zero sizes; group/channel
    /// divisibility is checked by ``burn``, which panics.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ConvBnAct<B>, ZooError> {
        self.validate()?;

        let in_channels = self.in_channels;
        let out_channels = self.out_channels();
        if out_channels != self.out_channels {
            tracing::debug!(
                requested = self.out_channels,
                rounded = out_channels,
                divisor = self.channel_divisor,
                "ConvBnAct: rounded output channels"
            );
        }

        let bias = self.effective_bias();
        let [pad_h, pad_w] = self.padding();

        let conv = Conv2dConfig::new([in_channels, out_channels], self.kernel_size)
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(pad_h, pad_w))
            .with_dilation([self.dilation, self.dilation])
            .with_groups(self.groups)
            .with_bias(bias)
            .init(device);

        let bn = self.build_norm(out_channels, device);

        let identity_conv = if self.needs_projection() {
            tracing::debug!(
                in_channels,
                out_channels,
                stride = self.stride,
                "ConvBnAct: residual projection"
            );
            let [proj_h, proj_w] = autopad([1, 1], self.padding, 1);
            Some(IdentityProjection {
                conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                    .with_stride([self.stride, self.stride])
                    .with_padding(PaddingConfig2d::Explicit(proj_h, proj_w))
                    .with_bias(bias)
                    .init(device),
                bn: self.build_norm(out_channels, device),
            })
        } else {
            None
        };

        Ok(ConvBnAct {
            conv,
            bn,
            act: self.act.init(device),
            residual: self.residual,
            identity_conv,
        })
    }

    fn build_norm<B: Backend>(
        &self,
        features: usize,
        device: &B::Device,
    ) -> Option<Normalization<B>> {
        self.use_bn
            .then(|| self.norm.clone().with_num_features(features).init(device))
    }
}

/// 1x1 conv (+ norm) projecting a skip connection to the block's output shape.
///
/// Shares the block's stride and explicit padding; unpadded otherwise.
#[derive(Module, Debug)]
pub struct IdentityProjection<B: Backend> {
    /// 1x1 conv, with the block's stride.
    pub conv: Conv2d<B>,

    /// Optional norm.
    pub bn: Option<Normalization<B>>,
}

impl<B: Backend> IdentityProjection<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        match &self.bn {
            Some(bn) => bn.forward(x),
            None => x,
        }
    }
}

/// Sequenced conv/norm/activation block, with optional skip connection.
///
/// Implements [`ConvBnActMeta`].
#[derive(Module, Debug)]
pub struct ConvBnAct<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Optional norm layer.
    pub bn: Option<Normalization<B>>,

    /// Activation layer.
    pub act: Activation<B>,

    /// Add the (possibly projected) input to the output.
    pub residual: bool,

    /// Skip-connection projection; present iff the skip changes shape.
    pub identity_conv: Option<IdentityProjection<B>>,
}

impl<B: Backend> ConvBnActMeta for ConvBnAct<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.groups()
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn kernel_size(&self) -> [usize; 2] {
        let dims = self.conv.weight.shape().dims;
        [dims[2], dims[3]]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }

    fn dilation(&self) -> usize {
        self.conv.dilation[0]
    }

    fn padding(&self) -> [usize; 2] {
        match &self.conv.padding.0 {
            PaddingConfig2d::Explicit(h, w) => [*h, *w],
            PaddingConfig2d::Valid => [0, 0],
            PaddingConfig2d::Same => autopad(self.kernel_size(), None, self.dilation()),
        }
    }
}

impl<B: Backend> ConvBnAct<B> {
    /// Forward Pass.
    ///
    /// ```rust,ignore
    /// let x = self.act(self.bn(self.conv(input)));
    /// if self.residual { x + identity(input) } else { x }
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
        self.forward_impl(input, true)
    }

    /// Fused Forward Pass.
    ///
    /// As [`ConvBnAct::forward`], but skips the norm layer; for use after the
    /// norm has been folded into the conv weights (see [`ConvBnAct::fuse_norm`]).
    pub fn forward_fused(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.forward_impl(input, false)
    }

    fn forward_impl(
        &self,
        input: Tensor<B, 4>,
        apply_norm: bool,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let identity = if self.residual {
            Some(match &self.identity_conv {
                Some(projection) => projection.forward(input.clone()),
                None => input.clone(),
            })
        } else {
            None
        };

        let x = self.conv.forward(input);
        let x = match (&self.bn, apply_norm) {
            (Some(bn), true) => bn.forward(x),
            _ => x,
        };
        let x = self.act.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        match identity {
            Some(identity) => x + identity,
            None => x,
        }
    }

    /// Fold the batch-norm statistics into the conv, and drop the norm.
    ///
    /// ```text
    /// scale = gamma / sqrt(running_var + epsilon)
    /// weight' = weight * scale
    /// bias' = beta + (bias - running_mean) * scale
    /// ```
    ///
    /// The result's [`ConvBnAct::forward`] matches the inference-mode
    /// forward of the original. The skip projection keeps its norm.
    /// Blocks without a norm are returned unchanged.
    ///
    /// # Errors
    ///
    /// [`ZooError::InvalidConfig`] if the norm is not a batch norm.
    pub fn fuse_norm(self) -> Result<Self, ZooError> {
        let (weight, bias) = match &self.bn {
            None => return Ok(self),
            Some(norm) => {
                let bn = norm.as_batch().ok_or_else(|| {
                    ZooError::invalid_config("only batch norm can be folded into a conv")
                })?;

                let weight = self.conv.weight.val();
                let out_channels = weight.dims()[0];

                let scale = bn.gamma.val() / bn.running_var.value().add_scalar(bn.epsilon).sqrt();

                let bias = match &self.conv.bias {
                    Some(bias) => bias.val(),
                    None => Tensor::zeros([out_channels], &weight.device()),
                };
                let bias = bn.beta.val() + (bias - bn.running_mean.value()) * scale.clone();
                let weight = weight * scale.reshape([out_channels, 1, 1, 1]);

                (weight, bias)
            }
        };

        let mut conv = self.conv;
        conv.weight = Param::from_tensor(weight);
        conv.bias = Some(Param::from_tensor(bias));

        Ok(Self {
            conv,
            bn: None,
            ..self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_all_zero, assert_close};
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::RunningState;
    use burn::nn::GroupNormConfig;
    use burn::tensor::Distribution;
    use hamcrest::prelude::*;

    type B = NdArray<f32>;

    #[test]
    fn test_config_meta() {
        let config = ConvBnActConfig::new(3, 12)
            .with_kernel(3)
            .with_stride(2)
            .with_channel_divisor(8);

        assert_that!(config.in_channels(), is(equal_to(3)));
        assert_that!(config.out_channels(), is(equal_to(16)));
        assert_eq!(config.kernel_size(), [3, 3]);
        assert_eq!(config.padding(), [1, 1]);
        assert_eq!(config.output_resolution([32, 32]), [16, 16]);

        let config = config.with_dilation(2).with_stride(1);
        assert_eq!(config.padding(), [2, 2]);
        assert_eq!(config.output_resolution([32, 32]), [32, 32]);

        let config = config.with_padding(Some([0, 0]));
        assert_eq!(config.output_resolution([32, 32]), [28, 28]);
    }

    #[test]
    fn test_bias_defaults() {
        let config = ConvBnActConfig::new(4, 4);
        assert!(!config.effective_bias());
        assert!(config.clone().with_use_bn(false).effective_bias());
        assert!(config.clone().with_bias(Some(true)).effective_bias());

        let device = Default::default();
        let block: ConvBnAct<B> = config.init(&device).unwrap();
        assert!(block.conv.bias.is_none());
        assert!(block.bn.is_some());

        let block: ConvBnAct<B> = ConvBnActConfig::new(4, 4)
            .with_use_bn(false)
            .init(&device)
            .unwrap();
        assert!(block.conv.bias.is_some());
        assert!(block.bn.is_none());
    }

    #[test]
    fn test_invalid_config() {
        let device = Default::default();
        for config in [
            ConvBnActConfig::new(4, 4).with_channel_divisor(0),
            ConvBnActConfig::new(0, 4),
            ConvBnActConfig::new(4, 4).with_stride(0),
            ConvBnActConfig::new(4, 4).with_kernel(0),
        ] {
            let result: Result<ConvBnAct<B>, _> = config.init(&device);
            assert!(matches!(result, Err(ZooError::InvalidConfig { .. })));
        }
    }

    #[test]
    fn test_zero_input_end_to_end() {
        let device = Default::default();
        let block: ConvBnAct<B> = ConvBnActConfig::new(3, 16)
            .with_kernel(3)
            .with_act("relu".parse().unwrap())
            .init(&device)
            .unwrap();

        let input = Tensor::zeros([1, 3, 32, 32], &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [1, 16, 32, 32]);
        assert_all_zero(output);
    }

    #[test]
    fn test_forward_matches_layers() {
        let device = Default::default();
        let block: ConvBnAct<B> = ConvBnActConfig::new(2, 4)
            .with_kernel(3)
            .with_stride(2)
            .with_act(ActivationConfig::Silu)
            .init(&device)
            .unwrap();
        assert_eq!(block.in_channels(), 2);
        assert_eq!(block.out_channels(), 4);
        assert_eq!(block.stride(), 2);
        assert_eq!(block.padding(), [1, 1]);

        let input = Tensor::random([2, 2, 10, 10], Distribution::Default, &device);

        let expected = {
            let x = block.conv.forward(input.clone());
            let x = block.bn.as_ref().unwrap().forward(x);
            block.act.forward(x)
        };
        let output = block.forward(input.clone());
        assert_eq!(output.dims(), [2, 4, 5, 5]);
        output.to_data().assert_eq(&expected.to_data(), true);

        let expected_fused = block.act.forward(block.conv.forward(input.clone()));
        block
            .forward_fused(input)
            .to_data()
            .assert_eq(&expected_fused.to_data(), true);
    }

    #[test]
    fn test_residual_without_projection() {
        let device = Default::default();
        let config = ConvBnActConfig::new(4, 4).with_kernel(3).with_residual(true);
        assert!(!config.needs_projection());

        let block: ConvBnAct<B> = config.init(&device).unwrap();
        assert!(block.identity_conv.is_none());

        let input = Tensor::random([1, 4, 8, 8], Distribution::Default, &device);
        let expected = {
            let x = block.conv.forward(input.clone());
            let x = block.bn.as_ref().unwrap().forward(x);
            block.act.forward(x) + input.clone()
        };
        assert_close(block.forward(input), expected, 1e-6);
    }

    #[test]
    fn test_residual_projection_on_channels() {
        let device = Default::default();
        let config = ConvBnActConfig::new(4, 8).with_kernel(3).with_residual(true);
        assert!(config.needs_projection());

        let block: ConvBnAct<B> = config.init(&device).unwrap();
        let projection = block.identity_conv.as_ref().unwrap();
        assert_eq!(projection.conv.weight.val().dims(), [8, 4, 1, 1]);
        assert!(projection.bn.is_some());

        let input = Tensor::random([1, 4, 8, 8], Distribution::Default, &device);
        let expected = {
            let x = block.conv.forward(input.clone());
            let x = block.bn.as_ref().unwrap().forward(x);
            block.act.forward(x) + projection.forward(input.clone())
        };
        assert_close(block.forward(input), expected, 1e-6);
    }

    #[test]
    fn test_residual_projection_on_stride() {
        let device = Default::default();
        let config = ConvBnActConfig::new(4, 4)
            .with_kernel(3)
            .with_stride(2)
            .with_use_bn(false)
            .with_residual(true);
        assert!(config.needs_projection());

        let block: ConvBnAct<B> = config.init(&device).unwrap();
        let projection = block.identity_conv.as_ref().unwrap();
        assert!(projection.bn.is_none());
        assert!(projection.conv.bias.is_some());

        let input = Tensor::random([2, 4, 8, 8], Distribution::Default, &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "out_channels", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_channels", 4),
                ("out_height", 4),
                ("out_width", 4)
            ],
        );
    }

    #[test]
    fn test_residual_projection_with_explicit_padding() {
        let device = Default::default();
        let block: ConvBnAct<B> = ConvBnActConfig::new(4, 8)
            .with_padding(Some([1, 1]))
            .with_residual(true)
            .init(&device)
            .unwrap();

        let projection = block.identity_conv.as_ref().unwrap();
        match &projection.conv.padding.0 {
            PaddingConfig2d::Explicit(h, w) => assert_eq!([*h, *w], [1, 1]),
            other => panic!("unexpected projection padding: {other:?}"),
        }

        let input = Tensor::random([1, 4, 8, 8], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_eq!(output.dims(), [1, 8, 10, 10]);

        let expected = {
            let x = block.conv.forward(input.clone());
            let x = block.bn.as_ref().unwrap().forward(x);
            block.act.forward(x) + projection.forward(input)
        };
        assert_close(output, expected, 1e-6);
    }

    fn perturb_batch_norm(block: &mut ConvBnAct<B>) {
        let device = Default::default();
        match block.bn.as_mut() {
            Some(Normalization::Batch(bn)) => {
                bn.gamma = Param::from_tensor(Tensor::from_data([0.5, 2.0, -1.0], &device));
                bn.beta = Param::from_tensor(Tensor::from_data([0.1, -0.2, 0.3], &device));
                bn.running_mean = RunningState::new(Tensor::from_data([0.25, -0.5, 1.0], &device));
                bn.running_var = RunningState::new(Tensor::from_data([1.5, 0.5, 2.0], &device));
            }
            _ => panic!("expected batch norm"),
        }
    }

    #[test]
    fn test_fuse_norm() {
        let device = Default::default();
        for bias in [false, true] {
            let mut block: ConvBnAct<B> = ConvBnActConfig::new(2, 3)
                .with_kernel(3)
                .with_bias(Some(bias))
                .with_act(ActivationConfig::Identity)
                .init(&device)
                .unwrap();
            perturb_batch_norm(&mut block);

            let input = Tensor::random([2, 2, 6, 6], Distribution::Default, &device);
            let expected = block.forward(input.clone());

            let fused = block.fuse_norm().unwrap();
            assert!(fused.bn.is_none());
            assert!(fused.conv.bias.is_some());

            assert_close(fused.forward(input.clone()), expected.clone(), 1e-4);
            assert_close(fused.forward_fused(input), expected, 1e-4);
        }
    }

    #[test]
    fn test_fuse_norm_without_norm() {
        let device = Default::default();
        let block: ConvBnAct<B> = ConvBnActConfig::new(2, 3)
            .with_use_bn(false)
            .init(&device)
            .unwrap();
        let weight = block.conv.weight.val();

        let fused = block.fuse_norm().unwrap();
        fused
            .conv
            .weight
            .val()
            .to_data()
            .assert_eq(&weight.to_data(), true);
    }

    #[test]
    fn test_fuse_group_norm_fails() {
        let device = Default::default();
        let block: ConvBnAct<B> = ConvBnActConfig::new(2, 4)
            .with_norm(GroupNormConfig::new(2, 0).into())
            .init(&device)
            .unwrap();
        assert!(matches!(
            block.fuse_norm(),
            Err(ZooError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_autodiff_forward() {
        type AB = Autodiff<NdArray<f32>>;
        let device = Default::default();
        let block: ConvBnAct<AB> = ConvBnActConfig::new(3, 8)
            .with_kernel(3)
            .with_act(ActivationConfig::HardSwish)
            .with_residual(true)
            .init(&device)
            .unwrap();

        let input = Tensor::random([2, 3, 8, 8], Distribution::Default, &device);
        let output = block.forward(input);
        assert_eq!(output.dims(), [2, 8, 8, 8]);
    }
}
