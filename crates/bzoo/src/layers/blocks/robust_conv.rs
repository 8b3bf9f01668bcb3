//! # `RobustConv` / `RobustConv2` - large-kernel depthwise blocks with layer scale.
//!
//! [`RobustConv`]:
//! * a depthwise [`ConvBnAct`] with a large kernel,
//! * a biased pointwise [`Conv2d`],
//! * an optional per-channel layer scale.
//!
//! [`RobustConv2`] replaces the pointwise conv with a [`ConvTranspose2d`]
//! whose kernel and stride equal the depthwise stride; so a strided
//! depthwise conv is undone back to the input resolution.

use crate::compat::conv_shape::conv_transpose1d_output_size;
use crate::errors::{ZooError, expect_positive};
use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::conv_bn_act::{ConvBnAct, ConvBnActConfig, ConvBnActMeta};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::prelude::{Backend, Tensor};

/// Initial value of the layer-scale vector.
pub const DEFAULT_LAYER_SCALE: f64 = 1e-6;

/// Build a layer-scale vector; `None` when `init_value <= 0`.
fn init_layer_scale<B: Backend>(
    init_value: f64,
    channels: usize,
    device: &B::Device,
) -> Option<Param<Tensor<B, 1>>> {
    (init_value > 0.0)
        .then(|| Param::from_tensor(Tensor::ones([channels], device).mul_scalar(init_value)))
}

/// Multiply ``[batch, channels, height, width]`` by a per-channel scale.
fn apply_layer_scale<B: Backend>(
    x: Tensor<B, 4>,
    gamma: &Option<Param<Tensor<B, 1>>>,
) -> Tensor<B, 4> {
    match gamma {
        Some(gamma) => {
            let channels = gamma.dims()[0];
            x * gamma.val().reshape([1, channels, 1, 1])
        }
        None => x,
    }
}

fn depthwise_config(
    channels: usize,
    kernel_size: usize,
    stride: usize,
    padding: Option<usize>,
    act: &ActivationConfig,
) -> ConvBnActConfig {
    ConvBnActConfig::new(channels, channels)
        .with_kernel_size([kernel_size, kernel_size])
        .with_stride(stride)
        .with_padding(padding.map(|p| [p, p]))
        .with_groups(channels)
        .with_act(act.clone())
}

/// [`RobustConv`] Config.
#[derive(Config, Debug)]
pub struct RobustConvConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Depthwise kernel size.
    #[config(default = 7)]
    pub kernel_size: usize,

    /// Depthwise stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Explicit depthwise padding; "same" padding when `None`.
    #[config(default = "None")]
    pub padding: Option<usize>,

    /// [`crate::layers::activation::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,

    /// Layer-scale init value; no layer scale when <= 0.
    #[config(default = "DEFAULT_LAYER_SCALE")]
    pub layer_scale_init_value: f64,
}

impl RobustConvConfig {
    /// Initialize a [`RobustConv`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<RobustConv<B>, ZooError> {
        expect_positive("out_channels", self.out_channels)?;

        Ok(RobustConv {
            conv_dw: depthwise_config(
                self.in_channels,
                self.kernel_size,
                self.stride,
                self.padding,
                &self.act,
            )
            .init(device)?,
            conv1x1: Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1])
                .with_bias(true)
                .init(device),
            gamma: init_layer_scale(self.layer_scale_init_value, self.out_channels, device),
        })
    }
}

/// Depthwise large-kernel conv, pointwise projection, and layer scale.
#[derive(Module, Debug)]
pub struct RobustConv<B: Backend> {
    /// Depthwise conv block.
    pub conv_dw: ConvBnAct<B>,

    /// Pointwise projection.
    pub conv1x1: Conv2d<B>,

    /// Optional per-channel layer scale.
    pub gamma: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> RobustConv<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.conv_dw.in_channels()
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.conv1x1.weight.shape().dims[0]
    }

    /// Output resolution for an input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.conv_dw.output_resolution(input_resolution)
    }

    /// Forward Pass.
    ///
    /// ```rust,ignore
    /// let y = self.conv1x1(self.conv_dw(input));
    /// if let Some(gamma) = self.gamma { y * gamma } else { y }
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
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let y = self.conv1x1.forward(self.conv_dw.forward(input));
        let y = apply_layer_scale(y, &self.gamma);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &y,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        y
    }
}

/// [`RobustConv2`] Config.
#[derive(Config, Debug)]
pub struct RobustConv2Config {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Depthwise kernel size.
    #[config(default = 7)]
    pub kernel_size: usize,

    /// Depthwise stride; also the transposed conv kernel and stride.
    #[config(default = 4)]
    pub stride: usize,

    /// Explicit depthwise padding; "same" padding when `None`.
    #[config(default = "None")]
    pub padding: Option<usize>,

    /// [`crate::layers::activation::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,

    /// Layer-scale init value; no layer scale when <= 0.
    #[config(default = "DEFAULT_LAYER_SCALE")]
    pub layer_scale_init_value: f64,
}

impl RobustConv2Config {
    /// Initialize a [`RobustConv2`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<RobustConv2<B>, ZooError> {
        expect_positive("out_channels", self.out_channels)?;
        let stride = expect_positive("stride", self.stride)?;

        Ok(RobustConv2 {
            conv_strided: depthwise_config(
                self.in_channels,
                self.kernel_size,
                stride,
                self.padding,
                &self.act,
            )
            .init(device)?,
            conv_deconv: ConvTranspose2dConfig::new(
                [self.in_channels, self.out_channels],
                [stride, stride],
            )
            .with_stride([stride, stride])
            .with_bias(true)
            .init(device),
            gamma: init_layer_scale(self.layer_scale_init_value, self.out_channels, device),
        })
    }
}

/// Strided depthwise conv, transposed-conv upsampling, and layer scale.
#[derive(Module, Debug)]
pub struct RobustConv2<B: Backend> {
    /// Strided depthwise conv block.
    pub conv_strided: ConvBnAct<B>,

    /// Upsampling transposed conv.
    pub conv_deconv: ConvTranspose2d<B>,

    /// Optional per-channel layer scale.
    pub gamma: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> RobustConv2<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.conv_strided.in_channels()
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.conv_deconv.weight.shape().dims[1] * self.conv_deconv.groups
    }

    /// Output resolution for an input resolution.
    ///
    /// Equal to the input resolution when it is a multiple of the stride
    /// and the depthwise padding is "same".
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        let [h, w] = self.conv_strided.output_resolution(input_resolution);
        let stride = self.conv_deconv.stride;
        let kernel = self.conv_deconv.kernel_size;
        [
            conv_transpose1d_output_size(h, kernel[0], stride[0], 0, 0, 1),
            conv_transpose1d_output_size(w, kernel[1], stride[1], 0, 0, 1),
        ]
    }

    /// Forward Pass.
    ///
    /// ```rust,ignore
    /// let y = self.conv_deconv(self.conv_strided(input));
    /// if let Some(gamma) = self.gamma { y * gamma } else { y }
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
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let y = self.conv_deconv.forward(self.conv_strided.forward(input));
        let y = apply_layer_scale(y, &self.gamma);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &y,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        y
    }
}
