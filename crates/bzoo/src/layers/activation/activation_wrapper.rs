//! # Activation Layer Wrapper
//!
//! [`ActivationConfig`] is the closed set of activations the zoo blocks
//! accept, resolvable from the symbolic names used by published model
//! configs (``"relu"``, ``"hswish"``, ``"leakyrelu_0.1"``, ...).
//!
//! [`ActivationConfig::init`] builds a fresh [`Activation`] module per call.
use crate::errors::ZooError;
use crate::layers::activation::stateless::{
    HARD_SIGMOID_ALPHA, HARD_SIGMOID_BETA, HardSwish, Identity, Mish, Relu6, Silu,
};
use burn::nn::{HardSigmoid, HardSigmoidConfig, LeakyRelu, LeakyReluConfig, Relu, Sigmoid};
use burn::prelude::{Backend, Config, Module, Tensor};
use std::str::FromStr;

/// Negative slope used by every leaky-relu name in the registry.
pub const LEAKY_RELU_SLOPE: f64 = 0.1;

/// [`Activation`] Configuration.
#[derive(Config, Debug)]
pub enum ActivationConfig {
    /// [`Identity`] pass-through; used when no activation is named.
    Identity,

    /// [`Relu`] activation layer.
    Relu,

    /// [`Relu6`] activation layer.
    Relu6,

    /// [`HardSwish`] activation layer.
    HardSwish,

    /// [`Silu`] activation layer.
    Silu,

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyReluConfig),

    /// [`HardSigmoid`] activation layer, ``clamp(x/6 + 1/2, 0, 1)``.
    HardSigmoid,

    /// [`Sigmoid`] activation layer.
    Sigmoid,

    /// [`Mish`] activation layer.
    Mish,
}

impl From<LeakyReluConfig> for ActivationConfig {
    fn from(config: LeakyReluConfig) -> Self {
        Self::LeakyRelu(config)
    }
}

impl PartialEq for ActivationConfig {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        match (self, other) {
            (Self::LeakyRelu(a), Self::LeakyRelu(b)) => a.negative_slope == b.negative_slope,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::Relu
    }
}

impl FromStr for ActivationConfig {
    type Err = ZooError;

    /// Resolve a symbolic activation name.
    ///
    /// The empty string resolves to [`ActivationConfig::Identity`].
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(match name {
            "" => Self::Identity,
            "relu" => Self::Relu,
            "relu6" => Self::Relu6,
            "hswish" | "hardswish" => Self::HardSwish,
            "silu" => Self::Silu,
            "lrelu" | "leakyrelu" | "leakyrelu_0.1" => Self::leaky_relu(),
            "hsigmoid" => Self::HardSigmoid,
            "sigmoid" => Self::Sigmoid,
            "mish" => Self::Mish,
            _ => {
                return Err(ZooError::UnknownActivation {
                    name: name.to_string(),
                });
            }
        })
    }
}

impl ActivationConfig {
    /// The registry's leaky relu, with slope [`LEAKY_RELU_SLOPE`].
    pub fn leaky_relu() -> Self {
        LeakyReluConfig::new()
            .with_negative_slope(LEAKY_RELU_SLOPE)
            .into()
    }

    /// Resolve an optional activation name; `None` is [`ActivationConfig::Identity`].
    pub fn from_name(name: Option<&str>) -> Result<Self, ZooError> {
        match name {
            Some(name) => name.parse(),
            None => Ok(Self::Identity),
        }
    }

    /// The canonical registry name.
    ///
    /// [`ActivationConfig::Identity`] has the empty name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "",
            Self::Relu => "relu",
            Self::Relu6 => "relu6",
            Self::HardSwish => "hardswish",
            Self::Silu => "silu",
            Self::LeakyRelu(_) => "leakyrelu",
            Self::HardSigmoid => "hsigmoid",
            Self::Sigmoid => "sigmoid",
            Self::Mish => "mish",
        }
    }

    /// Initialize a wrapped activation layer.
    pub fn init<B: Backend>(
        &self,
        _device: &B::Device,
    ) -> Activation<B> {
        match self {
            Self::Identity => Activation::Identity(Identity::default()),
            Self::Relu => Activation::Relu(Relu),
            Self::Relu6 => Activation::Relu6(Relu6::default()),
            Self::HardSwish => Activation::HardSwish(HardSwish::default()),
            Self::Silu => Activation::Silu(Silu::default()),
            Self::LeakyRelu(conf) => Activation::LeakyRelu(conf.init()),
            Self::HardSigmoid => Activation::HardSigmoid(
                HardSigmoidConfig::new()
                    .with_alpha(HARD_SIGMOID_ALPHA)
                    .with_beta(HARD_SIGMOID_BETA)
                    .init(),
            ),
            Self::Sigmoid => Activation::Sigmoid(Sigmoid),
            Self::Mish => Activation::Mish(Mish::default()),
        }
    }
}

/// Activation Layer Wrapper.
///
/// Every variant is stateless.
#[derive(Module, Debug)]
pub enum Activation<B: Backend> {
    /// [`Identity`] pass-through.
    Identity(Identity<B>),

    /// [`Relu`] activation layer.
    Relu(Relu),

    /// [`Relu6`] activation layer.
    Relu6(Relu6<B>),

    /// [`HardSwish`] activation layer.
    HardSwish(HardSwish<B>),

    /// [`Silu`] activation layer.
    Silu(Silu<B>),

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyRelu),

    /// [`HardSigmoid`] activation layer.
    HardSigmoid(HardSigmoid),

    /// [`Sigmoid`] activation layer.
    Sigmoid(Sigmoid),

    /// [`Mish`] activation layer.
    Mish(Mish<B>),
}

impl<B: Backend> Activation<B> {
    /// Forward pass.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Activation::Identity(layer) => layer.forward(input),
            Activation::Relu(layer) => layer.forward(input),
            Activation::Relu6(layer) => layer.forward(input),
            Activation::HardSwish(layer) => layer.forward(input),
            Activation::Silu(layer) => layer.forward(input),
            Activation::LeakyRelu(layer) => layer.forward(input),
            Activation::HardSigmoid(layer) => layer.forward(input),
            Activation::Sigmoid(layer) => layer.forward(input),
            Activation::Mish(layer) => layer.forward(input),
        }
    }

    /// Build a [`ActivationConfig`] for this module.
    pub fn to_config(&self) -> ActivationConfig {
        match self {
            Activation::Identity(_) => ActivationConfig::Identity,
            Activation::Relu(_) => ActivationConfig::Relu,
            Activation::Relu6(_) => ActivationConfig::Relu6,
            Activation::HardSwish(_) => ActivationConfig::HardSwish,
            Activation::Silu(_) => ActivationConfig::Silu,
            Activation::LeakyRelu(layer) => LeakyReluConfig::new()
                .with_negative_slope(layer.negative_slope)
                .into(),
            Activation::HardSigmoid(_) => ActivationConfig::HardSigmoid,
            Activation::Sigmoid(_) => ActivationConfig::Sigmoid,
            Activation::Mish(_) => ActivationConfig::Mish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_close;
    use burn::backend::NdArray;
    use burn::nn::conv::{Conv2d, Conv2dConfig};

    type TestBackend = NdArray<f32>;

    #[derive(Config, Debug)]
    pub struct TestConfig {
        conv: Conv2dConfig,
        act: ActivationConfig,
    }

    impl TestConfig {
        pub fn init<B: Backend>(
            self,
            device: &B::Device,
        ) -> TestModule<B> {
            let conv = self.conv.init(device);
            let act = self.act.init(device);
            TestModule { conv, act }
        }
    }

    #[derive(Module, Debug)]
    pub struct TestModule<B: Backend> {
        conv: Conv2d<B>,
        act: Activation<B>,
    }

    impl<B: Backend> TestModule<B> {
        pub fn forward(
            &self,
            input: Tensor<B, 4>,
        ) -> Tensor<B, 4> {
            let output = self.conv.forward(input);
            self.act.forward(output)
        }
    }

    #[test]
    fn test_embedded_roundtrip() {
        let device = Default::default();
        let config = TestConfig {
            conv: Conv2dConfig::new([2, 2], [1, 1]),
            act: ActivationConfig::Mish,
        };

        let source_module: TestModule<TestBackend> = config.clone().init(&device);

        let input = Tensor::from_data([[[[1.0]], [[-2.0]]]], &device);
        let output1 = source_module.forward(input.clone());

        let record = source_module.into_record();

        let reload_module: TestModule<TestBackend> = config.init(&device).load_record(record);
        let output2 = reload_module.forward(input);

        output1.to_data().assert_eq(&output2.to_data(), true);
    }

    #[test]
    fn test_parse_names() {
        let cases = [
            ("relu", ActivationConfig::Relu),
            ("relu6", ActivationConfig::Relu6),
            ("hswish", ActivationConfig::HardSwish),
            ("hardswish", ActivationConfig::HardSwish),
            ("silu", ActivationConfig::Silu),
            ("lrelu", ActivationConfig::leaky_relu()),
            ("leakyrelu", ActivationConfig::leaky_relu()),
            ("leakyrelu_0.1", ActivationConfig::leaky_relu()),
            ("hsigmoid", ActivationConfig::HardSigmoid),
            ("sigmoid", ActivationConfig::Sigmoid),
            ("mish", ActivationConfig::Mish),
            ("", ActivationConfig::Identity),
        ];
        for (name, expected) in cases {
            let parsed: ActivationConfig = name.parse().unwrap();
            assert_eq!(parsed, expected, "{name}");
        }
    }

    #[test]
    fn test_parse_unknown() {
        let err = "gelu".parse::<ActivationConfig>().unwrap_err();
        assert!(matches!(err, ZooError::UnknownActivation { ref name } if name == "gelu"));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            ActivationConfig::from_name(None).unwrap(),
            ActivationConfig::Identity
        );
        assert_eq!(
            ActivationConfig::from_name(Some("silu")).unwrap(),
            ActivationConfig::Silu
        );
        assert!(ActivationConfig::from_name(Some("swish")).is_err());
    }

    #[test]
    fn test_canonical_name_roundtrip() {
        for config in [
            ActivationConfig::Identity,
            ActivationConfig::Relu,
            ActivationConfig::Relu6,
            ActivationConfig::HardSwish,
            ActivationConfig::Silu,
            ActivationConfig::leaky_relu(),
            ActivationConfig::HardSigmoid,
            ActivationConfig::Sigmoid,
            ActivationConfig::Mish,
        ] {
            let parsed: ActivationConfig = config.name().parse().unwrap();
            assert_eq!(parsed, config);
        }
    }

    fn make_input<B: Backend>(device: &B::Device) -> Tensor<B, 2> {
        Tensor::from_data([[-1.0, -0.5, 0.0], [1.0, 0.5, 4.0]], device)
    }

    #[test]
    fn test_to_config() {
        let device = Default::default();
        for config in [
            ActivationConfig::Identity,
            ActivationConfig::Relu,
            ActivationConfig::Relu6,
            ActivationConfig::HardSwish,
            ActivationConfig::Silu,
            ActivationConfig::leaky_relu(),
            ActivationConfig::HardSigmoid,
            ActivationConfig::Sigmoid,
            ActivationConfig::Mish,
        ] {
            let layer: Activation<TestBackend> = config.init(&device);
            assert_eq!(layer.to_config(), config);
            assert_eq!(layer.clone().forward(make_input(&device)).dims(), [2, 3]);
        }
    }

    #[test]
    fn test_leaky_relu_slope() {
        let device = Default::default();
        let layer: Activation<TestBackend> = ActivationConfig::leaky_relu().init(&device);

        let expected = Tensor::from_data([[-0.1, -0.05, 0.0], [1.0, 0.5, 4.0]], &device);
        assert_close(layer.forward(make_input(&device)), expected, 1e-6);
    }

    #[test]
    fn test_hard_sigmoid_matches_torch() {
        let device = Default::default();
        let layer: Activation<TestBackend> = ActivationConfig::HardSigmoid.init(&device);

        let expected = Tensor::from_data(
            [
                [-1.0 / 6.0 + 0.5, -0.5 / 6.0 + 0.5, 0.5],
                [1.0 / 6.0 + 0.5, 0.5 / 6.0 + 0.5, 1.0],
            ],
            &device,
        );
        assert_close(layer.forward(make_input(&device)), expected, 1e-6);
    }

    #[test]
    fn test_identity_and_relu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let identity: Activation<TestBackend> = ActivationConfig::Identity.init(&device);
        identity
            .forward(input.clone())
            .to_data()
            .assert_eq(&input.to_data(), true);

        let relu: Activation<TestBackend> = ActivationConfig::Relu.init(&device);
        let expected = Relu.forward(input.clone());
        relu.forward(input)
            .to_data()
            .assert_eq(&expected.to_data(), true);
    }
}
