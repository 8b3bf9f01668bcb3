//! # YOLO Hyperparameters
//!
//! The zoo's default detection hyperparameters, as JSON-serializable configs.

use crate::errors::ZooError;
use burn::config::Config;
use std::path::Path;

/// Model hyperparameters.
#[derive(Config, Debug)]
pub struct ModelHyp {
    /// Detection head strides; strictly increasing.
    #[config(default = "vec![8, 16, 32]")]
    pub strides: Vec<usize>,
}

/// Evaluation hyperparameters.
#[derive(Config, Debug)]
pub struct TestHyp {
    /// Confidence threshold.
    #[config(default = 0.01)]
    pub conf_thresh: f64,

    /// NMS IoU threshold.
    #[config(default = 0.5)]
    pub nms_thresh: f64,
}

/// Training hyperparameters.
#[derive(Config, Debug)]
pub struct TrainHyp {
    /// Initial learning rate.
    #[config(default = 0.01)]
    pub lr0: f64,

    /// Final learning rate, as a fraction of `lr0`.
    #[config(default = 0.1)]
    pub lrf: f64,

    /// SGD momentum / Adam beta1.
    #[config(default = 0.937)]
    pub momentum: f64,

    /// Optimizer weight decay.
    #[config(default = 0.0005)]
    pub weight_decay: f64,

    /// Warmup epochs; fractions allowed.
    #[config(default = 3.0)]
    pub warmup_epochs: f64,

    /// Warmup initial momentum.
    #[config(default = 0.8)]
    pub warmup_momentum: f64,

    /// Warmup initial bias learning rate.
    #[config(default = 0.1)]
    pub warmup_bias_lr: f64,

    /// Box loss gain.
    #[config(default = 0.05)]
    pub giou: f64,

    /// Class loss gain.
    #[config(default = 0.5)]
    pub cls: f64,

    /// Class BCE positive weight.
    #[config(default = 1.0)]
    pub cls_pw: f64,

    /// Objectness loss gain.
    #[config(default = 1.0)]
    pub obj: f64,

    /// Objectness BCE positive weight.
    #[config(default = 1.0)]
    pub obj_pw: f64,

    /// IoU training threshold.
    #[config(default = 0.2)]
    pub iou_t: f64,

    /// Anchor-multiple threshold.
    #[config(default = 4.0)]
    pub anchor_t: f64,

    /// Focal loss gamma; 0 disables focal loss.
    #[config(default = 0.0)]
    pub fl_gamma: f64,

    /// HSV hue augmentation, as a fraction.
    #[config(default = 0.015)]
    pub hsv_h: f64,

    /// HSV saturation augmentation, as a fraction.
    #[config(default = 0.7)]
    pub hsv_s: f64,

    /// HSV value augmentation, as a fraction.
    #[config(default = 0.4)]
    pub hsv_v: f64,

    /// Rotation, +/- degrees.
    #[config(default = 0.0)]
    pub degrees: f64,

    /// Translation, +/- fraction.
    #[config(default = 0.1)]
    pub translate: f64,

    /// Scale, +/- gain.
    #[config(default = 0.5)]
    pub scale: f64,

    /// Shear, +/- degrees.
    #[config(default = 0.0)]
    pub shear: f64,

    /// Perspective, +/- fraction; in ``[0, 0.001]``.
    #[config(default = 0.0)]
    pub perspective: f64,

    /// Up-down flip probability.
    #[config(default = 0.0)]
    pub flipud: f64,

    /// Left-right flip probability.
    #[config(default = 0.5)]
    pub fliplr: f64,

    /// Mosaic probability.
    #[config(default = 0.0)]
    pub mosaic: f64,

    /// Mixup probability.
    #[config(default = 0.0)]
    pub mixup: f64,
}

/// Upper bound of [`TrainHyp::perspective`].
pub const MAX_PERSPECTIVE: f64 = 0.001;

/// Detection training hyperparameters.
#[derive(Config, Debug)]
pub struct YoloHyperParametersConfig {
    /// Model hyperparameters.
    #[config(default = "ModelHyp::new()")]
    pub model: ModelHyp,

    /// Evaluation hyperparameters.
    #[config(default = "TestHyp::new()")]
    pub test: TestHyp,

    /// Training hyperparameters.
    #[config(default = "TrainHyp::new()")]
    pub train: TrainHyp,
}

impl Default for YoloHyperParametersConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_unit_interval(
    name: &str,
    value: f64,
) -> Result<(), ZooError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ZooError::invalid_config(format!(
            "{name} must be in [0, 1]: {value}"
        )));
    }
    Ok(())
}

fn expect_positive_rate(
    name: &str,
    value: f64,
) -> Result<(), ZooError> {
    if value.is_nan() || value <= 0.0 {
        return Err(ZooError::invalid_config(format!(
            "{name} must be > 0: {value}"
        )));
    }
    Ok(())
}

impl YoloHyperParametersConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`ZooError::InvalidConfig`] naming the first out-of-range value.
    pub fn validate(&self) -> Result<(), ZooError> {
        let strides = &self.model.strides;
        if strides.is_empty() || strides[0] == 0 || strides.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ZooError::invalid_config(format!(
                "model.strides must be positive and strictly increasing: {strides:?}"
            )));
        }

        expect_unit_interval("test.conf_thresh", self.test.conf_thresh)?;
        expect_unit_interval("test.nms_thresh", self.test.nms_thresh)?;

        let train = &self.train;
        expect_positive_rate("train.lr0", train.lr0)?;
        expect_positive_rate("train.lrf", train.lrf)?;
        expect_positive_rate("train.warmup_bias_lr", train.warmup_bias_lr)?;

        for (name, value) in [
            ("train.iou_t", train.iou_t),
            ("train.hsv_h", train.hsv_h),
            ("train.hsv_s", train.hsv_s),
            ("train.hsv_v", train.hsv_v),
            ("train.flipud", train.flipud),
            ("train.fliplr", train.fliplr),
            ("train.mosaic", train.mosaic),
            ("train.mixup", train.mixup),
        ] {
            expect_unit_interval(name, value)?;
        }

        if !(0.0..=MAX_PERSPECTIVE).contains(&train.perspective) {
            return Err(ZooError::invalid_config(format!(
                "train.perspective must be in [0, {MAX_PERSPECTIVE}]: {}",
                train.perspective
            )));
        }

        Ok(())
    }

    /// Load a JSON config file, and validate it.
    ///
    /// # Errors
    ///
    /// [`ZooError::InvalidConfig`] if the file can't be read or parsed, or fails [`Self::validate`].
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ZooError> {
        let path = path.as_ref();
        let config = Self::load(path).map_err(|err| {
            ZooError::invalid_config(format!("failed to load {path:?}: {err}"))
        })?;
        config.validate()?;
        Ok(config)
    }
}
