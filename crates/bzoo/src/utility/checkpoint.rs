//! # PyTorch Checkpoint Loading
//!
//! Loaded ``torch`` state dicts carry no information about stateless
//! modules (activations) or enum variants (normalization kind); so each
//! block has a parameter-only stub module which mirrors its checkpoint
//! layout. A checkpoint is deserialized into the stub record, compared
//! against the constructed block parameter by parameter, and then copied
//! onto it.

use crate::compat::normalization_wrapper::Normalization;
use crate::errors::ZooError;
use crate::layers::blocks::conv_bn_act::{ConvBnAct, IdentityProjection};
use crate::layers::blocks::focus::Focus;
use crate::layers::blocks::ghost_conv::GhostConv;
use crate::layers::blocks::robust_conv::{RobustConv, RobustConv2};
use burn::module::{Module, Param};
use burn::nn::conv::{Conv2d, Conv2dRecord, ConvTranspose2d, ConvTranspose2dRecord};
use burn::nn::{BatchNorm, BatchNormRecord};
use burn::prelude::{Backend, Tensor};
use burn::record::{FullPrecisionSettings, Record, Recorder};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::PathBuf;

/// A module which can be loaded from a ``torch`` checkpoint through a stub record.
pub trait PytorchCheckpoint<B: Backend>: Module<B> + Sized {
    /// The parameter-only record mirroring the checkpoint layout.
    type StubRecord: Record<B>;

    /// Check a loaded stub record against this module, and copy its weights.
    ///
    /// # Arguments
    ///
    /// - `record`: the loaded stub record.
    /// - `key`: the checkpoint key prefix of this module; for error messages.
    ///
    /// # Errors
    ///
    /// [`ZooError::CheckpointMismatch`] on the first shape or presence mismatch.
    fn copy_stub_record(
        self,
        record: Self::StubRecord,
        key: &str,
    ) -> Result<Self, ZooError>;
}

/// Load weights from a ``torch`` checkpoint onto a module.
///
/// # Arguments
///
/// - `module`: the constructed module.
/// - `path`: the ``.pth`` file.
/// - `device`: the device to load tensors on.
/// - `remaps`: ``(regex, replacement)`` key remappings, applied in order.
///
/// # Errors
///
/// - [`ZooError::CheckpointLoad`] if the file can't be read or deserialized.
/// - [`ZooError::CheckpointMismatch`] if any parameter is missing, extra,
///   or differently shaped.
pub fn load_pytorch_weights<B, M>(
    module: M,
    path: impl Into<PathBuf>,
    device: &B::Device,
    remaps: &[(&str, &str)],
) -> Result<M, ZooError>
where
    B: Backend,
    M: PytorchCheckpoint<B>,
{
    let path = path.into();
    tracing::info!(path = %path.display(), "loading pytorch checkpoint");

    let record = load_pytorch_record::<B, M::StubRecord>(path, device, remaps)?;
    module.copy_stub_record(record, "")
}

/// Load a record from a ``torch`` checkpoint.
pub fn load_pytorch_record<B: Backend, R: Record<B>>(
    path: PathBuf,
    device: &B::Device,
    remaps: &[(&str, &str)],
) -> Result<R, ZooError> {
    let load_args = remaps
        .iter()
        .fold(LoadArgs::new(path.clone()), |args, (pattern, replacement)| {
            args.with_key_remap(pattern, replacement)
        });

    PyTorchFileRecorder::<FullPrecisionSettings>::new()
        .load(load_args, device)
        .map_err(|err| ZooError::CheckpointLoad {
            path,
            message: err.to_string(),
        })
}

fn join_key(
    prefix: &str,
    name: &str,
) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn mismatch(message: String) -> ZooError {
    ZooError::CheckpointMismatch { message }
}

fn expect_dims(
    key: &str,
    expected: &[usize],
    found: &[usize],
) -> Result<(), ZooError> {
    if expected != found {
        return Err(mismatch(format!(
            "{key}: expected shape {expected:?}, found {found:?}"
        )));
    }
    Ok(())
}

fn expect_param_shape<B: Backend, const D: usize>(
    key: &str,
    target: &Param<Tensor<B, D>>,
    loaded: &Param<Tensor<B, D>>,
) -> Result<(), ZooError> {
    expect_dims(key, &target.dims(), &loaded.dims())
}

fn expect_presence<T, R>(
    key: &str,
    target: &Option<T>,
    loaded: &Option<R>,
) -> Result<(), ZooError> {
    match (target, loaded) {
        (Some(_), None) => Err(mismatch(format!("{key}: missing from checkpoint"))),
        (None, Some(_)) => Err(mismatch(format!("{key}: unexpected in checkpoint"))),
        _ => Ok(()),
    }
}

fn expect_optional_param_shape<B: Backend, const D: usize>(
    key: &str,
    target: &Option<Param<Tensor<B, D>>>,
    loaded: &Option<Param<Tensor<B, D>>>,
) -> Result<(), ZooError> {
    expect_presence(key, target, loaded)?;
    match (target, loaded) {
        (Some(target), Some(loaded)) => expect_param_shape(key, target, loaded),
        _ => Ok(()),
    }
}

fn copy_conv2d<B: Backend>(
    key: &str,
    target: Conv2d<B>,
    record: Conv2dRecord<B>,
) -> Result<Conv2d<B>, ZooError> {
    expect_param_shape(&join_key(key, "weight"), &target.weight, &record.weight)?;
    expect_optional_param_shape(&join_key(key, "bias"), &target.bias, &record.bias)?;
    Ok(target.load_record(record))
}

fn copy_conv_transpose2d<B: Backend>(
    key: &str,
    target: ConvTranspose2d<B>,
    record: ConvTranspose2dRecord<B>,
) -> Result<ConvTranspose2d<B>, ZooError> {
    expect_param_shape(&join_key(key, "weight"), &target.weight, &record.weight)?;
    expect_optional_param_shape(&join_key(key, "bias"), &target.bias, &record.bias)?;
    Ok(target.load_record(record))
}

fn copy_batch_norm<B: Backend>(
    key: &str,
    target: BatchNorm<B, 2>,
    record: BatchNormRecord<B, 2>,
) -> Result<BatchNorm<B, 2>, ZooError> {
    expect_param_shape(&join_key(key, "weight"), &target.gamma, &record.gamma)?;
    expect_param_shape(&join_key(key, "bias"), &target.beta, &record.beta)?;
    expect_dims(
        &join_key(key, "running_mean"),
        &target.running_mean.value().dims(),
        &record.running_mean.dims(),
    )?;
    expect_dims(
        &join_key(key, "running_var"),
        &target.running_var.value().dims(),
        &record.running_var.dims(),
    )?;
    Ok(target.load_record(record))
}

fn copy_norm<B: Backend>(
    key: &str,
    target: Option<Normalization<B>>,
    record: Option<BatchNormRecord<B, 2>>,
) -> Result<Option<Normalization<B>>, ZooError> {
    expect_presence(key, &target, &record)?;
    match (target, record) {
        (Some(Normalization::Batch(bn)), Some(record)) => {
            Ok(Some(copy_batch_norm(key, bn, record)?.into()))
        }
        (Some(_), Some(_)) => Err(mismatch(format!(
            "{key}: only batch norm layers can be loaded from a checkpoint"
        ))),
        _ => Ok(None),
    }
}

/// Stub for [`IdentityProjection`].
#[derive(Module, Debug)]
pub struct IdentityProjectionStub<B: Backend> {
    /// 1x1 conv.
    pub conv: Conv2d<B>,
    /// Optional batch norm.
    pub bn: Option<BatchNorm<B, 2>>,
}

impl<B: Backend> IdentityProjectionStubRecord<B> {
    /// Copy the stub weights onto an [`IdentityProjection`].
    pub fn copy_weights(
        self,
        key: &str,
        target: IdentityProjection<B>,
    ) -> Result<IdentityProjection<B>, ZooError> {
        Ok(IdentityProjection {
            conv: copy_conv2d(&join_key(key, "conv"), target.conv, self.conv)?,
            bn: copy_norm(&join_key(key, "bn"), target.bn, self.bn)?,
        })
    }
}

/// Stub for [`ConvBnAct`].
#[derive(Module, Debug)]
pub struct ConvBnActStub<B: Backend> {
    /// Main conv.
    pub conv: Conv2d<B>,
    /// Optional batch norm.
    pub bn: Option<BatchNorm<B, 2>>,
    /// Optional skip projection.
    pub identity_conv: Option<IdentityProjectionStub<B>>,
}

impl<B: Backend> ConvBnActStubRecord<B> {
    /// Copy the stub weights onto a [`ConvBnAct`].
    pub fn copy_weights(
        self,
        key: &str,
        target: ConvBnAct<B>,
    ) -> Result<ConvBnAct<B>, ZooError> {
        let identity_key = join_key(key, "identity_conv");
        expect_presence(&identity_key, &target.identity_conv, &self.identity_conv)?;
        let identity_conv = match (target.identity_conv, self.identity_conv) {
            (Some(target), Some(record)) => Some(record.copy_weights(&identity_key, target)?),
            _ => None,
        };

        Ok(ConvBnAct {
            conv: copy_conv2d(&join_key(key, "conv"), target.conv, self.conv)?,
            bn: copy_norm(&join_key(key, "bn"), target.bn, self.bn)?,
            identity_conv,
            ..target
        })
    }
}

impl<B: Backend> PytorchCheckpoint<B> for ConvBnAct<B> {
    type StubRecord = ConvBnActStubRecord<B>;

    fn copy_stub_record(
        self,
        record: Self::StubRecord,
        key: &str,
    ) -> Result<Self, ZooError> {
        record.copy_weights(key, self)
    }
}

/// Stub for [`GhostConv`].
#[derive(Module, Debug)]
pub struct GhostConvStub<B: Backend> {
    /// Primary conv.
    pub cv1: ConvBnActStub<B>,
    /// Ghost conv.
    pub cv2: Option<ConvBnActStub<B>>,
}

impl<B: Backend> PytorchCheckpoint<B> for GhostConv<B> {
    type StubRecord = GhostConvStubRecord<B>;

    fn copy_stub_record(
        self,
        record: Self::StubRecord,
        key: &str,
    ) -> Result<Self, ZooError> {
        let cv2_key = join_key(key, "cv2");
        expect_presence(&cv2_key, &self.cv2, &record.cv2)?;
        let cv2 = match (self.cv2, record.cv2) {
            (Some(target), Some(record)) => Some(record.copy_weights(&cv2_key, target)?),
            _ => None,
        };

        Ok(GhostConv {
            cv1: record.cv1.copy_weights(&join_key(key, "cv1"), self.cv1)?,
            cv2,
            ..self
        })
    }
}

/// Stub for [`Focus`].
#[derive(Module, Debug)]
pub struct FocusStub<B: Backend> {
    /// Conv over the folded input.
    pub conv: ConvBnActStub<B>,
}

impl<B: Backend> PytorchCheckpoint<B> for Focus<B> {
    type StubRecord = FocusStubRecord<B>;

    fn copy_stub_record(
        self,
        record: Self::StubRecord,
        key: &str,
    ) -> Result<Self, ZooError> {
        Ok(Focus {
            conv: record.conv.copy_weights(&join_key(key, "conv"), self.conv)?,
        })
    }
}

/// Stub for [`RobustConv`].
#[derive(Module, Debug)]
pub struct RobustConvStub<B: Backend> {
    /// Depthwise conv block.
    pub conv_dw: ConvBnActStub<B>,
    /// Pointwise projection.
    pub conv1x1: Conv2d<B>,
    /// Layer scale.
    pub gamma: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> PytorchCheckpoint<B> for RobustConv<B> {
    type StubRecord = RobustConvStubRecord<B>;

    fn copy_stub_record(
        self,
        record: Self::StubRecord,
        key: &str,
    ) -> Result<Self, ZooError> {
        expect_optional_param_shape(&join_key(key, "gamma"), &self.gamma, &record.gamma)?;

        Ok(RobustConv {
            conv_dw: record
                .conv_dw
                .copy_weights(&join_key(key, "conv_dw"), self.conv_dw)?,
            conv1x1: copy_conv2d(&join_key(key, "conv1x1"), self.conv1x1, record.conv1x1)?,
            gamma: self.gamma.load_record(record.gamma),
        })
    }
}

/// Stub for [`RobustConv2`].
#[derive(Module, Debug)]
pub struct RobustConv2Stub<B: Backend> {
    /// Strided depthwise conv block.
    pub conv_strided: ConvBnActStub<B>,
    /// Upsampling transposed conv.
    pub conv_deconv: ConvTranspose2d<B>,
    /// Layer scale.
    pub gamma: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> PytorchCheckpoint<B> for RobustConv2<B> {
    type StubRecord = RobustConv2StubRecord<B>;

    fn copy_stub_record(
        self,
        record: Self::StubRecord,
        key: &str,
    ) -> Result<Self, ZooError> {
        expect_optional_param_shape(&join_key(key, "gamma"), &self.gamma, &record.gamma)?;

        Ok(RobustConv2 {
            conv_strided: record
                .conv_strided
                .copy_weights(&join_key(key, "conv_strided"), self.conv_strided)?,
            conv_deconv: copy_conv_transpose2d(
                &join_key(key, "conv_deconv"),
                self.conv_deconv,
                record.conv_deconv,
            )?,
            gamma: self.gamma.load_record(record.gamma),
        })
    }
}
