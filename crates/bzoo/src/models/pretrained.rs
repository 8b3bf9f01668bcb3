//! # Published Zoo Checkpoints
//!
//! Checkpoints are registered by ``(model, dataset)`` and named
//! ``{model}_{dataset}``.

use crate::cache::weights::{
    PretrainedWeightsDescriptor, PretrainedWeightsMap, StaticPretrainedWeightsDescriptor,
    StaticPretrainedWeightsMap,
};
use anyhow::Context;

const ZOO_ORIGIN: &str = "https://github.com/Deeplite/deeplite-torch-zoo";

/// Published zoo checkpoints.
pub static ZOO_WEIGHTS: StaticPretrainedWeightsMap = StaticPretrainedWeightsMap {
    items: &[
        &StaticPretrainedWeightsDescriptor {
            name: "unet_carvana",
            description: "UNet (bilinear) on Carvana, 1 class; dice 0.994",
            license: Some("apache-2.0"),
            origin: Some(ZOO_ORIGIN),
            urls: &["http://download.deeplite.ai/zoo/models/unet-carvana-dc_994-bb5835e8c29769c0.pth"],
        },
        &StaticPretrainedWeightsDescriptor {
            name: "unet_scse_resnet18_carvana",
            description: "UNet-SCSE with ResNet-18 encoder on Carvana, 1 class; dice 0.989",
            license: Some("apache-2.0"),
            origin: Some(ZOO_ORIGIN),
            urls: &[
                "http://download.deeplite.ai/zoo/models/unet_scse_resnet18-carvana-1cls-0_989-077cf500850096ba.pth",
            ],
        },
        &StaticPretrainedWeightsDescriptor {
            name: "unet_scse_resnet18_voc_20",
            description: "UNet-SCSE with ResNet-18 encoder on VOC, 20 classes; mIoU 0.593",
            license: Some("apache-2.0"),
            origin: Some(ZOO_ORIGIN),
            urls: &[
                "http://download.deeplite.ai/zoo/models/unet_scse_resnet18-voc-miou_593-1e0987c833e9abd7.pth",
            ],
        },
        &StaticPretrainedWeightsDescriptor {
            name: "unet_scse_resnet18_voc_1",
            description: "UNet-SCSE with ResNet-18 encoder on VOC, 1 class; mIoU 0.682",
            license: Some("apache-2.0"),
            origin: Some(ZOO_ORIGIN),
            urls: &[
                "http://download.deeplite.ai/zoo/models/unet_scse_resnet18-voc-1cls-0_682-38cbf3aaa2ce9a46.pth",
            ],
        },
        &StaticPretrainedWeightsDescriptor {
            name: "unet_scse_resnet18_voc_2",
            description: "UNet-SCSE with ResNet-18 encoder on VOC, 2 classes; mIoU 0.688",
            license: Some("apache-2.0"),
            origin: Some(ZOO_ORIGIN),
            urls: &[
                "http://download.deeplite.ai/zoo/models/unet_scse_resnet18-voc-2cls-0_688-79087739621c42c1.pth",
            ],
        },
    ],
};

/// Registry name for a ``(model, dataset)`` pair.
pub fn zoo_weights_name(
    model: &str,
    dataset: &str,
) -> String {
    format!("{model}_{dataset}")
}

/// Lookup a published checkpoint by ``(model, dataset)``.
pub fn lookup_zoo_weights(
    model: &str,
    dataset: &str,
) -> anyhow::Result<PretrainedWeightsDescriptor> {
    let name = zoo_weights_name(model, dataset);
    PretrainedWeightsMap::from(&ZOO_WEIGHTS)
        .lookup_by_name(&name)
        .with_context(|| format!("no published weights for model {model:?} on dataset {dataset:?}"))
}

/// Sorted names of all published checkpoints.
pub fn zoo_weights_names() -> Vec<String> {
    PretrainedWeightsMap::from(&ZOO_WEIGHTS).names()
}
