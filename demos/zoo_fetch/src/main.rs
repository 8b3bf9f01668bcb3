use bzoo::cache::disk::DiskCacheConfig;
use bzoo::cache::weights::fetch_model_weights;
use bzoo::layers::activation::ActivationConfig;
use bzoo::layers::blocks::conv_bn_act::{ConvBnAct, ConvBnActConfig};
use bzoo::layers::blocks::focus::{Focus, FocusConfig};
use bzoo::layers::blocks::ghost_conv::{GhostConv, GhostConvConfig};
use bzoo::models::pretrained::{ZOO_WEIGHTS, lookup_zoo_weights};
use bzoo::utility::checkpoint::load_pytorch_weights;
use burn::backend::NdArray;
use burn::module::Module;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Cache root; defaults to ``$HOME/.cache``.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the published checkpoints.
    List,

    /// Fetch a published checkpoint to the cache.
    Fetch {
        /// Model name, e.g. ``unet_scse_resnet18``.
        model: String,

        /// Dataset name, e.g. ``voc_20``.
        dataset: String,
    },

    /// Fetch a checkpoint by url to the cache.
    FetchUrl {
        url: String,
    },

    /// Load a block checkpoint and report its parameters.
    Load {
        /// Path to the ``.pth`` file.
        checkpoint: PathBuf,

        #[arg(long, value_enum, default_value = "conv-bn-act")]
        block: BlockKind,

        #[arg(long)]
        in_channels: usize,

        #[arg(long)]
        out_channels: usize,

        #[arg(long, default_value = "1")]
        kernel_size: usize,

        #[arg(long, default_value = "relu")]
        act: String,

        /// Key remapping, as ``regex=replacement``; repeatable.
        #[arg(long)]
        remap: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BlockKind {
    ConvBnAct,
    Ghost,
    Focus,
}

fn parse_remaps(remaps: &[String]) -> anyhow::Result<Vec<(&str, &str)>> {
    remaps
        .iter()
        .map(|remap| {
            remap
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("remap must be `regex=replacement`: {remap:?}"))
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    type B = NdArray<f32>;
    let device = Default::default();

    let disk_cache = DiskCacheConfig::new().with_root_dir(args.cache_dir);

    match args.command {
        Command::List => {
            for item in ZOO_WEIGHTS.items {
                println!("{:<32} {}", item.name, item.description);
            }
        }
        Command::Fetch { model, dataset } => {
            let weights = lookup_zoo_weights(&model, &dataset)?;
            let path = weights.fetch_weights_to_disk_cache(&disk_cache)?;
            println!("{}", path.display());
        }
        Command::FetchUrl { url } => {
            let path = fetch_model_weights(&url, &disk_cache)?;
            println!("{}", path.display());
        }
        Command::Load {
            checkpoint,
            block,
            in_channels,
            out_channels,
            kernel_size,
            act,
            remap,
        } => {
            let act: ActivationConfig = act.parse()?;
            let remaps = parse_remaps(&remap)?;

            let num_params = match block {
                BlockKind::ConvBnAct => {
                    let module: ConvBnAct<B> = ConvBnActConfig::new(in_channels, out_channels)
                        .with_kernel(kernel_size)
                        .with_act(act)
                        .init(&device)?;
                    load_pytorch_weights::<B, _>(module, checkpoint, &device, &remaps)?.num_params()
                }
                BlockKind::Ghost => {
                    let module: GhostConv<B> = GhostConvConfig::new(in_channels, out_channels)
                        .with_kernel_size(kernel_size)
                        .with_act(act)
                        .init(&device)?;
                    load_pytorch_weights::<B, _>(module, checkpoint, &device, &remaps)?.num_params()
                }
                BlockKind::Focus => {
                    let module: Focus<B> = FocusConfig::new(in_channels, out_channels)
                        .with_kernel_size(kernel_size)
                        .with_act(act)
                        .init(&device)?;
                    load_pytorch_weights::<B, _>(module, checkpoint, &device, &remaps)?.num_params()
                }
            };
            tracing::info!(?block, num_params, "loaded");
            println!("{block:?}: {num_params} parameters");
        }
    }

    Ok(())
}
