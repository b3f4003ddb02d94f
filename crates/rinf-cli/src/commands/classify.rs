//! Classify command - run the batched classification job.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::runtime::Handle;
use tracing::{info, warn};

use rinf_core::{JobSpec, ModelRegistry, ObjectStore, Pipeline};

use super::config;
use crate::remote::SchemeStore;

/// Listing of ImageNet validation images used when `--input` is omitted.
pub const DEFAULT_INPUT: &str =
    "gs://apache-beam-ml/testing/inputs/it_mobilenetv2_imagenet_validation_inputs.txt";

/// ImageNet MobileNetV2 (ONNX export) used when neither the flag nor the
/// config names weights. Expects `[N, 3, 224, 224]` ImageNet-normalized input
/// and returns `[N, 1000]` logits.
pub const DEFAULT_MODEL: &str = "https://github.com/onnx/models/raw/main/validated/vision/classification/mobilenet/model/mobilenetv2-12.onnx";

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// Listing of images: one header line, then one image name per line
    #[arg(long, default_value = DEFAULT_INPUT)]
    input: String,

    /// Where to write "<image>,<class>" lines (nothing is written if omitted)
    #[arg(long)]
    output: Option<String>,

    /// Model weights [default: model.state_dict_path from config, else the MobileNetV2 weights]
    #[arg(long = "model_state_dict_path", alias = "model-state-dict-path")]
    model_state_dict_path: Option<String>,

    /// Directory prefixed to relative image names
    #[arg(long = "images_dir", alias = "images-dir")]
    images_dir: Option<String>,
}

pub async fn run(args: ClassifyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(config_path)?;

    let weights = args
        .model_state_dict_path
        .or_else(|| config.model.state_dict_path.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let job = JobSpec {
        input: args.input,
        output: args.output,
        images_dir: args.images_dir,
        model: config.model_spec(weights),
    };
    info!(
        "Classifying {} with {} ({})",
        job.input, job.model.architecture, job.model.weights
    );

    let store: Arc<dyn ObjectStore> = Arc::new(SchemeStore::new(Handle::current())?);
    let pipeline = Pipeline::new(job, &config, &ModelRegistry::default(), store)?;
    let output = pipeline.job().output.clone();

    let cancel = pipeline.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling job");
            cancel.cancel();
        }
    });

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message("Classifying images...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = tokio::task::spawn_blocking(move || pipeline.run()).await;
    interrupt.abort();
    pb.finish_and_clear();

    let report = result??;

    for skipped in &report.skipped {
        eprintln!(
            "{} Skipped {}: {}",
            style("⚠").yellow(),
            skipped.key,
            skipped.value
        );
    }

    println!(
        "{} Classified {} of {} images in {} batches ({:.2}s)",
        style("✓").green(),
        report.predictions,
        report.records_read,
        report.batches,
        report.elapsed.as_secs_f64()
    );
    if let Some(output) = output {
        println!("{} Predictions written to {}", style("ℹ").blue(), output);
    }

    Ok(())
}
