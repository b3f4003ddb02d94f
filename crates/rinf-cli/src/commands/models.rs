//! Models command - list architectures and download weights.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use console::style;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use rinf_core::ModelRegistry;

use super::classify::DEFAULT_MODEL;
use super::config;
use crate::remote::http_url;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List registered architectures
    List,

    /// Download a weight file
    Download(DownloadArgs),
}

#[derive(Args)]
struct DownloadArgs {
    /// Weight URL (http, https or gs) [default: the MobileNetV2 weights]
    url: Option<String>,

    /// Output file [default: <data dir>/rinf/models/<file name>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force re-download even if the file exists
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::List => list_models(config_path),
        ModelsCommand::Download(download_args) => download_model(download_args).await,
    }
}

pub fn models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rinf")
        .join("models")
}

fn describe(architecture: &str) -> &'static str {
    match architecture {
        "pooled_linear" => "channel-mean pooling + linear layer, JSON weights",
        "onnx" => "any ONNX image classifier on ONNX Runtime",
        "mobilenet_v2" => "MobileNetV2 ImageNet classifier (ONNX) on ONNX Runtime",
        "onnx_tract" => "any ONNX image classifier on tract (pure Rust)",
        _ => "custom architecture",
    }
}

fn list_models(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(config_path)?;
    let registry = ModelRegistry::default();

    println!("{}", style("Registered Architectures").bold());
    println!();

    for name in registry.architectures() {
        let marker = if name == config.model.architecture {
            " (configured)"
        } else {
            ""
        };
        println!(
            "{} {}{}",
            style(format!("▸ {:<16}", name)).bold().cyan(),
            style(describe(name)).dim(),
            style(marker).green().bold()
        );
    }

    println!();
    println!(
        "Weights: {}",
        config
            .model
            .state_dict_path
            .as_deref()
            .unwrap_or(DEFAULT_MODEL)
    );
    println!("Download directory: {}", models_dir().display());
    println!();
    println!("Commands:");
    println!("  rinf models download <url>                  Fetch a weight file");
    println!("  rinf config set model.architecture <name>   Switch architecture");

    Ok(())
}

fn file_name(url: &str) -> &str {
    url.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("model.bin")
}

async fn download_model(args: DownloadArgs) -> anyhow::Result<()> {
    let locator = args.url.as_deref().unwrap_or(DEFAULT_MODEL);
    let url = http_url(locator)
        .ok_or_else(|| anyhow::anyhow!("Not a downloadable URL: {}", locator))?;

    let path = args
        .output
        .unwrap_or_else(|| models_dir().join(file_name(&url)));

    if path.exists() && !args.force {
        println!(
            "{} {} (already exists, {})",
            style("✓").green(),
            path.display(),
            format_size(fs::metadata(&path)?.len())
        );
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    println!(
        "{} Downloading {} to {}",
        style("ℹ").blue(),
        style(locator).cyan(),
        path.display()
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("rinf-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(300))
        .build()?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} {msg:<30} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")?
            .progress_chars("=>-"),
    );
    pb.set_message(file_name(&url).to_string());

    match download_file(&client, &url, &path, &pb).await {
        Ok(size) => {
            pb.finish_with_message(format!("{} {}", style("✓").green(), file_name(&url)));
            println!(
                "{} Downloaded {}",
                style("✓").green().bold(),
                format_size(size)
            );
            Ok(())
        }
        Err(e) => {
            pb.finish_with_message(format!("{} {}", style("✗").red(), file_name(&url)));
            Err(e)
        }
    }
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<u64> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    drop(file);

    // Only a complete download replaces the target.
    fs::rename(&temp_path, path)?;

    Ok(downloaded)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
