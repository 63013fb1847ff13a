//! ROI 分類モデルを学習し saved_model/ に保存する

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use roi_classifier::ml::{run_training, TrainConfig};
use roi_classifier::model::DeviceType;
use roi_classifier::{logging, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "roi-train", about = "MobileNetV2 ベースの ROI 二値分類器を学習する")]
struct Cli {
    /// エポック数（省略時は設定ファイルの値、既定 10）
    #[arg(long)]
    epochs: Option<usize>,

    /// バッチサイズ（省略時は設定ファイルの値、既定 32）
    #[arg(long)]
    batch: Option<usize>,

    /// 1ファイル版 <root>/model.tar.gz も書き出す
    #[arg(long, alias = "save-bundle")]
    save_keras: bool,

    /// プロジェクトルート（<root>/data を読み、<root>/saved_model に保存）
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// 設定に関わらず CPU (NdArray) で学習する
    #[arg(long)]
    cpu: bool,

    /// 事前学習済みバックボーン重み（torchvision mobilenet_v2 の .pth / .safetensors、または burn レコード）
    #[arg(long)]
    backbone_weights: Option<PathBuf>,

    /// 設定ファイル
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_or_default_from(&cli.config);
    if let Some(epochs) = cli.epochs {
        config.training.num_epochs = epochs;
    }
    if let Some(batch) = cli.batch {
        config.training.batch_size = batch;
    }
    if cli.cpu {
        config.device_type = DeviceType::Cpu;
    }
    config.validate().context("設定値が不正です")?;
    config.log_summary();

    let root = cli.data_dir;
    let mut train_config = TrainConfig::from_root(&root, &config.training);
    train_config.backbone_weights = cli.backbone_weights;
    if cli.save_keras {
        train_config.bundle_path = Some(root.join("model.tar.gz"));
    }

    let report = run_training(&train_config, config.device_type)
        .with_context(|| format!("学習に失敗しました: {}", train_config.data_dir.display()))?;

    match report.best {
        Some((epoch, accuracy)) => println!("Best epoch {epoch}: val_accuracy={accuracy:.4}"),
        None => println!("No improving epoch; saved final weights"),
    }
    println!("Saved model to {}", report.output_dir.display());
    if let Some(bundle) = &report.bundle_path {
        println!("Saved bundle to {}", bundle.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    logging::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
