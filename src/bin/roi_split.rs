//! raw/<class>/ を train / val に分割コピーする

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use roi_classifier::labeling::split_raw;
use roi_classifier::{logging, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "roi-split", about = "ラベル付け済み画像を train / val に分割する")]
struct Cli {
    /// ラベル付け済み画像のルート
    #[arg(long, default_value = "data/raw")]
    raw_dir: PathBuf,

    /// 出力先（<data-dir>/train, <data-dir>/val）
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// 検証データの割合（省略時は設定ファイルの値、既定 0.2）
    #[arg(long)]
    val_ratio: Option<f64>,

    /// シャッフルのシード（省略時は設定ファイルの値、既定 42）
    #[arg(long)]
    seed: Option<u64>,

    /// 設定ファイル
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load_or_default_from(&cli.config);
    let val_ratio = cli.val_ratio.unwrap_or(config.split.val_ratio);
    let seed = cli.seed.unwrap_or(config.split.seed);

    let results = split_raw(&cli.raw_dir, &cli.data_dir, val_ratio, seed)
        .with_context(|| format!("分割に失敗しました: {}", cli.raw_dir.display()))?;

    for result in &results {
        println!("{}: {} train, {} val", result.label, result.train, result.val);
    }
    tracing::info!("分割完了: {}", cli.data_dir.display());
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
