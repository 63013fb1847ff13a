//! 動作確認用のノイズ画像を data/{train,val,test}/<class>/ に生成する

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use roi_classifier::labeling::{ensure_placeholder_data, MIN_PER_CLASS};
use roi_classifier::{logging, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "roi-placeholder-data", about = "開発・CI 用のダミー画像を生成する（精度には意味がない）")]
struct Cli {
    /// データディレクトリ
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// 各 split・クラスの最低枚数
    #[arg(long, default_value_t = MIN_PER_CLASS)]
    per_class: usize,

    /// 乱数シード（省略時は設定ファイルの学習シード）
    #[arg(long)]
    seed: Option<u64>,

    /// 設定ファイル
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load_or_default_from(&cli.config);
    let seed = cli.seed.unwrap_or(config.training.seed);

    let written = ensure_placeholder_data(&cli.data_dir, cli.per_class, seed)
        .with_context(|| format!("ダミー画像の生成に失敗しました: {}", cli.data_dir.display()))?;
    println!("{} placeholder images written under {}", written, cli.data_dir.display());
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
