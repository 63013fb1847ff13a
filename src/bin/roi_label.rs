//! 未ラベル画像を対話的に raw/<class>/ へ振り分ける

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use roi_classifier::labeling::{run_labeling, ImageViewer, NoViewer, SystemViewer};
use roi_classifier::model::LabelSettings;
use roi_classifier::{logging, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "roi-label", about = "ROI 画像を 1 (recognized) / 0 (not_recognized) で振り分ける")]
struct Cli {
    /// 未ラベル画像のディレクトリ
    #[arg(long)]
    input_dir: PathBuf,

    /// 振り分け先（<raw-dir>/recognized, <raw-dir>/not_recognized）。省略時は設定の label.raw_dir
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// 画像ビューアを開かない（端末のみ）
    #[arg(long)]
    no_open: bool,

    /// 設定ファイル
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

/// CLI 引数を優先して (振り分け先, ビューアを開くか) を決める
fn resolve_options(raw_dir: Option<PathBuf>, no_open: bool, settings: &LabelSettings) -> (PathBuf, bool) {
    let raw_dir = raw_dir.unwrap_or_else(|| PathBuf::from(&settings.raw_dir));
    (raw_dir, settings.open_viewer && !no_open)
}

fn run(cli: Cli) -> Result<()> {
    let settings = AppConfig::load_or_default_from(&cli.config).label;
    let (raw_dir, open_viewer) = resolve_options(cli.raw_dir, cli.no_open, &settings);
    let viewer: Box<dyn ImageViewer> = if open_viewer { Box::new(SystemViewer) } else { Box::new(NoViewer) };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let summary = run_labeling(&cli.input_dir, &raw_dir, viewer.as_ref(), stdin.lock(), stdout.lock())
        .with_context(|| format!("ラベル付けに失敗しました: {}", cli.input_dir.display()))?;

    tracing::info!(
        "{} 枚を振り分けました{}",
        summary.moved.len(),
        if summary.stopped_early { "（途中終了）" } else { "" }
    );
    io::stdout().flush()?;
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
