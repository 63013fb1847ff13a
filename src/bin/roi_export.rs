//! 学習済みモデルを Web 向け形式に変換する（外部の tensorflowjs_converter を起動）

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use roi_classifier::export::{export_model, DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_DIR};
use roi_classifier::{logging, AppConfig, RoiError};

#[derive(Parser, Debug)]
#[command(
    name = "roi-export",
    about = "保存済みモデルを Web クライアント向けに変換する",
    long_about = "保存済みモデルを外部の変換ツール（既定 tensorflowjs_converter）で Web クライアント向けに変換する。\n\
                  既定の入力形式 tf_saved_model は TensorFlow SavedModel 用で、roi-train が書き出す burn 形式\n\
                  （metadata.json + model.bin）はそのままでは変換できない。SavedModel に変換済みのディレクトリを\n\
                  --input に渡すか、--input-format / 設定の export.input_format で形式を指定すること。"
)]
struct Cli {
    /// 学習済みモデルのディレクトリ
    #[arg(long, default_value = DEFAULT_INPUT_DIR)]
    input: PathBuf,

    /// 変換結果の出力先
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// 変換ツール（省略時は設定ファイルの値）
    #[arg(long)]
    converter: Option<String>,

    /// 変換ツールの --input_format（省略時は設定ファイルの値、既定 tf_saved_model）
    #[arg(long)]
    input_format: Option<String>,

    /// 設定ファイル
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = AppConfig::load_or_default_from(&cli.config).export;
    if let Some(converter) = cli.converter {
        settings.converter = converter;
    }
    if let Some(input_format) = cli.input_format {
        settings.input_format = input_format;
    }

    let model_json = export_model(&cli.input, &cli.output, &settings)
        .with_context(|| format!("変換に失敗しました: {}", cli.input.display()))?;
    println!("Point the web client at {}", model_json.display());
    Ok(())
}

/// 変換ツールの終了コードはそのまま返し、それ以外の失敗は 1
fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<RoiError>() {
        Some(RoiError::ConverterFailed { code }) => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
        _ => 1,
    }
}

fn main() -> ExitCode {
    logging::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
