//! Web 向けモデル形式への変換
//!
//! 変換そのものは外部の `tensorflowjs_converter` に任せ、ここでは
//! 入出力ディレクトリの確認と子プロセスの起動・終了コードの受け渡しだけを行う。
//!
//! 既定の入力形式 tf_saved_model は TensorFlow SavedModel 用で、roi-train が書き出す
//! burn 形式のディレクトリはそのままでは変換できない。形式は `export.input_format` で変えられる。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, RoiError};
use crate::model::ExportSettings;

pub const DEFAULT_CONVERTER: &str = "tensorflowjs_converter";
pub const DEFAULT_INPUT_DIR: &str = "saved_model";
pub const DEFAULT_OUTPUT_DIR: &str = "tfjs_model";

/// 変換ツールに渡す引数
pub fn converter_args(settings: &ExportSettings, input_dir: &Path, output_dir: &Path) -> Vec<String> {
    vec![
        format!("--input_format={}", settings.input_format),
        format!("--output_format={}", settings.output_format),
        input_dir.display().to_string(),
        output_dir.display().to_string(),
    ]
}

/// 変換を実行し、Web クライアントが読む `model.json` のパスを返す
///
/// 変換ツールが非ゼロで終了した場合は `ConverterFailed` にその終了コードを載せる。
pub fn export_model(input_dir: &Path, output_dir: &Path, settings: &ExportSettings) -> Result<PathBuf> {
    if !input_dir.is_dir() {
        return Err(RoiError::ModelNotFound { path: input_dir.to_path_buf() });
    }
    std::fs::create_dir_all(output_dir)?;

    let converter = settings.converter.as_str();
    let args = converter_args(settings, input_dir, output_dir);
    tracing::info!("変換を実行します: {} {}", converter, args.join(" "));

    let status = match Command::new(converter).args(&args).status() {
        Ok(status) => status,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RoiError::ConverterMissing { program: converter.to_string() });
        }
        Err(e) => return Err(e.into()),
    };

    if !status.success() {
        // シグナル終了などでコードが取れない場合は 1
        let code = status.code().unwrap_or(1);
        return Err(RoiError::ConverterFailed { code });
    }

    let model_json = output_dir.join("model.json");
    tracing::info!("変換完了: {}", model_json.display());
    Ok(model_json)
}
