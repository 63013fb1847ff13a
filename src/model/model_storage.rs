//! モデルとメタデータの永続化
//!
//! 2つの形式を扱います。
//!
//! モデルディレクトリ（正規の成果物）:
//! - `metadata.json` - メタデータ
//! - `model.bin`     - モデルの重み（バイナリ）
//!
//! バンドル（1ファイル版、tar.gz）:
//! - 上と同じ2ファイルを1つのアーカイブにまとめたもの

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use crate::error::{Result, RoiError};
use crate::model::model_metadata::ModelMetadata;

pub const METADATA_FILE: &str = "metadata.json";
pub const MODEL_FILE: &str = "model.bin";

/// パスがバンドル（.tar.gz / .tgz）かどうか
pub fn is_bundle_path(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// モデルディレクトリにメタデータと重みを書き出す
///
/// 既存の2ファイルは上書きされる。ディレクトリ内の他のファイルには触れない。
pub fn save_model_dir(dir: &Path, metadata: &ModelMetadata, model_binary: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(METADATA_FILE), metadata.to_json_string()?)?;
    std::fs::write(dir.join(MODEL_FILE), model_binary)?;
    Ok(())
}

/// モデルディレクトリからメタデータと重みを読み込む
pub fn load_model_dir(dir: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    if !dir.is_dir() {
        return Err(RoiError::ModelNotFound { path: dir.to_path_buf() });
    }
    let metadata_path = dir.join(METADATA_FILE);
    let model_path = dir.join(MODEL_FILE);
    if !metadata_path.is_file() || !model_path.is_file() {
        return Err(RoiError::ModelNotFound { path: dir.to_path_buf() });
    }

    let json = std::fs::read_to_string(&metadata_path)?;
    let metadata = ModelMetadata::from_json_string(&json)?;
    let binary = std::fs::read(&model_path)?;
    Ok((metadata, binary))
}

/// メタデータと共にモデルをTar.gz形式で保存
///
/// 返り値は実際に書き込んだパス（拡張子が無ければ `.tar.gz` を付与）。
pub fn save_model_bundle(output_path: &Path, metadata: &ModelMetadata, model_binary: &[u8]) -> Result<PathBuf> {
    let tar_gz_path = if is_bundle_path(output_path) {
        output_path.to_path_buf()
    } else {
        output_path.with_extension("tar.gz")
    };

    if let Some(parent) = tar_gz_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tar_gz_file = File::create(&tar_gz_path)?;
    let encoder = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    append_bytes(&mut tar_builder, METADATA_FILE, metadata.to_json_string()?.as_bytes())?;
    append_bytes(&mut tar_builder, MODEL_FILE, model_binary)?;

    tar_builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| RoiError::Archive(format!("tar.gz の書き込みに失敗しました: {e}")))?;

    Ok(tar_gz_path)
}

fn append_bytes<W: std::io::Write>(builder: &mut Builder<W>, name: &str, bytes: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header
        .set_path(name)
        .map_err(|e| RoiError::Archive(format!("{name}: {e}")))?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .map_err(|e| RoiError::Archive(format!("{name} を追加できません: {e}")))?;
    Ok(())
}

/// Tar.gzからメタデータとモデルバイナリを共に読み込む
pub fn load_model_bundle(tar_gz_path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    if !tar_gz_path.is_file() {
        return Err(RoiError::ModelNotFound { path: tar_gz_path.to_path_buf() });
    }

    let decoder = GzDecoder::new(File::open(tar_gz_path)?);
    let mut archive = Archive::new(decoder);

    let mut metadata_opt: Option<ModelMetadata> = None;
    let mut model_binary_opt: Option<Vec<u8>> = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_path_buf();

        match path.to_str() {
            Some(METADATA_FILE) => {
                let mut json_str = String::new();
                entry.read_to_string(&mut json_str)?;
                metadata_opt = Some(ModelMetadata::from_json_string(&json_str)?);
            }
            Some(MODEL_FILE) => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer)?;
                model_binary_opt = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata_opt, model_binary_opt) {
        (Some(metadata), Some(binary)) => Ok((metadata, binary)),
        (None, _) => Err(RoiError::Archive(format!("{METADATA_FILE} が tar.gz 内にありません"))),
        (_, None) => Err(RoiError::Archive(format!("{MODEL_FILE} が tar.gz 内にありません"))),
    }
}

/// ディレクトリ・バンドルのどちらからでも読み込む
pub fn load_model_any(path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    if is_bundle_path(path) {
        load_model_bundle(path)
    } else {
        load_model_dir(path)
    }
}
