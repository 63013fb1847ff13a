//! 事前学習済みバックボーン重みの読み込み
//!
//! torchvision の `mobilenet_v2` の state dict（`.pt` / `.pth` / `.safetensors`）を
//! `MobileNetV2` のレコードに読み替える。それ以外の拡張子は BinBytesRecorder 形式として扱う。
//!
//! torchvision のキーは `features.N.*` の連番なので、ブロック番号とフィールド名へ
//! 書き換えてから読み込む。`classifier.*` は対応するフィールドが無いので使われない。

use std::path::Path;

use burn::{
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::Backend,
};
use burn_import::pytorch::PyTorchFileRecorder;
use burn_import::safetensors::{AdapterType, SafetensorsFileRecorder};

use crate::error::{Result, RoiError};
use crate::ml::mobilenet::{MobileNetV2Record, INVERTED_RESIDUAL_SETTINGS, NUM_BLOCKS};

/// 拡張率 1 のブロック（features.1）の部品対応
const NO_EXPAND_PARTS: [(&str, &str); 4] = [
    ("conv.0.0", "depthwise.conv"),
    ("conv.0.1", "depthwise.norm"),
    ("conv.1", "project"),
    ("conv.2", "project_norm"),
];

/// 拡張ありのブロック（features.2〜17）の部品対応
const EXPAND_PARTS: [(&str, &str); 6] = [
    ("conv.0.0", "expand.conv"),
    ("conv.0.1", "expand.norm"),
    ("conv.1.0", "depthwise.conv"),
    ("conv.1.1", "depthwise.norm"),
    ("conv.2", "project"),
    ("conv.3", "project_norm"),
];

/// torchvision のキー → `MobileNetV2` のフィールドパスの書き換え規則（正規表現, 置換）
pub fn torchvision_key_remap() -> Vec<(String, String)> {
    let mut rules = vec![
        (r"^features\.0\.0\.(.+)$".to_string(), "stem.conv.$1".to_string()),
        (r"^features\.0\.1\.(.+)$".to_string(), "stem.norm.$1".to_string()),
    ];

    let mut block = 0;
    for (t, _, n, _) in INVERTED_RESIDUAL_SETTINGS {
        let parts: &[(&str, &str)] = if t == 1 { &NO_EXPAND_PARTS } else { &EXPAND_PARTS };
        for _ in 0..n {
            let feature = block + 1;
            for (src, dst) in parts {
                let src = src.replace('.', r"\.");
                rules.push((
                    format!(r"^features\.{feature}\.{src}\.(.+)$"),
                    format!("blocks.{block}.{dst}.$1"),
                ));
            }
            block += 1;
        }
    }

    let head = NUM_BLOCKS + 1;
    rules.push((format!(r"^features\.{head}\.0\.(.+)$"), "head_conv.conv.$1".to_string()));
    rules.push((format!(r"^features\.{head}\.1\.(.+)$"), "head_conv.norm.$1".to_string()));
    rules
}

/// バックボーン重みをファイルから読み込む
///
/// PyTorch 形式では BatchNorm の `weight` / `bias` が `gamma` / `beta` に読み替えられる。
pub fn load_backbone_weights<B: Backend>(path: &Path, device: &B::Device) -> Result<MobileNetV2Record<B>> {
    if !path.is_file() {
        return Err(RoiError::Record(format!("バックボーン重みが見つかりません: {}", path.display())));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let record = match extension.as_deref() {
        Some("pt") | Some("pth") => {
            let mut args = burn_import::pytorch::LoadArgs::new(path.to_path_buf());
            for (pattern, replacement) in torchvision_key_remap() {
                args = args.with_key_remap(&pattern, &replacement);
            }
            PyTorchFileRecorder::<FullPrecisionSettings>::default().load(args, device)
        }
        Some("safetensors") => {
            let mut args = burn_import::safetensors::LoadArgs::new(path.to_path_buf())
                .with_adapter_type(AdapterType::PyTorch);
            for (pattern, replacement) in torchvision_key_remap() {
                args = args.with_key_remap(&pattern, &replacement);
            }
            SafetensorsFileRecorder::<FullPrecisionSettings>::default().load(args, device)
        }
        _ => {
            let bytes = std::fs::read(path)?;
            BinBytesRecorder::<FullPrecisionSettings>::default().load(bytes, device)
        }
    };

    record.map_err(|e| RoiError::Record(format!("バックボーン重みの読み込みエラー ({}): {e:?}", path.display())))
}
