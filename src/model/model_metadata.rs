//! モデルメタデータの定義
//!
//! モデルディレクトリ・バンドルの両方に `metadata.json` として保存されます。
//! 推論側はこの情報からモデル構造を復元してから重みを読み込みます。

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layout::{CLASS_NAMES, IMAGE_SIZE};

/// モデルメタデータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// クラス名（インデックス順）
    /// 例: ["not_recognized", "recognized"]
    pub class_names: Vec<String>,

    /// モデル入力サイズ（正方形、通常224）
    pub image_size: usize,

    /// ヘッド直前のドロップアウト率（推論時は無効）
    pub dropout: f64,

    /// 学習時に凍結しなかった末尾ブロック数
    #[serde(default)]
    pub trainable_blocks: usize,

    /// 学習エポック数
    pub num_epochs: usize,

    /// 最良チェックポイントのエポック（1始まり）
    #[serde(default)]
    pub best_epoch: Option<usize>,

    /// 最良チェックポイントの検証精度
    #[serde(default)]
    pub best_val_accuracy: Option<f64>,

    /// モデルの学習時刻（ISO8601形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成（学習時刻は現在時刻）
    pub fn new(image_size: usize, dropout: f64, trainable_blocks: usize, num_epochs: usize) -> Self {
        Self {
            class_names: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            image_size,
            dropout,
            trainable_blocks,
            num_epochs,
            best_epoch: None,
            best_val_accuracy: None,
            trained_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// 最良エポックの情報を付与
    pub fn with_best(mut self, epoch: usize, val_accuracy: f64) -> Self {
        self.best_epoch = Some(epoch);
        self.best_val_accuracy = Some(val_accuracy);
        self
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self::new(IMAGE_SIZE, 0.3, 2, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_keep_recognized_at_index_one() {
        let metadata = ModelMetadata::new(224, 0.3, 2, 10);
        assert_eq!(metadata.num_classes(), 2);
        assert_eq!(metadata.class_names[1], "recognized");
    }

    #[test]
    fn json_without_optional_fields_still_parses() {
        let json = r#"{
            "class_names": ["not_recognized", "recognized"],
            "image_size": 224,
            "dropout": 0.3,
            "num_epochs": 5,
            "trained_at": "2026-01-01T00:00:00+00:00"
        }"#;
        let metadata = ModelMetadata::from_json_string(json).unwrap();
        assert_eq!(metadata.best_epoch, None);
        assert_eq!(metadata.trainable_blocks, 0);

        let with_best = metadata.with_best(3, 0.75);
        let back = ModelMetadata::from_json_string(&with_best.to_json_string().unwrap()).unwrap();
        assert_eq!(back.best_epoch, Some(3));
        assert_eq!(back.best_val_accuracy, Some(0.75));
    }
}
