//! アプリケーション設定管理モジュール
//!
//! 計算デバイスや学習・分割・推論サーバの設定をJSON形式で保存・読み込みします。
//! CLI引数で指定された値はこの設定より優先されます。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, RoiError};

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    #[default]
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// トレーニング設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// エポック数
    pub num_epochs: usize,
    /// バッチサイズ
    pub batch_size: usize,
    /// 学習率（固定）
    pub learning_rate: f64,
    /// シャッフル用シード
    pub seed: u64,
    /// ヘッド直前のドロップアウト率
    pub dropout: f64,
    /// 学習対象とする末尾の inverted residual ブロック数（それ以前は凍結）
    pub trainable_blocks: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            batch_size: 32,
            learning_rate: 1e-4,
            seed: 42,
            dropout: 0.3,
            trainable_blocks: 2,
        }
    }
}

/// train/val 分割設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    /// 検証用に回す割合
    pub val_ratio: f64,
    /// シャッフル用シード
    pub seed: u64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            val_ratio: 0.2,
            seed: 42,
        }
    }
}

/// 推論サーバ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeSettings {
    /// バインドするアドレス（コンテナ内では 0.0.0.0）
    pub host: String,
    pub port: u16,
    /// recognized と判定する確率の下限（この値ちょうどは recognized）
    pub threshold: f32,
    /// モデルディレクトリ（またはバンドル）のパス
    pub model_path: String,
}

impl Default for ServeSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
            threshold: 0.8,
            model_path: "saved_model".to_string(),
        }
    }
}

/// ラベル付け設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSettings {
    /// 振り分け先（`<raw_dir>/<class>/`）
    pub raw_dir: String,
    /// 画像ごとに OS のビューアを開くか
    pub open_viewer: bool,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            raw_dir: "data/raw".to_string(),
            open_viewer: true,
        }
    }
}

/// Web向け変換設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// 外部変換ツールの実行ファイル名
    pub converter: String,
    /// 変換ツールに渡す入力形式（`--input_format`）
    ///
    /// 既定の tf_saved_model は TensorFlow SavedModel を前提とする。
    /// 学習が書き出す burn 形式（metadata.json + model.bin）は直接は受け付けないので、
    /// 別途 SavedModel に変換したディレクトリを入力にするか、対応する形式を指定する。
    pub input_format: String,
    /// 変換ツールに渡す出力形式（`--output_format`）
    pub output_format: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            converter: crate::export::DEFAULT_CONVERTER.to_string(),
            input_format: "tf_saved_model".to_string(),
            output_format: "tfjs_graph_model".to_string(),
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 計算デバイスの種類
    pub device_type: DeviceType,
    /// トレーニング設定
    pub training: TrainingSettings,
    /// ラベル付け設定
    pub label: LabelSettings,
    /// 分割設定
    pub split: SplitSettings,
    /// 推論サーバ設定
    pub serve: ServeSettings,
    /// 変換設定
    pub export: ExportSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 指定パスから設定を読み込む、存在しない・読めない場合はデフォルト設定を返す
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("設定ファイルが存在しません。デフォルト設定を使用します: {}", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                tracing::info!("設定ファイルを読み込みました: {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!(
                    "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// デフォルトパスから設定を読み込む
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(Self::default_path())
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 値の範囲チェック
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.split.val_ratio) {
            return Err(RoiError::InvalidConfig(format!(
                "split.val_ratio は 0〜1 の範囲で指定してください: {}",
                self.split.val_ratio
            )));
        }
        if self.export.input_format.trim().is_empty() || self.export.output_format.trim().is_empty() {
            return Err(RoiError::InvalidConfig("export.input_format / output_format は空にできません".to_string()));
        }
        if self.training.batch_size == 0 {
            return Err(RoiError::InvalidConfig("training.batch_size は1以上が必要です".to_string()));
        }
        if !(0.0..1.0).contains(&self.training.dropout) {
            return Err(RoiError::InvalidConfig(format!(
                "training.dropout は 0以上1未満で指定してください: {}",
                self.training.dropout
            )));
        }
        Ok(())
    }

    /// 設定内容をログに出す
    pub fn log_summary(&self) {
        tracing::info!(
            device = %self.device_type,
            epochs = self.training.num_epochs,
            batch_size = self.training.batch_size,
            learning_rate = self.training.learning_rate,
            seed = self.training.seed,
            "学習設定"
        );
    }
}
