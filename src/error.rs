//! ライブラリ共通のエラー型

use std::path::PathBuf;

/// ROI分類ツール群のエラー
#[derive(Debug, thiserror::Error)]
pub enum RoiError {
    #[error("ディレクトリが見つかりません: {}", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("モデルが見つかりません: {}。先に roi-train で学習してください", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("画像が見つかりません: {}（必要なサブディレクトリ: not_recognized, recognized。roi-placeholder-data でダミーデータを生成できます）", dir.display())]
    NoImages { dir: PathBuf },

    #[error("変換ツール '{program}' が見つかりません。`pip install tensorflowjs` でインストールしてください")]
    ConverterMissing { program: String },

    #[error("変換ツールが終了コード {code} で失敗しました")]
    ConverterFailed { code: i32 },

    #[error("不正な画像です: {0}")]
    InvalidImage(String),

    #[error("不正な設定値: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("モデル重みの読み書きエラー: {0}")]
    Record(String),

    #[error("テンソル変換エラー: {0}")]
    Tensor(String),

    #[error("アーカイブエラー: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, RoiError>;
