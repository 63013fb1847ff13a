//! モデル推論機能

use std::path::Path;

use burn::tensor::{backend::Backend, Tensor};
use serde::Serialize;

use crate::error::{Result, RoiError};
use crate::layout::ClassLabel;
use crate::ml::ml_model::{ModelConfig, RoiClassifier};
use crate::ml::preprocess::{preprocess_input, ImageInput};
use crate::model::{load_model_any, ModelMetadata};

/// recognized と判定する確率の下限（ちょうど 0.8 は recognized）
pub const DEFAULT_THRESHOLD: f32 = 0.8;

pub const NO_IMAGE_LABEL: &str = "No image";
pub const INVALID_IMAGE_LABEL: &str = "Invalid image";

/// 確率からラベルを決める
pub fn decide(recognized_probability: f32, threshold: f32) -> ClassLabel {
    if recognized_probability >= threshold {
        ClassLabel::Recognized
    } else {
        ClassLabel::NotRecognized
    }
}

/// 推論結果（ラベル文字列, recognized の確率）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn no_image() -> Self {
        Self { label: NO_IMAGE_LABEL.to_string(), confidence: 0.0 }
    }

    pub fn invalid_image() -> Self {
        Self { label: INVALID_IMAGE_LABEL.to_string(), confidence: 0.0 }
    }

    pub fn from_probability(recognized_probability: f32, threshold: f32) -> Self {
        Self {
            label: decide(recognized_probability, threshold).to_string(),
            confidence: recognized_probability,
        }
    }
}

/// 推論エンジン
pub struct InferenceEngine<B: Backend> {
    model: RoiClassifier<B>,
    metadata: ModelMetadata,
    device: B::Device,
    threshold: f32,
}

impl<B: Backend> InferenceEngine<B> {
    /// モデルディレクトリ（またはバンドル）を読み込んで推論エンジンを初期化
    pub fn load<P: AsRef<Path>>(model_path: P, device: B::Device) -> Result<Self> {
        let (metadata, model_binary) = load_model_any(model_path.as_ref())?;

        let model = ModelConfig::new()
            .with_num_classes(metadata.num_classes())
            .with_dropout(metadata.dropout)
            .init::<B>(&device)
            .load_bytes(model_binary, &device)?;

        tracing::info!(
            "モデルを読み込みました: {} (入力 {}x{}, 学習日時 {})",
            model_path.as_ref().display(),
            metadata.image_size,
            metadata.image_size,
            metadata.trained_at
        );

        Ok(Self {
            model,
            metadata,
            device,
            threshold: DEFAULT_THRESHOLD,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn image_size(&self) -> usize {
        self.metadata.image_size
    }

    /// 前処理済みデータ (H, W, 3) から recognized の確率を得る
    pub fn recognized_probability(&self, image_data: &[f32]) -> Result<f32> {
        let size = self.image_size();
        if image_data.len() != size * size * 3 {
            return Err(RoiError::Tensor(format!(
                "入力長が不正です: {} (期待: {})",
                image_data.len(),
                size * size * 3
            )));
        }

        // バッチ次元を付与 [1, H, W, 3]
        let tensor = Tensor::<B, 1>::from_floats(image_data, &self.device).reshape([1, size, size, 3]);
        let proba = self
            .model
            .predict_proba(tensor)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| RoiError::Tensor(format!("推論結果の取得エラー: {e:?}")))?;

        proba
            .get(ClassLabel::Recognized.index())
            .copied()
            .ok_or_else(|| RoiError::Tensor("出力に recognized の確率がありません".to_string()))
    }

    /// 単一画像を分類
    ///
    /// 画像なし・不正な画像はエラーにせず番兵値（確率 0.0）を返す。
    pub fn predict(&self, input: Option<&ImageInput>) -> Result<Prediction> {
        let Some(input) = input else {
            return Ok(Prediction::no_image());
        };
        let Some(image_data) = preprocess_input(input, self.image_size()) else {
            return Ok(Prediction::invalid_image());
        };
        let probability = self.recognized_probability(&image_data)?;
        Ok(Prediction::from_probability(probability, self.threshold))
    }
}
