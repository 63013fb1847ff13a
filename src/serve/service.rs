//! 推論サービス
//!
//! モデルは最初の推論要求で読み込み、以後はプロセス終了まで使い回す。
//! 読み込みに失敗した場合はキャッシュせず、次の要求で再試行する。

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::Engine as _;
use burn::tensor::backend::Backend;

use crate::error::Result;
use crate::ml::inference::{InferenceEngine, Prediction, DEFAULT_THRESHOLD};
use crate::ml::preprocess::{decode_bytes, ImageInput};

pub struct RoiService<B: Backend> {
    model_path: PathBuf,
    device: B::Device,
    threshold: f32,
    engine: Mutex<Option<InferenceEngine<B>>>,
}

impl<B: Backend> RoiService<B> {
    pub fn new<P: AsRef<Path>>(model_path: P, device: B::Device) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            device,
            threshold: DEFAULT_THRESHOLD,
            engine: Mutex::new(None),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.lock().map(|engine| engine.is_some()).unwrap_or(false)
    }

    /// 画像を分類する（画像なしならモデルを読み込まずに番兵値を返す）
    pub fn predict(&self, input: Option<&ImageInput>) -> Result<Prediction> {
        let Some(input) = input else {
            return Ok(Prediction::no_image());
        };

        // ロック中に推論するので順伝播は直列化される
        let mut guard = self.engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_none() {
            tracing::info!("モデルを読み込みます: {}", self.model_path.display());
            let engine = InferenceEngine::load(&self.model_path, self.device.clone())?.with_threshold(self.threshold);
            *guard = Some(engine);
        }

        match guard.as_ref() {
            Some(engine) => engine.predict(Some(input)),
            None => Ok(Prediction::no_image()),
        }
    }

    /// base64（data URL 可）でエンコードされた画像を分類する
    pub fn predict_encoded(&self, encoded: Option<&str>) -> Result<Prediction> {
        let encoded = match encoded.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return self.predict(None),
        };

        let Some(bytes) = decode_base64_image(encoded) else {
            return Ok(Prediction::invalid_image());
        };
        let Some(image) = decode_bytes(&bytes) else {
            return Ok(Prediction::invalid_image());
        };
        self.predict(Some(&ImageInput::Decoded(image)))
    }
}

/// `data:image/png;base64,...` 形式なら先頭を落としてデコード
pub fn decode_base64_image(encoded: &str) -> Option<Vec<u8>> {
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data)?,
        None => encoded,
    };
    base64::engine::general_purpose::STANDARD.decode(payload.trim()).ok()
}
