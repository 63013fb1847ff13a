//! ROI分類モデルの定義
//!
//! MobileNetV2 バックボーン + 2クラス分類ヘッド。
//! 入力は [batch, 224, 224, 3]（NHWC、値は [0,1]）で、Web側のランタイムと同じ並び。

use std::path::Path;

use burn::{
    config::Config,
    module::Module,
    nn::{
        loss::CrossEntropyLossConfig,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

use crate::error::{Result as RoiResult, RoiError};
use crate::layout::CLASS_NAMES;
use crate::ml::mobilenet::{MobileNetV2, MobileNetV2Record, FEATURE_DIM};
use crate::ml::pretrained::load_backbone_weights;

/// クラス数（not_recognized, recognized）
pub const NUM_CLASSES: usize = CLASS_NAMES.len();

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    #[config(default = 2)]
    pub num_classes: usize,
    /// ヘッド直前のドロップアウト率
    #[config(default = 0.3)]
    pub dropout: f64,
}

impl ModelConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> RoiClassifier<B> {
        RoiClassifier {
            backbone: MobileNetV2::new(device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            head: LinearConfig::new(FEATURE_DIM, self.num_classes).init(device),
        }
    }
}

/// クロスエントロピー損失
///
/// 重みがあると `sum(w[y] * nll) / sum(w[y])` になり、少数クラスの誤りが重く効く。
pub fn classification_loss<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    class_weights: Option<&[f32]>,
) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .with_weights(class_weights.map(|w| w.to_vec()))
        .init(&logits.device())
        .forward(logits, targets)
}

/// ROI分類モデル
///
/// # アーキテクチャ
/// - MobileNetV2 バックボーン
/// - Global average pooling
/// - Dropout
/// - FC: 1280 -> num_classes
/// - Softmax（推論時のみ）
#[derive(Module, Debug)]
pub struct RoiClassifier<B: Backend> {
    backbone: MobileNetV2<B>,
    pool: AdaptiveAvgPool2d,
    dropout: Dropout,
    head: Linear<B>,
}

impl<B: Backend> RoiClassifier<B> {
    /// 事前学習済みバックボーン重みを差し込む
    pub fn with_backbone_record(mut self, record: MobileNetV2Record<B>) -> Self {
        self.backbone = self.backbone.load_record(record);
        self
    }

    /// バックボーン重みをファイルから読み込む（torchvision の .pt / .safetensors、または burn レコード）
    pub fn with_backbone_file(self, path: &Path, device: &B::Device) -> RoiResult<Self> {
        let record = load_backbone_weights(path, device)?;
        Ok(self.with_backbone_record(record))
    }

    /// バックボーン先頭部分を凍結
    pub fn freeze_backbone(mut self, trainable_blocks: usize) -> Self {
        self.backbone = self.backbone.freeze_leading(trainable_blocks);
        self
    }

    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, H, W, 3]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = images.permute([0, 3, 1, 2]);
        let x = self.backbone.forward(x);
        let x = self.pool.forward(x);
        let x = x.reshape([batch_size, FEATURE_DIM]);
        let x = self.dropout.forward(x);

        self.head.forward(x)
    }

    /// クラス確率 [batch_size, num_classes]
    pub fn predict_proba(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    /// 順伝播と損失計算（学習用）
    ///
    /// `class_weights` があれば損失をクラスごとに重み付けする。
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
        class_weights: Option<&[f32]>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = classification_loss(output.clone(), targets.clone(), class_weights);

        ClassificationOutput::new(loss, output, targets)
    }

    /// 重みをバイト列に書き出す（f32精度）
    pub fn to_bytes(&self) -> RoiResult<Vec<u8>> {
        BinBytesRecorder::<FullPrecisionSettings>::default()
            .record(self.clone().into_record(), ())
            .map_err(|e| RoiError::Record(format!("モデル重みの書き出しエラー: {e:?}")))
    }

    /// バイト列から重みを復元
    pub fn load_bytes(self, bytes: Vec<u8>, device: &B::Device) -> RoiResult<Self> {
        let record = BinBytesRecorder::<FullPrecisionSettings>::default()
            .load(bytes, device)
            .map_err(|e| RoiError::Record(format!("モデル重みの読み込みエラー: {e:?}")))?;
        Ok(self.load_record(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::mobilenet::NUM_BLOCKS;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::{AdamConfig, GradientsParams, Optimizer};
    use burn::tensor::Distribution;

    #[test]
    fn outputs_two_probabilities_per_image() {
        let device = Default::default();
        let model = ModelConfig::new().init::<NdArray>(&device);

        let images = Tensor::<NdArray, 4>::ones([2, 32, 32, 3], &device) * 0.5;
        let proba = model.predict_proba(images);
        assert_eq!(proba.dims(), [2, NUM_CLASSES]);

        let values = proba.into_data().to_vec::<f32>().unwrap();
        for row in values.chunks(2) {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn weights_survive_byte_round_trip() {
        let device = Default::default();
        let model = ModelConfig::new().init::<NdArray>(&device);
        let bytes = model.to_bytes().unwrap();

        let fresh = ModelConfig::new().init::<NdArray>(&device);
        let restored = fresh.load_bytes(bytes, &device).unwrap();

        let images = Tensor::<NdArray, 4>::ones([1, 32, 32, 3], &device);
        let a = model.predict_proba(images.clone()).into_data().to_vec::<f32>().unwrap();
        let b = restored.predict_proba(images).into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn truncated_bytes_are_a_record_error() {
        let device = Default::default();
        let model = ModelConfig::new().init::<NdArray>(&device);
        let err = model.load_bytes(vec![1, 2, 3], &device).unwrap_err();
        assert!(matches!(err, RoiError::Record(_)));
    }

    fn loss_value(weights: Option<&[f32]>) -> f32 {
        let device = Default::default();
        let logits = Tensor::<NdArray, 2>::from_floats([[2.0, 0.0], [2.0, 0.0]], &device);
        let targets = Tensor::<NdArray, 1, Int>::from_ints([0, 1], &device);
        classification_loss(logits, targets, weights).into_scalar()
    }

    #[test]
    fn class_weights_shift_loss_toward_weighted_class() {
        // 両方とも class 0 と予測: class 0 は正解、class 1 は誤り
        let plain = loss_value(None);
        assert!((plain - 1.126928).abs() < 1e-4, "{plain}");

        // 誤っている class 1 を重くすると損失は増える
        let minority = loss_value(Some(&[0.5, 5.0]));
        assert!((minority - 1.945110).abs() < 1e-4, "{minority}");
        assert!(minority > plain);

        // 正解している class 0 を重くすると減る
        let majority = loss_value(Some(&[5.0, 0.5]));
        assert!((majority - 0.308754).abs() < 1e-4, "{majority}");
        assert!(majority < plain);

        // 均等な重みは重みなしと同じ
        assert!((loss_value(Some(&[1.0, 1.0])) - plain).abs() < 1e-6);
    }

    fn weights_of<const D: usize>(tensor: Tensor<Autodiff<NdArray>, D>) -> Vec<f32> {
        tensor.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn optimizer_step_leaves_frozen_layers_untouched() {
        type TrainBackend = Autodiff<NdArray>;
        let device = Default::default();
        let model = ModelConfig::new().init::<TrainBackend>(&device).freeze_backbone(2);
        let before = model.clone();

        let images = Tensor::<TrainBackend, 4>::random([2, 64, 64, 3], Distribution::Uniform(0.0, 1.0), &device);
        let targets = Tensor::<TrainBackend, 1, Int>::from_ints([0, 1], &device);
        let output = model.forward_classification(images, targets, Some(&[1.0, 2.0]));
        let grads = GradientsParams::from_grads(output.loss.backward(), &model);
        let mut optim = AdamConfig::new().init();
        let after = optim.step(1e-2, model, grads);

        // stem と先頭 15 ブロックは凍結
        let frozen = NUM_BLOCKS - 2;
        assert_eq!(
            weights_of(before.backbone.stem.conv.weight.val()),
            weights_of(after.backbone.stem.conv.weight.val())
        );
        assert_eq!(
            weights_of(before.backbone.stem.norm.gamma.val()),
            weights_of(after.backbone.stem.norm.gamma.val())
        );
        for i in [0, frozen - 1] {
            assert_eq!(
                weights_of(before.backbone.blocks[i].depthwise.conv.weight.val()),
                weights_of(after.backbone.blocks[i].depthwise.conv.weight.val()),
                "block {i}"
            );
            assert_eq!(
                weights_of(before.backbone.blocks[i].project.weight.val()),
                weights_of(after.backbone.blocks[i].project.weight.val()),
                "block {i}"
            );
        }

        // 末尾ブロック・head_conv・分類ヘッドは更新される
        for i in [frozen, NUM_BLOCKS - 1] {
            assert_ne!(
                weights_of(before.backbone.blocks[i].project.weight.val()),
                weights_of(after.backbone.blocks[i].project.weight.val()),
                "block {i}"
            );
        }
        assert_ne!(
            weights_of(before.backbone.head_conv.conv.weight.val()),
            weights_of(after.backbone.head_conv.conv.weight.val())
        );
        assert_ne!(weights_of(before.head.weight.val()), weights_of(after.head.weight.val()));
    }
}
