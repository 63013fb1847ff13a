//! モデル学習
//!
//! エポックループは明示的に書く。各エポックで
//! 1. 学習データをシャッフルしてバッチごとに順伝播・逆伝播・Adam更新
//! 2. 検証データで損失と精度を計測（ドロップアウト無効）
//! 3. 検証精度が改善したら `best/` を上書き
//!
//! 学習終了後は最良チェックポイントを読み戻して正規の成果物として保存する。

use std::path::{Path, PathBuf};

use burn::{
    backend::{Autodiff, NdArray, Wgpu},
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use burn_ndarray::NdArrayDevice;
use burn_wgpu::WgpuDevice;

use crate::error::{Result, RoiError};
use crate::layout::{Split, IMAGE_SIZE};
use crate::ml::dataset::{class_weights, RoiBatcher, RoiDataset};
use crate::ml::device::resolve_device_type;
use crate::ml::ml_model::{ModelConfig, RoiClassifier};
use crate::model::history::HISTORY_FILE;
use crate::model::{
    save_model_bundle, save_model_dir, BestCheckpoint, DeviceType, EpochMetrics, ModelMetadata, TrainingHistory,
    TrainingSettings,
};

/// 学習の入力・出力・ハイパーパラメータ
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// `train/`, `val/` を含むデータディレクトリ
    pub data_dir: PathBuf,
    /// モデルディレクトリ（`best/` もこの下に作られる）
    pub output_dir: PathBuf,
    /// 1ファイル版（tar.gz）の出力先
    pub bundle_path: Option<PathBuf>,
    /// 事前学習済みバックボーン重み（BinBytesRecorder形式）
    pub backbone_weights: Option<PathBuf>,
    pub num_epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
    pub dropout: f64,
    pub trainable_blocks: usize,
    pub image_size: usize,
}

impl TrainConfig {
    /// プロジェクトルートから既定のパスを組み立てる（`<root>/data` → `<root>/saved_model`）
    pub fn from_root(root: &Path, settings: &TrainingSettings) -> Self {
        Self {
            data_dir: root.join("data"),
            output_dir: root.join("saved_model"),
            bundle_path: None,
            backbone_weights: None,
            num_epochs: settings.num_epochs,
            batch_size: settings.batch_size,
            learning_rate: settings.learning_rate,
            seed: settings.seed,
            dropout: settings.dropout,
            trainable_blocks: settings.trainable_blocks,
            image_size: IMAGE_SIZE,
        }
    }
}

/// 学習結果
#[derive(Debug)]
pub struct TrainReport {
    pub output_dir: PathBuf,
    /// 最良 (エポック, 検証精度)。チェックポイントが無ければ None
    pub best: Option<(usize, f64)>,
    pub history: TrainingHistory,
    pub bundle_path: Option<PathBuf>,
}

/// 設定のデバイス種別に応じたバックエンドで学習する
pub fn run_training(config: &TrainConfig, device_type: DeviceType) -> Result<TrainReport> {
    match resolve_device_type(device_type) {
        DeviceType::Wgpu => {
            let device = WgpuDevice::default();
            tracing::info!("GPU (WGPU) モードで学習を開始します: {:?}", device);
            train_model::<Autodiff<Wgpu>>(config, device)
        }
        DeviceType::Cpu => {
            tracing::info!("CPU (NdArray) モードで学習を開始します");
            train_model::<Autodiff<NdArray>>(config, NdArrayDevice::Cpu)
        }
    }
}

/// モデル学習を実行
pub fn train_model<B: AutodiffBackend>(config: &TrainConfig, device: B::Device) -> Result<TrainReport> {
    if !config.data_dir.is_dir() {
        return Err(RoiError::MissingDirectory { path: config.data_dir.clone() });
    }

    tracing::info!("学習データの読み込み: {}", config.data_dir.display());
    let train_dataset = RoiDataset::from_split(&config.data_dir, Split::Train)?;
    let val_dataset = RoiDataset::from_split(&config.data_dir, Split::Val)?;
    tracing::info!("学習データ: {} 枚, 検証データ: {} 枚", train_dataset.len(), val_dataset.len());

    let weights = class_weights(&config.data_dir, Split::Train)?;
    match &weights {
        Some(w) => tracing::info!("クラス重み: not_recognized={:.4}, recognized={:.4}", w.0[0], w.0[1]),
        None => tracing::info!("クラス重みなし"),
    }
    let loss_weights = weights.map(|w| w.to_loss_weights());

    let mut model = build_model::<B>(config, &device)?;
    tracing::info!("モデル準備完了: {} パラメータ", model.num_params());

    let mut optim = AdamConfig::new().init();

    let batcher_train = RoiBatcher::<B>::with_image_size(device.clone(), config.image_size);
    let batcher_val = RoiBatcher::<B::InnerBackend>::with_image_size(device.clone(), config.image_size);

    std::fs::create_dir_all(&config.output_dir)?;
    let mut checkpoint = BestCheckpoint::new(&config.output_dir)?;
    let metadata = ModelMetadata::new(config.image_size, config.dropout, config.trainable_blocks, config.num_epochs);
    let mut history = TrainingHistory::default();

    tracing::info!(
        "学習を開始します。エポック数: {}, バッチサイズ: {}, 学習率: {}",
        config.num_epochs,
        config.batch_size,
        config.learning_rate
    );

    for epoch in 1..=config.num_epochs {
        // 学習フェーズ
        let mut train_loss_sum = 0.0f64;
        let mut train_batches = 0usize;
        let mut train_correct = 0usize;
        let mut train_total = 0usize;

        let shuffle_seed = config.seed.wrapping_add(epoch as u64);
        for items in train_dataset.batches(config.batch_size, Some(shuffle_seed)) {
            let batch = batcher_train.batch(items, &device);
            let output = model.forward_classification(batch.images, batch.targets, loss_weights.as_deref());

            train_loss_sum += output.loss.clone().into_scalar().elem::<f64>();
            train_batches += 1;
            train_total += output.targets.dims()[0];
            train_correct += count_correct(output.output.clone(), output.targets.clone());

            let grads = output.loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(config.learning_rate, model, grads);
        }

        // 検証フェーズ
        let model_valid = model.valid();
        let mut val_loss_sum = 0.0f64;
        let mut val_batches = 0usize;
        let mut val_correct = 0usize;
        let mut val_total = 0usize;

        for items in val_dataset.batches(config.batch_size, None) {
            let batch = batcher_val.batch(items, &device);
            let output = model_valid.forward_classification(batch.images, batch.targets, None);

            val_loss_sum += output.loss.into_scalar().elem::<f64>();
            val_batches += 1;
            val_total += output.targets.dims()[0];
            val_correct += count_correct(output.output, output.targets);
        }

        let metrics = EpochMetrics {
            epoch,
            train_loss: mean(train_loss_sum, train_batches),
            train_accuracy: ratio(train_correct, train_total),
            val_loss: mean(val_loss_sum, val_batches),
            val_accuracy: ratio(val_correct, val_total),
        };
        tracing::info!(
            "Epoch {:>3}/{} | loss={:.4} | accuracy={:.1}% | val_loss={:.4} | val_accuracy={:.1}%",
            epoch,
            config.num_epochs,
            metrics.train_loss,
            metrics.train_accuracy * 100.0,
            metrics.val_loss,
            metrics.val_accuracy * 100.0,
        );

        checkpoint.offer(epoch, metrics.val_accuracy, &metadata, || model_valid.to_bytes())?;
        history.push(metrics);
    }

    // 最良チェックポイントを正規の成果物にする（無ければ最終エポックの重み）
    let (final_metadata, final_bytes) = match checkpoint.load()? {
        Some((best_metadata, best_bytes)) => {
            tracing::info!("最良チェックポイントを読み戻します: {}", checkpoint.dir().display());
            let reloaded = ModelConfig::new()
                .with_dropout(config.dropout)
                .init::<B::InnerBackend>(&device)
                .load_bytes(best_bytes, &device)?;
            (best_metadata, reloaded.to_bytes()?)
        }
        None => {
            tracing::warn!("チェックポイントがありません。最終エポックの重みを保存します");
            (metadata, model.valid().to_bytes()?)
        }
    };

    save_model_dir(&config.output_dir, &final_metadata, &final_bytes)?;
    history.save_csv(&config.output_dir.join(HISTORY_FILE))?;
    tracing::info!("モデルを保存しました: {}", config.output_dir.display());

    let bundle_path = match &config.bundle_path {
        Some(path) => {
            let written = save_model_bundle(path, &final_metadata, &final_bytes)?;
            tracing::info!("1ファイル版を保存しました: {}", written.display());
            Some(written)
        }
        None => None,
    };

    Ok(TrainReport {
        output_dir: config.output_dir.clone(),
        best: checkpoint.best(),
        history,
        bundle_path,
    })
}

/// 事前学習済み重みの読み込みと凍結を含めたモデル構築
fn build_model<B: AutodiffBackend>(config: &TrainConfig, device: &B::Device) -> Result<RoiClassifier<B>> {
    let model = ModelConfig::new().with_dropout(config.dropout).init::<B>(device);

    let model = match &config.backbone_weights {
        Some(path) => {
            tracing::info!("事前学習済みバックボーンを読み込みます: {}", path.display());
            model.with_backbone_file(path, device)?
        }
        None => {
            tracing::warn!("バックボーン重みが指定されていません。ランダム初期化から学習します");
            model
        }
    };

    Ok(model.freeze_backbone(config.trainable_blocks))
}

fn count_correct<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    // argmax(1) は [batch, 1] を返すので平坦化してから比較
    let predicted = output.argmax(1).flatten::<1>(0, 1);
    predicted.equal(targets).int().sum().into_scalar().elem::<i64>() as usize
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 {
        sum / count as f64
    } else {
        f64::NAN
    }
}

fn ratio(correct: usize, total: usize) -> f64 {
    if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{class_dir, ClassLabel};
    use crate::model::{load_model_bundle, load_model_dir, BEST_DIR_NAME};
    use image::{Rgb, RgbImage};

    fn write_split(data_dir: &Path, split: Split, per_class: usize) {
        for label in ClassLabel::ALL {
            let dir = class_dir(data_dir, split, label);
            std::fs::create_dir_all(&dir).unwrap();
            let value = if label == ClassLabel::Recognized { 220 } else { 30 };
            for i in 0..per_class {
                RgbImage::from_pixel(12, 12, Rgb([value, value, value]))
                    .save(dir.join(format!("{label}_{i}.png")))
                    .unwrap();
            }
        }
    }

    fn tiny_config(root: &Path) -> TrainConfig {
        let mut config = TrainConfig::from_root(root, &TrainingSettings::default());
        config.num_epochs = 2;
        config.batch_size = 3;
        config.image_size = 32;
        config
    }

    #[test]
    fn from_root_uses_data_and_saved_model() {
        let config = TrainConfig::from_root(Path::new("proj"), &TrainingSettings::default());
        assert_eq!(config.data_dir, PathBuf::from("proj/data"));
        assert_eq!(config.output_dir, PathBuf::from("proj/saved_model"));
        assert_eq!(config.image_size, IMAGE_SIZE);
        assert_eq!(config.learning_rate, 1e-4);
    }

    #[test]
    fn missing_data_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = train_model::<Autodiff<NdArray>>(&tiny_config(tmp.path()), NdArrayDevice::Cpu).unwrap_err();
        assert!(matches!(err, RoiError::MissingDirectory { .. }));
    }

    #[test]
    fn empty_val_class_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("data");
        write_split(&data_dir, Split::Train, 2);
        std::fs::create_dir_all(class_dir(&data_dir, Split::Val, ClassLabel::Recognized)).unwrap();

        let err = train_model::<Autodiff<NdArray>>(&tiny_config(tmp.path()), NdArrayDevice::Cpu).unwrap_err();
        assert!(matches!(err, RoiError::NoImages { .. }));
    }

    #[test]
    fn training_writes_artifact_checkpoint_history_and_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("data");
        write_split(&data_dir, Split::Train, 3);
        write_split(&data_dir, Split::Val, 1);

        let mut config = tiny_config(tmp.path());
        config.bundle_path = Some(tmp.path().join("model.tar.gz"));

        let report = train_model::<Autodiff<NdArray>>(&config, NdArrayDevice::Cpu).unwrap();

        assert_eq!(report.history.epochs().len(), 2);
        let (best_epoch, _) = report.best.expect("first epoch always checkpoints");
        assert!(best_epoch >= 1 && best_epoch <= 2);

        let (metadata, binary) = load_model_dir(&config.output_dir).unwrap();
        assert_eq!(metadata.image_size, 32);
        assert_eq!(metadata.best_epoch, Some(best_epoch));
        assert!(!binary.is_empty());
        assert!(config.output_dir.join(BEST_DIR_NAME).join("model.bin").is_file());
        assert!(config.output_dir.join(HISTORY_FILE).is_file());

        let (bundle_metadata, bundle_binary) = load_model_bundle(&report.bundle_path.unwrap()).unwrap();
        assert_eq!(bundle_metadata, metadata);
        assert_eq!(bundle_binary, binary);
    }
}
