//! 学習データセットとバッチ生成
//!
//! `data/<split>/<class>/` 以下の画像を列挙し、シード付きの順列からバッチを切り出す。
//! 画像のデコードはバッチ化の時点まで遅延される。

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::{backend::Backend, Int, Tensor};
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, RoiError};
use crate::layout::{class_dir, list_image_files, ClassLabel, Split, IMAGE_SIZE};
use crate::ml::preprocess::load_image_with_size;

/// split 以下の全画像パスとラベル（not_recognized=0, recognized=1）
///
/// クラスディレクトリが無い場合は単にスキップする。
pub fn list_images_by_class(data_dir: &Path, split: Split) -> Result<(Vec<PathBuf>, Vec<usize>)> {
    let mut paths = Vec::new();
    let mut labels = Vec::new();
    for label in ClassLabel::ALL {
        for path in list_image_files(&class_dir(data_dir, split, label))? {
            paths.push(path);
            labels.push(label.index());
        }
    }
    Ok((paths, labels))
}

/// クラス不均衡補正用の重み {0: w0, 1: w1}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassWeights(pub [f64; 2]);

impl ClassWeights {
    /// ラベル列から `total / (2 * count)` を計算。どちらかのクラスが0件なら None
    pub fn from_labels(labels: &[usize]) -> Option<Self> {
        let total = labels.len();
        if total == 0 {
            return None;
        }
        let n0 = labels.iter().filter(|&&y| y == 0).count();
        let n1 = total - n0;
        if n0 == 0 || n1 == 0 {
            return None;
        }
        let total = total as f64;
        Some(Self([total / (2.0 * n0 as f64), total / (2.0 * n1 as f64)]))
    }

    pub fn get(&self, label: ClassLabel) -> f64 {
        self.0[label.index()]
    }

    /// 損失関数に渡す形式
    pub fn to_loss_weights(&self) -> Vec<f32> {
        self.0.iter().map(|w| *w as f32).collect()
    }
}

/// split のクラス比率から重みを計算する
pub fn class_weights(data_dir: &Path, split: Split) -> Result<Option<ClassWeights>> {
    let (_, labels) = list_images_by_class(data_dir, split)?;
    Ok(ClassWeights::from_labels(&labels))
}

/// データセットアイテム（画像パスのみ保持）
#[derive(Clone, Debug)]
pub struct RoiItem {
    pub path: PathBuf,
    pub label: usize,
}

/// 1つの split の画像一覧
#[derive(Clone, Debug)]
pub struct RoiDataset {
    items: Vec<RoiItem>,
}

impl RoiDataset {
    /// `data_dir/split` から読み込む
    ///
    /// いずれかのクラスディレクトリが無い・空の場合は `NoImages`。
    pub fn from_split(data_dir: &Path, split: Split) -> Result<Self> {
        let mut items = Vec::new();
        for label in ClassLabel::ALL {
            let dir = class_dir(data_dir, split, label);
            let files = list_image_files(&dir)?;
            if files.is_empty() {
                return Err(RoiError::NoImages { dir });
            }
            tracing::info!("  {}/{}: {} 枚", split, label, files.len());
            items.extend(files.into_iter().map(|path| RoiItem { path, label: label.index() }));
        }
        Ok(Self { items })
    }

    pub fn from_items(items: Vec<RoiItem>) -> Self {
        Self { items }
    }

    pub fn labels(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.label).collect()
    }

    /// バッチ列を作る
    ///
    /// `shuffle_seed` が None なら列挙順、Some ならそのシードで並べ替えた順。
    /// 何度呼んでも同じ引数なら同じ順序になる。
    pub fn batches(&self, batch_size: usize, shuffle_seed: Option<u64>) -> Batches<'_> {
        let mut order: Vec<usize> = (0..self.items.len()).collect();
        if let Some(seed) = shuffle_seed {
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            order.shuffle(&mut rng);
        }
        Batches {
            items: &self.items,
            order,
            batch_size: batch_size.max(1),
            cursor: 0,
        }
    }

    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.items.len().div_ceil(batch_size.max(1))
    }
}

impl Dataset<RoiItem> for RoiDataset {
    fn get(&self, index: usize) -> Option<RoiItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// 有限のバッチ列（最後のバッチは短い場合がある）
pub struct Batches<'a> {
    items: &'a [RoiItem],
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Vec<RoiItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let batch = self.order[self.cursor..end]
            .iter()
            .map(|&i| self.items[i].clone())
            .collect();
        self.cursor = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.cursor).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}

/// バッチデータ
#[derive(Clone, Debug)]
pub struct RoiBatch<B: Backend> {
    /// [batch, H, W, 3]
    pub images: Tensor<B, 4>,
    /// [batch]
    pub targets: Tensor<B, 1, Int>,
}

/// バッチャー
#[derive(Clone, Debug)]
pub struct RoiBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> RoiBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self::with_image_size(device, IMAGE_SIZE)
    }

    pub fn with_image_size(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }
}

impl<B: Backend> Batcher<B, RoiItem, RoiBatch<B>> for RoiBatcher<B> {
    fn batch(&self, items: Vec<RoiItem>, _device: &B::Device) -> RoiBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;
        let mut all_pixels = Vec::with_capacity(batch_size * size * size * 3);
        let mut targets_vec = Vec::with_capacity(batch_size);

        for item in items {
            match load_image_with_size(&item.path, size) {
                Ok(image_data) => all_pixels.extend_from_slice(&image_data),
                Err(e) => {
                    tracing::warn!("画像読み込み失敗 {}: {}（ゼロで埋めます）", item.path.display(), e);
                    all_pixels.extend(std::iter::repeat(0.0f32).take(size * size * 3));
                }
            }
            targets_vec.push(item.label as i64);
        }

        let images = Tensor::<B, 1>::from_floats(all_pixels.as_slice(), &self.device)
            .reshape([batch_size, size, size, 3]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets_vec.as_slice(), &self.device);

        RoiBatch { images, targets }
    }
}
