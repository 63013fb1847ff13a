//! raw データを train / val に分割する
//!
//! クラスごとにファイル名順で列挙 → シード付きシャッフル →
//! 末尾 `max(1, floor(n * val_ratio))` 枚を val、残りを train にコピーする（元ファイルは残る）。

use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, RoiError};
use crate::layout::{class_dir, list_image_files, ClassLabel, Split};

/// 1クラス分の分割結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSplit {
    pub label: ClassLabel,
    pub train: usize,
    pub val: usize,
}

/// 検証用の枚数（1枚以上のクラスに対して使う）
pub fn val_count(count: usize, val_ratio: f64) -> usize {
    ((count as f64 * val_ratio).floor() as usize).max(1).min(count)
}

/// `raw_dir/<class>/*` を `data_dir/{train,val}/<class>/` へコピーする
///
/// クラスディレクトリが無い・空の場合はそのクラスを飛ばす。
pub fn split_raw(raw_dir: &Path, data_dir: &Path, val_ratio: f64, seed: u64) -> Result<Vec<ClassSplit>> {
    if !raw_dir.is_dir() {
        return Err(RoiError::MissingDirectory { path: raw_dir.to_path_buf() });
    }
    if !(0.0..=1.0).contains(&val_ratio) {
        return Err(RoiError::InvalidConfig(format!("val_ratio は 0〜1 の範囲で指定してください: {val_ratio}")));
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut results = Vec::new();

    for label in [ClassLabel::Recognized, ClassLabel::NotRecognized] {
        let src = raw_dir.join(label.dir_name());
        if !src.is_dir() {
            tracing::warn!("クラスディレクトリが存在しません: {}", src.display());
            continue;
        }

        let mut images = list_image_files(&src)?;
        if images.is_empty() {
            tracing::warn!("画像がありません: {}", src.display());
            continue;
        }
        images.shuffle(&mut rng);

        let n_val = val_count(images.len(), val_ratio);
        let n_train = images.len() - n_val;
        let (train_list, val_list) = images.split_at(n_train);

        for (split, files) in [(Split::Train, train_list), (Split::Val, val_list)] {
            let out_dir = class_dir(data_dir, split, label);
            std::fs::create_dir_all(&out_dir)?;
            for file in files {
                if let Some(name) = file.file_name() {
                    std::fs::copy(file, out_dir.join(name))?;
                }
            }
        }

        tracing::debug!("{}: {} train, {} val", label, n_train, n_val);
        results.push(ClassSplit { label, train: n_train, val: n_val });
    }

    Ok(results)
}
