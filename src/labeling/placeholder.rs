//! 動作確認用のダミーデータ生成
//!
//! `data/{train,val,test}/<class>/` の画像が足りないときにランダムノイズ画像で補う。
//! 学習パイプラインを通すためだけのもので、精度には意味がない。

use std::path::Path;

use image::RgbImage;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::layout::{class_dir, list_image_files, ClassLabel, Split, IMAGE_SIZE};

/// 各 split・クラスで最低限そろえる枚数
pub const MIN_PER_CLASS: usize = 2;

/// 不足分のノイズ画像を書き出し、生成した枚数を返す
///
/// 既に `min_per_class` 枚以上あるディレクトリには何もしない。
pub fn ensure_placeholder_data(data_dir: &Path, min_per_class: usize, seed: u64) -> Result<usize> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut written = 0;

    for split in Split::ALL {
        for label in ClassLabel::ALL {
            let dir = class_dir(data_dir, split, label);
            std::fs::create_dir_all(&dir)?;

            let existing = list_image_files(&dir)?.len();
            for i in existing..min_per_class {
                let mut pixels = vec![0u8; IMAGE_SIZE * IMAGE_SIZE * 3];
                rng.fill(&mut pixels[..]);
                let image = RgbImage::from_raw(IMAGE_SIZE as u32, IMAGE_SIZE as u32, pixels)
                    .ok_or_else(|| crate::error::RoiError::InvalidImage("ダミー画像の生成に失敗".to_string()))?;

                let path = dir.join(format!("placeholder_{}_{}_{}.png", label, split, i));
                image.save(&path)?;
                written += 1;
            }
        }
    }

    if written > 0 {
        tracing::info!("ダミー画像を {} 枚生成しました: {}", written, data_dir.display());
    } else {
        tracing::info!("画像は揃っています。生成は不要です: {}", data_dir.display());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_split_and_class() {
        let tmp = tempfile::tempdir().unwrap();
        let written = ensure_placeholder_data(tmp.path(), MIN_PER_CLASS, 42).unwrap();
        assert_eq!(written, 3 * 2 * MIN_PER_CLASS);

        for split in Split::ALL {
            for label in ClassLabel::ALL {
                let files = list_image_files(&class_dir(tmp.path(), split, label)).unwrap();
                assert_eq!(files.len(), MIN_PER_CLASS);
                let image = image::open(&files[0]).unwrap();
                assert_eq!((image.width(), image.height()), (IMAGE_SIZE as u32, IMAGE_SIZE as u32));
            }
        }
        assert!(class_dir(tmp.path(), Split::Val, ClassLabel::Recognized)
            .join("placeholder_recognized_val_0.png")
            .is_file());

        // 2回目は何もしない
        assert_eq!(ensure_placeholder_data(tmp.path(), MIN_PER_CLASS, 42).unwrap(), 0);
    }

    #[test]
    fn only_tops_up_missing_images() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = class_dir(tmp.path(), Split::Train, ClassLabel::Recognized);
        std::fs::create_dir_all(&dir).unwrap();
        RgbImage::new(8, 8).save(dir.join("real.png")).unwrap();

        let written = ensure_placeholder_data(tmp.path(), MIN_PER_CLASS, 1).unwrap();
        assert_eq!(written, 3 * 2 * MIN_PER_CLASS - 1);
        assert_eq!(list_image_files(&dir).unwrap().len(), MIN_PER_CLASS);
    }
}
