//! 最良チェックポイントの管理
//!
//! エポックごとに検証精度を受け取り、これまでの最良値を厳密に上回ったときだけ
//! `best/` ディレクトリを上書きします（最良のみ保持）。

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::model_metadata::ModelMetadata;
use crate::model::model_storage::{load_model_dir, save_model_dir};

/// 最良チェックポイントのディレクトリ名
pub const BEST_DIR_NAME: &str = "best";

pub struct BestCheckpoint {
    dir: PathBuf,
    best: Option<(usize, f64)>,
}

impl BestCheckpoint {
    /// `output_dir/best` を管理対象にする
    ///
    /// 前回の実行で残った `best/` は削除する。1回の学習の中でのみ有効なため。
    pub fn new(output_dir: &Path) -> Result<Self> {
        let dir = output_dir.join(BEST_DIR_NAME);
        if dir.exists() {
            tracing::debug!("前回の best チェックポイントを削除します: {}", dir.display());
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(Self { dir, best: None })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// これまでの最良 (エポック, 検証精度)
    pub fn best(&self) -> Option<(usize, f64)> {
        self.best
    }

    /// エポック結果を提示し、改善していれば保存する
    ///
    /// `serialize` は保存が必要なときだけ呼ばれる。保存した場合 true。
    pub fn offer<F>(&mut self, epoch: usize, val_accuracy: f64, metadata: &ModelMetadata, serialize: F) -> Result<bool>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        let improved = match self.best {
            None => !val_accuracy.is_nan(),
            Some((_, best)) => val_accuracy > best,
        };
        if !improved {
            return Ok(false);
        }

        let binary = serialize()?;
        let metadata = metadata.clone().with_best(epoch, val_accuracy);
        save_model_dir(&self.dir, &metadata, &binary)?;
        self.best = Some((epoch, val_accuracy));

        tracing::info!(
            "検証精度が改善しました (epoch {}, val_accuracy={:.4})。チェックポイントを保存: {}",
            epoch,
            val_accuracy,
            self.dir.display()
        );
        Ok(true)
    }

    /// 保存済みの最良チェックポイントを読み込む（無ければ None）
    pub fn load(&self) -> Result<Option<(ModelMetadata, Vec<u8>)>> {
        if self.best.is_none() || !self.dir.is_dir() {
            return Ok(None);
        }
        load_model_dir(&self.dir).map(Some)
    }
}
