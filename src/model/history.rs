//! エポックごとの学習履歴（CSV）

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const HISTORY_FILE: &str = "history.csv";

/// 1エポック分の指標
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn epochs(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// ヘッダー付きCSVとして書き出す
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.epochs {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let mut epochs = Vec::new();
        for row in reader.deserialize() {
            epochs.push(row?);
        }
        Ok(Self { epochs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_header_and_one_row_per_epoch() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(HISTORY_FILE);

        let mut history = TrainingHistory::default();
        for epoch in 1..=2 {
            history.push(EpochMetrics {
                epoch,
                train_loss: 0.5,
                train_accuracy: 0.5,
                val_loss: 0.25,
                val_accuracy: 0.75,
            });
        }
        history.save_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("epoch,train_loss,train_accuracy,val_loss,val_accuracy"));
        assert_eq!(text.lines().count(), 3);

        let loaded = TrainingHistory::load_csv(&path).unwrap();
        assert_eq!(loaded.epochs(), history.epochs());
    }
}
