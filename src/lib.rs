//! 計測 ROI 二値分類ツール群
//!
//! ラベル付け → 分割 → 学習 → 変換 → 推論 の各段階をライブラリとして提供し、
//! `src/bin/` の各 CLI から呼び出す。

#![recursion_limit = "256"]

pub mod error;
pub mod export;
pub mod labeling;
pub mod layout;
pub mod logging;
pub mod model;

#[cfg(feature = "ml")]
pub mod ml;
#[cfg(feature = "ml")]
pub mod serve;

pub use error::{Result, RoiError};
pub use layout::{ClassLabel, Split, CLASS_NAMES, IMAGE_SIZE};
pub use model::AppConfig;
