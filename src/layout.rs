//! データディレクトリの規約
//!
//! すべてのツールが共有するディレクトリ構成:
//!
//! ```text
//! data/
//!   raw/{recognized,not_recognized}/*           ラベル付け済み・分割前
//!   {train,val,test}/{recognized,not_recognized}/*.{jpg,jpeg,png,webp}
//! ```
//!
//! ラベルのインデックスは not_recognized=0, recognized=1 で固定。
//! モデル出力の index 1 も常に recognized に対応する。

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Result;

/// 前処理後の画像サイズ（正方形）
pub const IMAGE_SIZE: usize = 224;

/// 対象とする拡張子（小文字で比較）
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// クラス名（インデックス順）
pub const CLASS_NAMES: [&str; 2] = ["not_recognized", "recognized"];

/// 二値ラベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassLabel {
    NotRecognized,
    Recognized,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 2] = [ClassLabel::NotRecognized, ClassLabel::Recognized];

    pub fn index(self) -> usize {
        match self {
            ClassLabel::NotRecognized => 0,
            ClassLabel::Recognized => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ClassLabel::NotRecognized),
            1 => Some(ClassLabel::Recognized),
            _ => None,
        }
    }

    pub fn dir_name(self) -> &'static str {
        CLASS_NAMES[self.index()]
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// データ分割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "val" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(format!("unknown split: {other}")),
        }
    }
}

/// `data_dir/split/class` のパス
pub fn class_dir(data_dir: &Path, split: Split, label: ClassLabel) -> PathBuf {
    data_dir.join(split.dir_name()).join(label.dir_name())
}

/// 拡張子が対象画像かどうか（大文字小文字を区別しない）
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// ディレクトリ直下の画像ファイルをファイル名順で列挙
///
/// ディレクトリが存在しない場合は空を返す。
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_is_index_one() {
        assert_eq!(ClassLabel::Recognized.index(), 1);
        assert_eq!(ClassLabel::from_index(1), Some(ClassLabel::Recognized));
        assert_eq!(CLASS_NAMES[1], "recognized");
        assert_eq!(ClassLabel::from_index(2), None);
    }

    #[test]
    fn image_extension_match_ignores_case() {
        assert!(is_image_file(Path::new("a/b.JPG")));
        assert!(is_image_file(Path::new("a/b.webp")));
        assert!(!is_image_file(Path::new("a/b.txt")));
        assert!(!is_image_file(Path::new("a/noext")));
    }

    #[test]
    fn list_image_files_is_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.jpg", "b.txt", "b.jpeg"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(tmp.path().join("sub.png")).unwrap();

        let files = list_image_files(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpeg", "c.png"]);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_image_files(&tmp.path().join("nope")).unwrap().is_empty());
    }
}
