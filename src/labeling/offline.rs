//! オフラインラベル付け
//!
//! 未ラベル画像を1枚ずつ表示し、端末で 1（recognized）/ 0（not_recognized）を入力すると
//! `raw/<class>/` へ移動する。q で中断。移動は破壊的（元の場所からは消える）。

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Result, RoiError};
use crate::layout::{list_image_files, ClassLabel};

/// 画像を人に見せる手段
pub trait ImageViewer {
    fn open(&self, path: &Path);
}

/// OS既定のビューアで開く（失敗は無視）
pub struct SystemViewer;

impl ImageViewer for SystemViewer {
    fn open(&self, path: &Path) {
        let mut command = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else {
            Command::new("xdg-open")
        };

        let result = command
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = result {
            tracing::debug!("ビューアを起動できません ({}): {}", path.display(), e);
        }
    }
}

/// 端末のみ（`--no-open`）
pub struct NoViewer;

impl ImageViewer for NoViewer {
    fn open(&self, _path: &Path) {}
}

/// ラベル付けの結果
#[derive(Debug, Default)]
pub struct LabelSummary {
    /// 移動先パスとラベル
    pub moved: Vec<(PathBuf, ClassLabel)>,
    /// q または入力終端で途中終了したか
    pub stopped_early: bool,
}

/// 1行の入力を解釈
#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Label(ClassLabel),
    Quit,
    Retry,
}

fn parse_answer(line: &str) -> Answer {
    match line.trim().to_lowercase().as_str() {
        "1" => Answer::Label(ClassLabel::Recognized),
        "0" => Answer::Label(ClassLabel::NotRecognized),
        "q" => Answer::Quit,
        _ => Answer::Retry,
    }
}

/// ファイルを移動（別ファイルシステムならコピー＋削除）
fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if std::fs::rename(src, dst).is_err() {
        std::fs::copy(src, dst)?;
        std::fs::remove_file(src)?;
    }
    Ok(())
}

/// 対話ラベル付けを実行
///
/// `input`/`output` は通常 stdin/stdout。
pub fn run_labeling<R: BufRead, W: Write>(
    input_dir: &Path,
    raw_dir: &Path,
    viewer: &dyn ImageViewer,
    mut input: R,
    mut output: W,
) -> Result<LabelSummary> {
    for label in ClassLabel::ALL {
        std::fs::create_dir_all(raw_dir.join(label.dir_name()))?;
    }

    if !input_dir.is_dir() {
        return Err(RoiError::MissingDirectory { path: input_dir.to_path_buf() });
    }
    let files = list_image_files(input_dir)?;
    if files.is_empty() {
        return Err(RoiError::NoImages { dir: input_dir.to_path_buf() });
    }

    writeln!(
        output,
        "Found {} images. For each: type 1 (recognized) or 0 (not_recognized), then Enter. q = quit.",
        files.len()
    )?;

    let mut summary = LabelSummary::default();
    let total = files.len();

    for (i, file) in files.iter().enumerate() {
        viewer.open(file);
        let name = file.file_name().map(|n| n.to_os_string()).unwrap_or_default();

        loop {
            write!(output, "[{}/{}] {} > ", i + 1, total, name.to_string_lossy())?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                summary.stopped_early = true;
                return Ok(summary);
            }

            match parse_answer(&line) {
                Answer::Quit => {
                    writeln!(output, "Quit.")?;
                    summary.stopped_early = true;
                    return Ok(summary);
                }
                Answer::Label(label) => {
                    let dst = raw_dir.join(label.dir_name()).join(&name);
                    move_file(file, &dst)?;
                    writeln!(output, "  -> {}/{}", label, name.to_string_lossy())?;
                    tracing::debug!("{} -> {}", file.display(), dst.display());
                    summary.moved.push((dst, label));
                    break;
                }
                Answer::Retry => writeln!(output, "  Type 1 or 0")?,
            }
        }
    }

    writeln!(output, "Done.")?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingViewer(RefCell<Vec<PathBuf>>);

    impl ImageViewer for RecordingViewer {
        fn open(&self, path: &Path) {
            self.0.borrow_mut().push(path.to_path_buf());
        }
    }

    fn setup(names: &[&str]) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let input_dir = tmp.path().join("inbox");
        std::fs::create_dir_all(&input_dir).unwrap();
        for name in names {
            std::fs::write(input_dir.join(name), name.as_bytes()).unwrap();
        }
        let raw_dir = tmp.path().join("raw");
        (tmp, input_dir, raw_dir)
    }

    #[test]
    fn parses_answers() {
        assert_eq!(parse_answer("1\n"), Answer::Label(ClassLabel::Recognized));
        assert_eq!(parse_answer(" 0 "), Answer::Label(ClassLabel::NotRecognized));
        assert_eq!(parse_answer("Q\n"), Answer::Quit);
        assert_eq!(parse_answer("y\n"), Answer::Retry);
    }

    #[test]
    fn moves_files_in_name_order() {
        let (_tmp, input_dir, raw_dir) = setup(&["b.png", "a.jpg", "notes.txt"]);
        let viewer = RecordingViewer(RefCell::new(Vec::new()));
        let mut out = Vec::new();

        let summary = run_labeling(&input_dir, &raw_dir, &viewer, "x\n1\n0\n".as_bytes(), &mut out).unwrap();

        assert!(!summary.stopped_early);
        assert_eq!(summary.moved.len(), 2);
        assert!(raw_dir.join("recognized/a.jpg").is_file());
        assert!(raw_dir.join("not_recognized/b.png").is_file());
        assert!(!input_dir.join("a.jpg").exists());
        assert!(input_dir.join("notes.txt").exists());

        let opened = viewer.0.borrow();
        assert!(opened[0].ends_with("a.jpg"));
        assert!(opened[1].ends_with("b.png"));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[1/2] a.jpg > "));
        assert!(text.contains("  Type 1 or 0"));
        assert!(text.trim_end().ends_with("Done."));
    }

    #[test]
    fn quit_and_eof_stop_without_moving_rest() {
        let (_tmp, input_dir, raw_dir) = setup(&["a.png", "b.png"]);
        let summary = run_labeling(&input_dir, &raw_dir, &NoViewer, "1\nq\n".as_bytes(), Vec::new()).unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.moved.len(), 1);
        assert!(input_dir.join("b.png").exists());

        let summary = run_labeling(&input_dir, &raw_dir, &NoViewer, "".as_bytes(), Vec::new()).unwrap();
        assert!(summary.stopped_early);
        assert!(summary.moved.is_empty());
    }

    #[test]
    fn missing_or_empty_input_dir_is_an_error() {
        let (_tmp, input_dir, raw_dir) = setup(&[]);
        let err = run_labeling(&input_dir, &raw_dir, &NoViewer, "".as_bytes(), Vec::new()).unwrap_err();
        assert!(matches!(err, RoiError::NoImages { .. }));
        // 出力先のクラスディレクトリは先に作られる
        assert!(raw_dir.join("recognized").is_dir());
        assert!(raw_dir.join("not_recognized").is_dir());

        let err = run_labeling(&input_dir.join("nope"), &raw_dir, &NoViewer, "".as_bytes(), Vec::new()).unwrap_err();
        assert!(matches!(err, RoiError::MissingDirectory { .. }));
    }
}
