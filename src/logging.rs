//! ログ初期化

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` を尊重してfmtサブスクライバを設定する（未指定時は info）
///
/// 出力先は stderr（stdout は対話プロンプトと結果表示に使う）。
/// 2回目以降の呼び出しは何もしない。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
