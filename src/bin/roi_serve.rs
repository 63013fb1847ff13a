//! 推論用 Web アプリを起動する

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use roi_classifier::model::DeviceType;
use roi_classifier::serve::run_server;
use roi_classifier::{logging, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "roi-serve", about = "ROI 画像を分類する Web アプリ")]
struct Cli {
    /// 待ち受けホスト（省略時は設定ファイルの値、既定 0.0.0.0）
    #[arg(long)]
    host: Option<String>,

    /// 待ち受けポート（省略時は設定ファイルの値、既定 7860）
    #[arg(long)]
    port: Option<u16>,

    /// 学習済みモデル（ディレクトリまたは .tar.gz）
    #[arg(long)]
    model: Option<PathBuf>,

    /// 設定に関わらず CPU (NdArray) で推論する
    #[arg(long)]
    cpu: bool,

    /// 設定ファイル
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("アドレスを解決できません: {host}:{port}"))?
        .next()
        .with_context(|| format!("アドレスを解決できません: {host}:{port}"))
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load_or_default_from(&cli.config);
    let host = cli.host.unwrap_or(config.serve.host);
    let port = cli.port.unwrap_or(config.serve.port);
    let model_path = cli.model.unwrap_or_else(|| PathBuf::from(&config.serve.model_path));
    let device_type = if cli.cpu { DeviceType::Cpu } else { config.device_type };

    let addr = resolve(&host, port)?;
    // モデルは最初のリクエストで読み込む
    run_server(&model_path, config.serve.threshold, addr, device_type)
        .await
        .with_context(|| format!("サーバーを起動できません: {addr}"))?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
