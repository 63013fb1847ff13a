//! 推論用 Web アプリ（axum）
//!
//! - `GET /` 画像を選んで分類するページ
//! - `POST /api/predict` `{ "image": "<base64 or data URL>" }` → `{ "label", "confidence" }`

pub mod page;
pub mod service;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use burn::backend::{NdArray, Wgpu};
use burn::tensor::backend::Backend;
use burn_ndarray::NdArrayDevice;
use burn_wgpu::WgpuDevice;
use serde::Deserialize;

use crate::error::Result;
use crate::ml::device::resolve_device_type;
use crate::ml::inference::Prediction;
use crate::model::DeviceType;

pub use service::{decode_base64_image, RoiService};

/// リクエスト本文の上限（base64 で約 1.33 倍になるので、15MB 程度の写真まで受け付ける）
pub const MAX_REQUEST_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub image: Option<String>,
}

/// HTTP 500 として返すエラー
#[derive(Debug)]
pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.0 }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

async fn predict<B: Backend>(
    State(service): State<Arc<RoiService<B>>>,
    Json(request): Json<PredictRequest>,
) -> std::result::Result<Json<Prediction>, ApiError> {
    // 推論は CPU/GPU を占有するのでブロッキングスレッドで実行
    let result = tokio::task::spawn_blocking(move || service.predict_encoded(request.image.as_deref()))
        .await
        .map_err(|e| {
            if e.is_panic() {
                // GPU アダプタが無い環境で WGPU を使うとここに来る
                tracing::error!("推論タスクが異常終了しました。GPU が使えない環境では --cpu を指定してください");
                ApiError("推論タスクが異常終了しました（GPU が使えない場合は --cpu で起動してください）".to_string())
            } else {
                ApiError(format!("推論タスクエラー: {e}"))
            }
        })?;

    match result {
        Ok(prediction) => {
            tracing::debug!("推論結果: {} ({:.4})", prediction.label, prediction.confidence);
            Ok(Json(prediction))
        }
        Err(e) => {
            tracing::error!("推論エラー: {}", e);
            Err(ApiError(e.to_string()))
        }
    }
}

pub fn router<B: Backend>(service: Arc<RoiService<B>>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/predict", post(predict::<B>))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(service)
}

/// 指定アドレスで待ち受ける
pub async fn serve<B: Backend>(service: Arc<RoiService<B>>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("http://{} で待ち受けています（モデル: {}）", addr, service.model_path().display());
    axum::serve(listener, router(service)).await?;
    Ok(())
}

/// 設定のデバイス種別に応じたバックエンドでサーバーを起動する
pub async fn run_server(model_path: &Path, threshold: f32, addr: SocketAddr, device_type: DeviceType) -> Result<()> {
    match resolve_device_type(device_type) {
        DeviceType::Wgpu => {
            let service = RoiService::<Wgpu>::new(model_path, WgpuDevice::default()).with_threshold(threshold);
            serve(Arc::new(service), addr).await
        }
        DeviceType::Cpu => {
            let service = RoiService::<NdArray>::new(model_path, NdArrayDevice::Cpu).with_threshold(threshold);
            serve(Arc::new(service), addr).await
        }
    }
}
