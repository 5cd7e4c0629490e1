// 该文件是 Presubmit 项目的一部分。
// src/server.rs - HTTP 服务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{net::SocketAddr, sync::Arc};

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, State, rejection::JsonRejection},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
  annotation::SubmissionResult,
  auth::{AuthenticationError, IssuerGuard},
  input::{InputError, decode_base64_image},
  model::ModelError,
  task::{BatchItem, BatchTask, DEFAULT_BATCH_CONCURRENCY, SubmissionTask},
};

pub const DEFAULT_BODY_LIMIT: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
  pub task: Arc<SubmissionTask>,
  pub guard: Arc<IssuerGuard>,
  pub batch_concurrency: usize,
}

impl AppState {
  pub fn new(task: Arc<SubmissionTask>, guard: Arc<IssuerGuard>) -> Self {
    Self {
      task,
      guard,
      batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
    }
  }

  pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
    self.batch_concurrency = concurrency.max(1);
    self
  }
}

#[derive(Error, Debug)]
pub enum ApiError {
  #[error(transparent)]
  Unauthorized(#[from] AuthenticationError),
  #[error("{0}")]
  BadImage(#[from] InputError),
  #[error("invalid request body: {0}")]
  BadRequest(String),
  #[error("processing failed: {0}")]
  Model(#[from] ModelError),
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    ApiError::BadRequest(rejection.body_text())
  }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::BadImage(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!("请求失败: {}", self);
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
  pub image: String,
  #[serde(default)]
  pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
  pub images: Vec<ImageRequest>,
}

/// 批量结果中的一项：成功时是完整结果，失败时只有错误信息
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
  Ok(SubmissionResult),
  Err { error: String },
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
  pub results: Vec<BatchEntry>,
}

async fn health() -> Json<serde_json::Value> {
  Json(json!({
    "status": "ok",
    "service": env!("CARGO_PKG_NAME"),
    "version": env!("CARGO_PKG_VERSION"),
  }))
}

async fn process_image(
  State(state): State<AppState>,
  headers: HeaderMap,
  body: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<SubmissionResult>, ApiError> {
  let identity = state.guard.authenticate(&headers).await?;
  let Json(request) = body?;

  let frame = decode_base64_image(&request.image).inspect_err(|e| warn!("图像无法解码: {}", e))?;
  info!(
    "{} 提交 {}x{} 图像",
    identity.subject,
    frame.width(),
    frame.height()
  );

  let result = state.task.run(&frame, &request.symbols).await?;
  Ok(Json(result))
}

async fn process_multiple_images(
  State(state): State<AppState>,
  headers: HeaderMap,
  body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
  let identity = state.guard.authenticate(&headers).await?;
  let Json(request) = body?;
  info!("{} 批量提交 {} 张图像", identity.subject, request.images.len());

  // 无法解码的图像直接记为该项的错误，其余交给批量任务
  let mut results: Vec<Option<BatchEntry>> = Vec::with_capacity(request.images.len());
  let mut pending = Vec::new();
  for (idx, image) in request.images.into_iter().enumerate() {
    match decode_base64_image(&image.image) {
      Ok(frame) => {
        results.push(None);
        pending.push((
          idx,
          BatchItem {
            frame,
            symbols: image.symbols,
          },
        ));
      }
      Err(e) => {
        warn!("第 {} 张图像无法解码: {}", idx + 1, e);
        results.push(Some(BatchEntry::Err {
          error: ApiError::from(e).to_string(),
        }));
      }
    }
  }

  let (indices, items): (Vec<usize>, Vec<BatchItem>) = pending.into_iter().unzip();
  let outcomes = BatchTask::new(state.task.clone())
    .with_concurrency(state.batch_concurrency)
    .run(items)
    .await;

  for (idx, outcome) in indices.into_iter().zip(outcomes) {
    results[idx] = Some(match outcome {
      Ok(result) => BatchEntry::Ok(result),
      Err(e) => BatchEntry::Err {
        error: ApiError::from(e).to_string(),
      },
    });
  }

  Ok(Json(BatchResponse {
    results: results.into_iter().flatten().collect(),
  }))
}

pub fn build_router(state: AppState, body_limit: usize) -> Router {
  Router::new()
    .route("/", get(health))
    .route("/api/health", get(health))
    .route("/api/process-image", post(process_image))
    .route("/api/process-multiple-images", post(process_multiple_images))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听 Ctrl-C: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到 Ctrl-C，正在关闭服务");
}

pub async fn serve(addr: SocketAddr, router: Router) -> std::io::Result<()> {
  let listener = TcpListener::bind(addr).await?;
  info!("HTTP 服务监听于 {}", listener.local_addr()?);
  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await
}
