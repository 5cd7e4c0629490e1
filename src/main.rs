// 该文件是 Presubmit 项目的一部分。
// src/main.rs - 服务主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use presubmit::{
  FromUrl,
  auth::{GoogleTokenInfo, IssuerGuard},
  model::GeminiBuilder,
  server::{AppState, build_router, serve},
  task::{SubmissionTask, TaskConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let timeout = Duration::from_secs(args.timeout);

  info!("模型端点: {}", args.model);
  info!(
    "模型: {} / {}, 边界框顺序 {:?}",
    args.describe_model, args.structure_model, args.box_order
  );

  let model = GeminiBuilder::from_url(&args.model)
    .context("无法解析模型端点")?
    .api_key(args.api_key)
    .timeout(timeout)
    .build()
    .context("无法创建模型客户端")?;

  let task = SubmissionTask::new(
    Arc::new(model),
    TaskConfig {
      describe_model: args.describe_model,
      structure_model: args.structure_model,
      box_order: args.box_order,
      max_side: args.max_side,
    },
  );

  let verifier =
    GoogleTokenInfo::new(args.tokeninfo_url, timeout).context("无法创建令牌校验客户端")?;
  let guard = IssuerGuard::new(Arc::new(verifier))
    .allowed_issuers(args.issuers)
    .audience(args.audience);

  let state = AppState::new(Arc::new(task), Arc::new(guard)).with_batch_concurrency(args.concurrency);
  let router = build_router(state, args.body_limit_mb * 1024 * 1024);

  serve(args.bind, router).await.context("HTTP 服务异常退出")?;
  info!("服务已停止");

  Ok(())
}
