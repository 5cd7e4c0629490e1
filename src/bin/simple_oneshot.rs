// 该文件是 Presubmit 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像批改
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use presubmit::{
  FromUrl,
  annotation::BoxOrder,
  model::{GeminiBuilder, gemini::GEMINI_DEFAULT_URL},
  output::{OutputWrapper, Render, draw::Overlay},
  task::{SubmissionTask, TaskConfig},
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型端点
  #[arg(long, value_name = "MODEL", default_value = GEMINI_DEFAULT_URL)]
  pub model: Url,
  /// Gemini API Key
  #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
  pub api_key: String,
  /// 输入图像，`image:///path/to/work.jpeg`
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，`image:///out.png` 或 `folder:///dir`
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 候选符号，逗号分隔
  #[arg(long, value_delimiter = ',')]
  pub symbols: Vec<String>,
  /// 替换内置字体的 TTF/OTF 文件
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  #[arg(long, default_value = "yxyx")]
  pub box_order: BoxOrder,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型端点: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let frame = presubmit::input::ImageFileInput::from_url(&args.input)?
    .into_frame()
    .context("输入中没有图像")?;
  let model = GeminiBuilder::from_url(&args.model)?
    .api_key(args.api_key)
    .build()?;

  let mut overlay = Overlay::default();
  if let Some(path) = &args.font {
    overlay = overlay.with_font_file(path)?;
  }
  let output = OutputWrapper::from_url(&args.output)?.with_overlay(overlay);

  let task = SubmissionTask::new(
    Arc::new(model),
    TaskConfig {
      box_order: args.box_order,
      ..TaskConfig::default()
    },
  );

  info!("开始批改...");
  let now = std::time::Instant::now();
  let result = task.run(&frame, &args.symbols).await?;
  info!("批改完成，耗时: {:.2?}", now.elapsed());

  for annotation in &result.annotations {
    info!(
      "  {:?} {} -> {}",
      annotation.box_2d.to_array(),
      annotation.text,
      if annotation.has_mistake() {
        annotation.mistakes.as_str()
      } else {
        "正确"
      }
    );
  }
  output.render_result(&frame, &result)?;

  Ok(())
}
