// 该文件是 Presubmit 项目的一部分。
// src/bin/simple_batch.rs - 多张图像批量批改
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

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use url::Url;

use presubmit::{
  FromUrl,
  input::load_image_files,
  model::{GeminiBuilder, gemini::GEMINI_DEFAULT_URL},
  output::{OutputWrapper, draw::Overlay, render_each},
  task::{BatchItem, BatchTask, DEFAULT_BATCH_CONCURRENCY, SubmissionTask, TaskConfig},
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型端点
  #[arg(long, value_name = "MODEL", default_value = GEMINI_DEFAULT_URL)]
  pub model: Url,
  /// Gemini API Key
  #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
  pub api_key: String,
  /// 输入图像，可重复
  #[arg(long, value_name = "SOURCE", required = true)]
  pub input: Vec<Url>,
  /// 输出，通常是 `folder:///dir?record`
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 候选符号，逗号分隔，所有图像共用
  #[arg(long, value_delimiter = ',')]
  pub symbols: Vec<String>,
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  #[arg(long, default_value_t = DEFAULT_BATCH_CONCURRENCY)]
  pub concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型端点: {}", args.model);
  info!("输入数量: {}", args.input.len());
  info!("输出路径: {}", args.output);

  // 读取失败的输入保留位置，不影响其余图像
  let frames = load_image_files(&args.input);

  let model = GeminiBuilder::from_url(&args.model)?
    .api_key(args.api_key)
    .build()?;
  let mut overlay = Overlay::default();
  if let Some(path) = &args.font {
    overlay = overlay.with_font_file(path)?;
  }
  let output = OutputWrapper::from_url(&args.output)?.with_overlay(overlay);

  let task = Arc::new(SubmissionTask::new(Arc::new(model), TaskConfig::default()));
  let batch = BatchTask::new(task).with_concurrency(args.concurrency);

  let items = frames
    .iter()
    .flatten()
    .map(|frame| BatchItem {
      frame: frame.clone(),
      symbols: args.symbols.clone(),
    })
    .collect();
  let mut outcomes = batch.run(items).await.into_iter();

  let mut failed = 0;
  let mut finished = Vec::new();
  for (url, frame) in args.input.iter().zip(&frames) {
    let Ok(frame) = frame else {
      failed += 1;
      continue;
    };
    match outcomes.next() {
      Some(Ok(result)) => {
        info!("{}: {} 处错误", url, result.mistake_count());
        finished.push((frame, result));
      }
      Some(Err(e)) => {
        error!("{}: {}", url, e);
        failed += 1;
      }
      None => break,
    }
  }

  failed += render_each(&output, finished.iter().map(|(frame, result)| (*frame, result)));
  info!("批量批改完成: 共 {} 张, 失败 {}", args.input.len(), failed);

  Ok(())
}
