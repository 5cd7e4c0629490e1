// 该文件是 Presubmit 项目的一部分。
// src/task.rs - 两阶段查询与批量任务
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

use std::{sync::Arc, time::Instant};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::{
  annotation::{BoxOrder, SubmissionResult},
  frame::Frame,
  model::{ModelError, VisionModel, prompt, schema},
};

pub const DEFAULT_DESCRIBE_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_STRUCTURE_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct TaskConfig {
  /// 第一阶段（自由描述）使用的模型
  pub describe_model: String,
  /// 第二阶段（结构化输出）使用的模型
  pub structure_model: String,
  pub box_order: BoxOrder,
  /// 上传前最长边上限，0 表示不缩小
  pub max_side: u32,
}

impl Default for TaskConfig {
  fn default() -> Self {
    Self {
      describe_model: DEFAULT_DESCRIBE_MODEL.to_string(),
      structure_model: DEFAULT_STRUCTURE_MODEL.to_string(),
      box_order: BoxOrder::default(),
      max_side: 0,
    }
  }
}

/// 单张图像的两阶段查询
///
/// 不保存任何跨请求状态，模型句柄由调用方构造后传入。
pub struct SubmissionTask {
  model: Arc<dyn VisionModel>,
  config: TaskConfig,
}

impl SubmissionTask {
  pub fn new(model: Arc<dyn VisionModel>, config: TaskConfig) -> Self {
    Self { model, config }
  }

  pub fn config(&self) -> &TaskConfig {
    &self.config
  }

  /// 第一阶段，返回模型对错误的自由描述
  pub async fn describe(&self, frame: &Frame) -> Result<String, ModelError> {
    let request = prompt::describe_request(&self.config.describe_model, frame);
    let findings = self.model.generate(&request).await?;
    if findings.trim().is_empty() {
      return Err(ModelError::Unavailable("第一阶段返回空描述".to_string()));
    }
    Ok(findings)
  }

  /// 第二阶段，把描述结构化为标注列表并校验
  pub async fn structure(
    &self,
    frame: &Frame,
    findings: &str,
    symbols: &[String],
  ) -> Result<SubmissionResult, ModelError> {
    let request = prompt::structuring_request(
      &self.config.structure_model,
      frame,
      findings,
      symbols,
      self.config.box_order,
    );
    let text = self.model.generate(&request).await?;
    debug!("结构化响应: {}", text);
    schema::parse_submission(&text, self.config.box_order, symbols)
  }

  pub async fn run(&self, frame: &Frame, symbols: &[String]) -> Result<SubmissionResult, ModelError> {
    let now = Instant::now();
    let upload;
    let frame = if self.config.max_side > 0 {
      upload = frame
        .clone()
        .downscaled_for_upload(self.config.max_side)
        .map_err(|e| ModelError::Unavailable(format!("无法编码上传图像: {}", e)))?;
      &upload
    } else {
      frame
    };

    info!(
      "开始处理 {}x{} 图像, 模型 {}, 候选符号 {:?}",
      frame.width(),
      frame.height(),
      self.model.name(),
      symbols
    );

    let findings = self.describe(frame).await.inspect_err(|e| {
      warn!("第一阶段失败: {}", e);
    })?;
    info!("第一阶段完成，耗时: {:.2?}", now.elapsed());

    let result = self
      .structure(frame, &findings, symbols)
      .await
      .inspect_err(|e| {
        warn!("第二阶段失败: {}", e);
      })?;
    info!(
      "第二阶段完成，耗时: {:.2?}, {} 个标注, {} 处错误",
      now.elapsed(),
      result.annotations.len(),
      result.mistake_count()
    );

    Ok(result)
  }
}

#[derive(Debug, Clone)]
pub struct BatchItem {
  pub frame: Frame,
  pub symbols: Vec<String>,
}

/// 批量处理，每项独立，结果与输入顺序一致
pub struct BatchTask {
  task: Arc<SubmissionTask>,
  concurrency: usize,
}

impl BatchTask {
  pub fn new(task: Arc<SubmissionTask>) -> Self {
    Self {
      task,
      concurrency: DEFAULT_BATCH_CONCURRENCY,
    }
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  pub async fn run(&self, items: Vec<BatchItem>) -> Vec<Result<SubmissionResult, ModelError>> {
    let total = items.len();
    info!("批量处理 {} 张图像, 并发上限 {}", total, self.concurrency);

    let results: Vec<_> = stream::iter(items.into_iter().enumerate())
      .map(|(idx, item)| {
        let task = self.task.clone();
        async move {
          let result = task.run(&item.frame, &item.symbols).await;
          if let Err(e) = &result {
            warn!("第 {}/{} 张图像处理失败: {}", idx + 1, total, e);
          }
          result
        }
      })
      .buffered(self.concurrency)
      .collect()
      .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    info!("批量处理完成: 成功 {}, 失败 {}", total - failed, failed);
    results
  }
}
