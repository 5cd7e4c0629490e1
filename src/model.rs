// 该文件是 Presubmit 项目的一部分。
// src/model.rs - 多模态模型接口
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

use async_trait::async_trait;
use thiserror::Error;

use crate::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
  /// 网络错误、配额错误、非 2xx 响应或空响应
  #[error("模型不可用: {0}")]
  Unavailable(String),
  /// 结构化响应不符合约定的格式
  #[error("模型响应不符合格式: {0}")]
  SchemaViolation(String),
}

/// 请求内容的一个片段，按顺序拼接
#[derive(Debug, Clone)]
pub enum Part<'a> {
  Text(String),
  Image(&'a Frame),
}

#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
  pub model: &'a str,
  pub parts: Vec<Part<'a>>,
  /// 设置后要求模型返回符合该 schema 的 JSON
  pub response_schema: Option<serde_json::Value>,
}

impl<'a> GenerateRequest<'a> {
  pub fn new(model: &'a str) -> Self {
    Self {
      model,
      parts: Vec::new(),
      response_schema: None,
    }
  }

  pub fn text(mut self, text: impl Into<String>) -> Self {
    self.parts.push(Part::Text(text.into()));
    self
  }

  pub fn image(mut self, frame: &'a Frame) -> Self {
    self.parts.push(Part::Image(frame));
    self
  }

  pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
    self.response_schema = Some(schema);
    self
  }
}

/// 图像 + 文本 → 文本 的外部模型
///
/// 实现方只负责一次调用，不做重试。
#[async_trait]
pub trait VisionModel: Send + Sync {
  fn name(&self) -> &str;

  async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, ModelError>;
}

pub mod gemini;
pub mod prompt;
pub mod schema;

pub use self::gemini::{GeminiBuilder, GeminiModel};
