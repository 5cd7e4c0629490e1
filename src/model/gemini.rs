// 该文件是 Presubmit 项目的一部分。
// src/model/gemini.rs - Gemini generateContent 客户端
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

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{GenerateRequest, ModelError, Part, VisionModel},
};

pub const GEMINI_DEFAULT_URL: &str = "gemini://generativelanguage.googleapis.com/v1beta";
const GEMINI_DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum GeminiError {
  #[error("模型地址错误: {0}")]
  EndpointError(String),
  #[error("缺少 API Key")]
  MissingApiKey,
  #[error("HTTP 客户端错误: {0}")]
  ClientError(#[from] reqwest::Error),
}

pub struct GeminiBuilder {
  base_url: String,
  api_key: Option<String>,
  timeout: Duration,
  client: Option<Client>,
}

impl FromUrlWithScheme for GeminiBuilder {
  const SCHEME: &'static str = "gemini";
}

impl FromUrl for GeminiBuilder {
  type Error = GeminiError;

  /// `gemini://host/path` 映射为 `https://host/path`，带 `?insecure` 时使用 http
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GeminiError::EndpointError(format!(
        "模型地址必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let host = url
      .host_str()
      .ok_or_else(|| GeminiError::EndpointError(format!("模型地址缺少主机名: {}", url)))?;
    let insecure = url.query_pairs().any(|(k, _)| k == "insecure");
    let mut base_url = format!("{}://{}", if insecure { "http" } else { "https" }, host);
    if let Some(port) = url.port() {
      base_url.push_str(&format!(":{}", port));
    }
    base_url.push_str(url.path().trim_end_matches('/'));

    Ok(GeminiBuilder {
      base_url,
      api_key: None,
      timeout: GEMINI_DEFAULT_TIMEOUT,
      client: None,
    })
  }
}

impl GeminiBuilder {
  pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
    self.api_key = Some(api_key.into());
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// 复用外部构造的 HTTP 客户端，此时 `timeout` 不再生效
  pub fn client(mut self, client: Client) -> Self {
    self.client = Some(client);
    self
  }

  pub fn build(self) -> Result<GeminiModel, GeminiError> {
    let api_key = self
      .api_key
      .filter(|k| !k.trim().is_empty())
      .ok_or(GeminiError::MissingApiKey)?;

    let client = match self.client {
      Some(client) => client,
      None => Client::builder().timeout(self.timeout).build()?,
    };

    info!("Gemini 端点: {}", self.base_url);
    Ok(GeminiModel {
      client,
      api_key,
      base_url: self.base_url,
    })
  }
}

pub struct GeminiModel {
  client: Client,
  api_key: String,
  base_url: String,
}

impl GeminiModel {
  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn endpoint(&self, model: &str) -> String {
    format!("{}/models/{}:generateContent", self.base_url, model)
  }
}

/// 构造 generateContent 请求体
pub fn build_body(request: &GenerateRequest<'_>) -> Value {
  let parts: Vec<Value> = request
    .parts
    .iter()
    .map(|part| match part {
      Part::Text(text) => json!({ "text": text }),
      Part::Image(frame) => json!({
        "inlineData": { "mimeType": frame.mime_type(), "data": frame.to_base64() }
      }),
    })
    .collect();

  let mut body = json!({
    "contents": [{ "role": "user", "parts": parts }]
  });

  if let Some(schema) = &request.response_schema {
    body["generationConfig"] = json!({
      "responseMimeType": "application/json",
      "responseSchema": schema,
    });
  }

  body
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  content: Option<Content>,
  finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Content {
  #[serde(default)]
  parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
  text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
  block_reason: Option<String>,
}

/// 取第一个候选的全部文本片段
///
/// 没有候选时视为模型不可用；候选存在但没有文本时返回空字符串，由调用方判断。
pub fn extract_text(response: &Value) -> Result<String, ModelError> {
  let response = GenerateResponse::deserialize(response)
    .map_err(|e| ModelError::Unavailable(format!("无法解析模型响应: {}", e)))?;

  let Some(candidate) = response.candidates.into_iter().next() else {
    let reason = response
      .prompt_feedback
      .and_then(|f| f.block_reason)
      .unwrap_or_else(|| "没有候选结果".to_string());
    return Err(ModelError::Unavailable(format!("模型未返回结果: {}", reason)));
  };

  if let Some(reason) = &candidate.finish_reason
    && reason != "STOP"
  {
    warn!("模型结束原因: {}", reason);
  }

  Ok(
    candidate
      .content
      .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
      .unwrap_or_default(),
  )
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
  let detail = serde_json::from_str::<Value>(body)
    .ok()
    .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
    .unwrap_or_else(|| body.chars().take(512).collect());
  format!("HTTP {}: {}", status, detail)
}

#[async_trait]
impl VisionModel for GeminiModel {
  fn name(&self) -> &str {
    "gemini"
  }

  async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, ModelError> {
    let start = Instant::now();
    let body = build_body(request);

    debug!(
      model = %request.model,
      parts = request.parts.len(),
      structured = request.response_schema.is_some(),
      "发送 generateContent 请求"
    );

    let response = self
      .client
      .post(self.endpoint(request.model))
      .header("x-goog-api-key", &self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| ModelError::Unavailable(format!("请求失败: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      warn!(model = %request.model, %status, "模型返回错误");
      return Err(ModelError::Unavailable(error_message(status, &text)));
    }

    let json: Value = response
      .json()
      .await
      .map_err(|e| ModelError::Unavailable(format!("读取响应失败: {}", e)))?;
    let text = extract_text(&json)?;

    debug!(
      model = %request.model,
      latency = ?start.elapsed(),
      chars = text.len(),
      "generateContent 完成"
    );
    Ok(text)
  }
}
