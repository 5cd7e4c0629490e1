// 该文件是 Presubmit 项目的一部分。
// src/auth.rs - Bearer 令牌校验
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

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, warn};

pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
  #[error("missing Authorization header")]
  MissingToken,
  #[error("malformed Authorization header")]
  MalformedHeader,
  #[error("invalid token: {0}")]
  InvalidToken(String),
  #[error("token expired")]
  Expired,
  #[error("token audience not accepted")]
  WrongAudience,
  #[error("token issuer not accepted: {0}")]
  WrongIssuer(String),
}

/// 身份提供方返回的令牌声明
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
  pub iss: String,
  pub sub: String,
  #[serde(default)]
  pub aud: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  /// 过期时间（Unix 秒）；tokeninfo 以字符串返回
  #[serde(default, deserialize_with = "seconds_from_string_or_number")]
  pub exp: Option<i64>,
}

fn seconds_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Number(i64),
    Text(String),
  }

  match Option::<Raw>::deserialize(deserializer)? {
    None => Ok(None),
    Some(Raw::Number(n)) => Ok(Some(n)),
    Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
  }
}

/// 已通过校验的调用者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub subject: String,
  pub email: Option<String>,
  pub issuer: String,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
  async fn verify(&self, token: &str) -> Result<TokenClaims, AuthenticationError>;
}

/// 通过 Google tokeninfo 端点校验 ID token
pub struct GoogleTokenInfo {
  client: Client,
  endpoint: String,
}

impl GoogleTokenInfo {
  pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
    Ok(Self {
      client: Client::builder().timeout(timeout).build()?,
      endpoint: endpoint.into(),
    })
  }
}

#[async_trait]
impl TokenVerifier for GoogleTokenInfo {
  async fn verify(&self, token: &str) -> Result<TokenClaims, AuthenticationError> {
    let response = self
      .client
      .get(&self.endpoint)
      .query(&[("id_token", token)])
      .send()
      .await
      .map_err(|e| AuthenticationError::InvalidToken(format!("identity provider unreachable: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
      debug!("tokeninfo 拒绝令牌: {}", status);
      return Err(AuthenticationError::InvalidToken(format!(
        "rejected by identity provider ({})",
        status
      )));
    }

    response
      .json::<TokenClaims>()
      .await
      .map_err(|e| AuthenticationError::InvalidToken(format!("unexpected tokeninfo response: {}", e)))
  }
}

/// 取出 `Authorization: Bearer <token>` 中的令牌
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthenticationError> {
  let value = headers
    .get(AUTHORIZATION)
    .ok_or(AuthenticationError::MissingToken)?
    .to_str()
    .map_err(|_| AuthenticationError::MalformedHeader)?;

  let (scheme, token) = value
    .split_once(' ')
    .ok_or(AuthenticationError::MalformedHeader)?;
  let token = token.trim();
  if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
    return Err(AuthenticationError::MalformedHeader);
  }
  Ok(token)
}

/// 每个处理函数开头显式调用的身份检查
#[derive(Clone)]
pub struct IssuerGuard {
  verifier: Arc<dyn TokenVerifier>,
  allowed_issuers: Vec<String>,
  audience: Option<String>,
}

impl IssuerGuard {
  pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
    Self {
      verifier,
      allowed_issuers: GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
      audience: None,
    }
  }

  pub fn allowed_issuers(mut self, issuers: Vec<String>) -> Self {
    if !issuers.is_empty() {
      self.allowed_issuers = issuers;
    }
    self
  }

  pub fn audience(mut self, audience: Option<String>) -> Self {
    self.audience = audience;
    self
  }

  pub fn check_claims(&self, claims: TokenClaims) -> Result<Identity, AuthenticationError> {
    if let Some(exp) = claims.exp
      && exp <= chrono::Utc::now().timestamp()
    {
      return Err(AuthenticationError::Expired);
    }

    if let Some(expected) = &self.audience
      && claims.aud.as_deref() != Some(expected.as_str())
    {
      return Err(AuthenticationError::WrongAudience);
    }

    if !self.allowed_issuers.iter().any(|i| *i == claims.iss) {
      return Err(AuthenticationError::WrongIssuer(claims.iss));
    }

    Ok(Identity {
      subject: claims.sub,
      email: claims.email,
      issuer: claims.iss,
    })
  }

  pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthenticationError> {
    let token = bearer_token(headers).inspect_err(|e| warn!("拒绝请求: {}", e))?;
    let claims = self
      .verifier
      .verify(token)
      .await
      .inspect_err(|e| warn!("拒绝请求: {}", e))?;
    let identity = self
      .check_claims(claims)
      .inspect_err(|e| warn!("拒绝请求: {}", e))?;
    debug!("已认证: {} ({})", identity.subject, identity.issuer);
    Ok(identity)
  }
}
