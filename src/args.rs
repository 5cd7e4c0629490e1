// 该文件是 Presubmit 项目的一部分。
// src/args.rs - 服务参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::net::SocketAddr;

use clap::Parser;
use url::Url;

use presubmit::{
  annotation::BoxOrder,
  auth::GOOGLE_TOKENINFO_URL,
  model::gemini::GEMINI_DEFAULT_URL,
  task::{DEFAULT_BATCH_CONCURRENCY, DEFAULT_DESCRIBE_MODEL, DEFAULT_STRUCTURE_MODEL},
};

/// Presubmit 服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, env = "PRESUBMIT_BIND", default_value = "0.0.0.0:8080")]
  pub bind: SocketAddr,

  /// 模型端点，`gemini://host/path`
  #[arg(long, value_name = "MODEL", env = "PRESUBMIT_MODEL", default_value = GEMINI_DEFAULT_URL)]
  pub model: Url,

  /// Gemini API Key
  #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
  pub api_key: String,

  /// 第一阶段（描述错误）使用的模型
  #[arg(long, env = "PRESUBMIT_DESCRIBE_MODEL", default_value = DEFAULT_DESCRIBE_MODEL)]
  pub describe_model: String,

  /// 第二阶段（结构化输出）使用的模型
  #[arg(long, env = "PRESUBMIT_STRUCTURE_MODEL", default_value = DEFAULT_STRUCTURE_MODEL)]
  pub structure_model: String,

  /// 要求模型输出 box_2d 的分量顺序: xyxy 或 yxyx
  #[arg(long, env = "PRESUBMIT_BOX_ORDER", default_value = "yxyx")]
  pub box_order: BoxOrder,

  /// 上传前图像最长边上限，0 表示不缩小
  #[arg(long, env = "PRESUBMIT_MAX_SIDE", default_value_t = 0)]
  pub max_side: u32,

  /// 批量接口的并发上限
  #[arg(long, env = "PRESUBMIT_CONCURRENCY", default_value_t = DEFAULT_BATCH_CONCURRENCY)]
  pub concurrency: usize,

  /// 允许的令牌签发方，可重复；缺省为 Google
  #[arg(long = "issuer", value_name = "ISSUER")]
  pub issuers: Vec<String>,

  /// 要求的令牌受众（客户端 ID）
  #[arg(long, env = "PRESUBMIT_AUDIENCE")]
  pub audience: Option<String>,

  /// 令牌校验端点
  #[arg(long, env = "PRESUBMIT_TOKENINFO_URL", default_value = GOOGLE_TOKENINFO_URL)]
  pub tokeninfo_url: String,

  /// 请求体大小上限（MiB）
  #[arg(long, env = "PRESUBMIT_BODY_LIMIT_MB", default_value_t = 32)]
  pub body_limit_mb: usize,

  /// 外部调用超时（秒）
  #[arg(long, env = "PRESUBMIT_TIMEOUT", default_value_t = 120)]
  pub timeout: u64,
}
