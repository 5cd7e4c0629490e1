// 该文件是 Presubmit 项目的一部分。
// src/input.rs - 图像输入
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

use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameError},
};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI scheme mismatch: expected '{expected}', found '{found}'")]
  SchemeMismatch {
    expected: &'static str,
    found: String,
  },
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("invalid base64 image data: {0}")]
  Base64(#[from] base64::DecodeError),
  #[error("invalid image: {0}")]
  Frame(#[from] FrameError),
}

/// 解码请求体中的 base64 图像
///
/// 兼容带 `data:image/...;base64,` 前缀的 data URL。
pub fn decode_base64_image(data: &str) -> Result<Frame, InputError> {
  let payload = match data.split_once(";base64,") {
    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
    _ => data,
  };
  let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
  let bytes = STANDARD.decode(cleaned)?;
  Ok(Frame::from_bytes(bytes)?)
}

/// 本地图像文件输入，`image:///path/to/work.jpeg`
pub struct ImageFileInput {
  frame: Option<Frame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    let bytes = std::fs::read(url.path())?;
    Ok(ImageFileInput {
      frame: Some(Frame::from_bytes(bytes)?),
    })
  }
}

impl ImageFileInput {
  pub fn into_frame(mut self) -> Option<Frame> {
    self.frame.take()
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

/// 逐个读取多张图像，单个失败不影响其余，结果与输入顺序一致
pub fn load_image_files(urls: &[Url]) -> Vec<Result<Frame, InputError>> {
  urls
    .iter()
    .map(|url| {
      ImageFileInput::from_url(url)
        .and_then(|input| {
          input.into_frame().ok_or_else(|| {
            InputError::IoError(std::io::Error::new(
              std::io::ErrorKind::UnexpectedEof,
              "输入中没有图像",
            ))
          })
        })
        .inspect_err(|e| error!("无法读取 {}: {}", url, e))
    })
    .collect()
}
