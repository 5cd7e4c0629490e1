// 该文件是 Presubmit 项目的一部分。
// src/frame.rs - 提交图像帧定义
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

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("图像解码错误: {0}")]
  Decode(#[from] image::ImageError),
  #[error("无法识别的图像格式")]
  UnknownFormat,
  #[error("图像为空: {0}x{1}")]
  Empty(u32, u32),
}

/// 一次提交的图像
///
/// `image` 是解码后的原图，用于尺寸和可视化；`encoded` 是发送给模型的字节，
/// 可能经过缩小。两者在请求期间都不会被修改。
#[derive(Debug, Clone)]
pub struct Frame {
  image: RgbImage,
  encoded: Vec<u8>,
  mime_type: &'static str,
}

impl Frame {
  /// 从已编码的图像字节构造
  pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FrameError> {
    let format = image::guess_format(&bytes).map_err(|_| FrameError::UnknownFormat)?;
    let image = image::load_from_memory_with_format(&bytes, format)?.to_rgb8();
    if image.width() == 0 || image.height() == 0 {
      return Err(FrameError::Empty(image.width(), image.height()));
    }

    debug!(
      "解码图像: {}x{} {:?}, {} 字节",
      image.width(),
      image.height(),
      format,
      bytes.len()
    );

    Ok(Self {
      image,
      encoded: bytes,
      mime_type: format.to_mime_type(),
    })
  }

  /// 从内存中的 RGB 图像构造，编码为 PNG
  pub fn from_rgb_image(image: RgbImage) -> Result<Self, FrameError> {
    if image.width() == 0 || image.height() == 0 {
      return Err(FrameError::Empty(image.width(), image.height()));
    }
    let mut encoded = Vec::new();
    image.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?;
    Ok(Self {
      image,
      encoded,
      mime_type: ImageFormat::Png.to_mime_type(),
    })
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn encoded(&self) -> &[u8] {
    &self.encoded
  }

  pub fn mime_type(&self) -> &'static str {
    self.mime_type
  }

  pub fn to_base64(&self) -> String {
    STANDARD.encode(&self.encoded)
  }

  /// 缩小发送给模型的图像，使最长边不超过 `max_side`
  ///
  /// 原图保持不变；归一化坐标与分辨率无关，所以可视化仍按原图尺寸换算。
  pub fn downscaled_for_upload(mut self, max_side: u32) -> Result<Self, FrameError> {
    let (w, h) = self.image.dimensions();
    if max_side == 0 || w.max(h) <= max_side {
      return Ok(self);
    }

    let resized = image::imageops::resize(
      &self.image,
      (u64::from(w) * u64::from(max_side) / u64::from(w.max(h))).max(1) as u32,
      (u64::from(h) * u64::from(max_side) / u64::from(w.max(h))).max(1) as u32,
      FilterType::Triangle,
    );

    let mut encoded = Vec::new();
    resized.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)?;
    debug!(
      "上传图像缩小: {}x{} -> {}x{}, {} 字节",
      w,
      h,
      resized.width(),
      resized.height(),
      encoded.len()
    );

    self.encoded = encoded;
    self.mime_type = ImageFormat::Jpeg.to_mime_type();
    Ok(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn sample(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
  }

  #[test]
  fn test_from_rgb_image_round_trips_dimensions() {
    let frame = Frame::from_rgb_image(sample(40, 30)).unwrap();
    assert_eq!((frame.width(), frame.height()), (40, 30));
    assert_eq!(frame.mime_type(), "image/png");

    let again = Frame::from_bytes(frame.encoded().to_vec()).unwrap();
    assert_eq!((again.width(), again.height()), (40, 30));
  }

  #[test]
  fn test_from_bytes_rejects_garbage() {
    assert!(matches!(
      Frame::from_bytes(b"definitely not an image".to_vec()),
      Err(FrameError::UnknownFormat)
    ));
  }

  #[test]
  fn test_downscale_keeps_original_image() {
    let frame = Frame::from_rgb_image(sample(400, 200))
      .unwrap()
      .downscaled_for_upload(100)
      .unwrap();

    assert_eq!((frame.width(), frame.height()), (400, 200));
    assert_eq!(frame.mime_type(), "image/jpeg");
    let uploaded = image::load_from_memory(frame.encoded()).unwrap();
    assert_eq!((uploaded.width(), uploaded.height()), (100, 50));
  }

  #[test]
  fn test_downscale_is_noop_for_small_images() {
    let frame = Frame::from_rgb_image(sample(64, 64))
      .unwrap()
      .downscaled_for_upload(128)
      .unwrap();
    assert_eq!(frame.mime_type(), "image/png");
  }
}
