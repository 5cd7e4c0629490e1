// 该文件是 Presubmit 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU16, Ordering},
};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  annotation::SubmissionResult,
  frame::Frame,
  output::{Render, draw::Overlay},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 绘制标注后保存，或保存原图并附带 JSON 记录
pub enum RecordMode {
  Draw(Box<Overlay>),
  Record,
}

impl RecordMode {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    result: &SubmissionResult,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      RecordMode::Draw(overlay) => {
        overlay.render(frame.image(), &result.annotations).save(path)?;
      }
      RecordMode::Record => {
        frame.image().save(path)?;
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(path.with_extension("json"), json)?;
      }
    };

    Ok(())
  }
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  mode: RecordMode,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  /// `folder:///dir`，`?record` 保存原图和 JSON，`?always` 连空结果也保存
  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mode = if uri.query_pairs().any(|(k, _)| k == "record") {
      RecordMode::Record
    } else {
      RecordMode::Draw(Box::default())
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      mode,
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  /// 绘制模式下替换可视化配置（例如加载字体）
  pub fn with_overlay(mut self, overlay: Overlay) -> Self {
    if let RecordMode::Draw(current) = &mut self.mode {
      **current = overlay;
    }
    self
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<Frame, SubmissionResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &SubmissionResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("结果为空，跳过记录");
      return Ok(());
    }
    let path = self.frame_path()?;
    self.mode.save_result(&path, frame, result)?;
    debug!("记录到 {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{annotation::Annotation, coords::NormalizedBox};
  use image::{Rgb, RgbImage};

  fn files_with_extension(root: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == ext) {
          found.push(path);
        }
      }
    }
    found
  }

  fn frame() -> Frame {
    Frame::from_rgb_image(RgbImage::from_pixel(30, 30, Rgb([255, 255, 255]))).unwrap()
  }

  fn result() -> SubmissionResult {
    SubmissionResult {
      symbol: "star".into(),
      annotations: vec![Annotation {
        text: "m = 2".into(),
        box_2d: NormalizedBox::new(0, 0, 500, 500).unwrap(),
        mistakes: "m = 1".into(),
      }],
    }
  }

  #[test]
  fn test_record_mode_writes_image_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?record", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    output.render_result(&frame(), &result()).unwrap();

    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);
    let json = files_with_extension(dir.path(), "json");
    assert_eq!(json.len(), 1);
    let saved: SubmissionResult =
      serde_json::from_str(&std::fs::read_to_string(&json[0]).unwrap()).unwrap();
    assert_eq!(saved, result());
  }

  #[test]
  fn test_empty_results_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output
      .render_result(&frame(), &SubmissionResult::default())
      .unwrap();
    assert!(files_with_extension(dir.path(), "png").is_empty());

    let url = url::Url::parse(&format!("folder://{}?always", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output
      .render_result(&frame(), &SubmissionResult::default())
      .unwrap();
    output.render_result(&frame(), &result()).unwrap();
    assert_eq!(files_with_extension(dir.path(), "png").len(), 2);
  }
}
