// 该文件是 Presubmit 项目的一部分。
// src/annotation.rs - 标注结果定义
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

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coords::{InvalidBoxError, NormalizedBox};

/// 一个作答区域：转写文本、边界框与发现的错误（无错误时为空字符串）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
  pub text: String,
  pub box_2d: NormalizedBox, // [x_min, y_min, x_max, y_max]
  pub mistakes: String,
}

impl Annotation {
  pub fn has_mistake(&self) -> bool {
    !self.mistakes.trim().is_empty()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
  #[serde(default)]
  pub symbol: String,
  pub annotations: Vec<Annotation>,
}

impl SubmissionResult {
  pub fn is_empty(&self) -> bool {
    self.annotations.is_empty()
  }

  pub fn mistake_count(&self) -> usize {
    self.annotations.iter().filter(|a| a.has_mistake()).count()
  }
}

/// 要求模型输出 box_2d 时使用的分量顺序
///
/// 对外输出始终是 [x_min, y_min, x_max, y_max]；`YxYx` 只在模型边界上使用，
/// 解析时立即转换为规范顺序。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoxOrder {
  XyXy,
  #[default]
  YxYx,
}

impl BoxOrder {
  /// 写进提示词的格式说明
  pub fn format_hint(&self) -> &'static str {
    match self {
      BoxOrder::XyXy => "[xmin, ymin, xmax, ymax]",
      BoxOrder::YxYx => "[ymin, xmin, ymax, xmax]",
    }
  }

  pub fn to_canonical(&self, components: &[i64]) -> Result<NormalizedBox, InvalidBoxError> {
    match self {
      BoxOrder::XyXy => NormalizedBox::try_from_slice(components),
      BoxOrder::YxYx => match *components {
        [ymin, xmin, ymax, xmax] => NormalizedBox::new(xmin, ymin, xmax, ymax),
        _ => Err(InvalidBoxError::WrongArity(components.len())),
      },
    }
  }
}

impl FromStr for BoxOrder {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "xyxy" => Ok(BoxOrder::XyXy),
      "yxyx" => Ok(BoxOrder::YxYx),
      other => Err(format!("未知的边界框顺序: {} (可选 xyxy, yxyx)", other)),
    }
  }
}
