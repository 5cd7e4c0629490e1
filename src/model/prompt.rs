// 该文件是 Presubmit 项目的一部分。
// src/model/prompt.rs - 两阶段提示词
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

use crate::{
  annotation::BoxOrder,
  frame::Frame,
  model::{GenerateRequest, schema},
};

pub const DESCRIBE_INSTRUCTION: &str = "Find mistakes in this person's work";

/// 第一阶段：自由文本描述
pub fn describe_request<'a>(model: &'a str, frame: &'a Frame) -> GenerateRequest<'a> {
  GenerateRequest::new(model)
    .text(DESCRIBE_INSTRUCTION)
    .image(frame)
}

/// 第二阶段的文字说明（放在图像之前）
pub fn structuring_instruction(findings: &str, symbols: &[String]) -> String {
  let mut prompt = String::new();
  prompt.push_str(findings.trim());
  prompt.push_str("\n\n");
  prompt.push_str(
    "For the annotations field, return one annotation for each distinguishable section \
     of math work in this image. Put the transcribed work of the section in the text field \
     and a bounding box for the section in the box_2d field. Describe any mistakes in that \
     section in the mistakes field; if there are no mistakes, use an empty string.\n",
  );

  let symbols: Vec<&str> = symbols
    .iter()
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .collect();
  if symbols.is_empty() {
    prompt.push_str("Leave the symbol field empty.\n");
  } else {
    prompt.push_str(&format!(
      "For the symbol field, identify which of the following symbols is in the top corner: {}. \
       Choose at most one of them; if none are there, leave the field empty.\n",
      symbols.join(", ")
    ));
  }
  prompt
}

/// 第二阶段的坐标格式说明（放在图像之后）
pub fn box_format_instruction(order: BoxOrder) -> String {
  format!(
    "Return every box_2d in the format {}, with each value normalized to the range 0-1000.",
    order.format_hint()
  )
}

/// 第二阶段：带 schema 约束的结构化请求
pub fn structuring_request<'a>(
  model: &'a str,
  frame: &'a Frame,
  findings: &str,
  symbols: &[String],
  order: BoxOrder,
) -> GenerateRequest<'a> {
  GenerateRequest::new(model)
    .text(structuring_instruction(findings, symbols))
    .image(frame)
    .text(box_format_instruction(order))
    .with_schema(schema::response_schema())
}
