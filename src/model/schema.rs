// 该文件是 Presubmit 项目的一部分。
// src/model/schema.rs - 结构化响应的 schema 与校验
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

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
  annotation::{Annotation, BoxOrder, SubmissionResult},
  model::ModelError,
};

/// generateContent 的 responseSchema（OpenAPI 子集）
pub fn response_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "symbol": { "type": "STRING" },
      "annotations": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "text": { "type": "STRING" },
            "box_2d": { "type": "ARRAY", "items": { "type": "INTEGER" } },
            "mistakes": { "type": "STRING" }
          },
          "required": ["text", "box_2d", "mistakes"]
        }
      }
    },
    "required": ["annotations"]
  })
}

#[derive(Deserialize, Debug)]
struct WireSubmission {
  #[serde(default)]
  symbol: Option<String>,
  annotations: Vec<WireAnnotation>,
}

#[derive(Deserialize, Debug)]
struct WireAnnotation {
  text: String,
  box_2d: Vec<i64>,
  mistakes: String,
}

fn strip_code_fence(text: &str) -> &str {
  let trimmed = text.trim();
  trimmed
    .strip_prefix("```json")
    .or_else(|| trimmed.strip_prefix("```"))
    .and_then(|rest| rest.strip_suffix("```"))
    .map(str::trim)
    .unwrap_or(trimmed)
}

/// 只保留与候选列表匹配的符号（忽略大小写），统一为候选的写法
fn select_symbol(symbol: Option<String>, candidates: &[String]) -> String {
  let Some(symbol) = symbol.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) else {
    return String::new();
  };

  match candidates
    .iter()
    .find(|c| c.trim().eq_ignore_ascii_case(&symbol))
  {
    Some(candidate) => candidate.trim().to_string(),
    None => {
      debug!("丢弃不在候选列表中的符号: {}", symbol);
      String::new()
    }
  }
}

/// 校验第二阶段响应并转换为规范顺序
///
/// 不符合 schema 时返回 `SchemaViolation`；单个边界框无效时丢弃该标注并记录警告。
pub fn parse_submission(
  text: &str,
  order: BoxOrder,
  candidates: &[String],
) -> Result<SubmissionResult, ModelError> {
  let wire: WireSubmission = serde_json::from_str(strip_code_fence(text))
    .map_err(|e| ModelError::SchemaViolation(e.to_string()))?;

  let total = wire.annotations.len();
  let annotations: Vec<Annotation> = wire
    .annotations
    .into_iter()
    .enumerate()
    .filter_map(|(idx, item)| match order.to_canonical(&item.box_2d) {
      Ok(box_2d) => Some(Annotation {
        text: item.text,
        box_2d,
        mistakes: item.mistakes,
      }),
      Err(e) => {
        warn!("丢弃第 {} 个标注 {:?}: {}", idx, item.box_2d, e);
        None
      }
    })
    .collect();

  if annotations.len() != total {
    warn!("共丢弃 {} / {} 个标注", total - annotations.len(), total);
  }

  Ok(SubmissionResult {
    symbol: select_symbol(wire.symbol, candidates),
    annotations,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_valid_response() {
    let text = r#"{
      "symbol": "Star",
      "annotations": [
        { "text": "y = mx + b", "box_2d": [145, 305, 249, 329], "mistakes": "" },
        { "text": "m = (4-2)/(2-0)", "box_2d": [146, 350, 281, 374], "mistakes": "Not 2" }
      ]
    }"#;
    let result =
      parse_submission(text, BoxOrder::XyXy, &["star".into(), "square".into()]).unwrap();

    assert_eq!(result.symbol, "star");
    assert_eq!(result.annotations.len(), 2);
    assert_eq!(result.annotations[0].box_2d.to_array(), [145, 305, 249, 329]);
    assert_eq!(result.annotations[1].mistakes, "Not 2");
  }

  #[test]
  fn test_parse_converts_wire_order() {
    let text = r#"{"annotations": [{ "text": "b = 2", "box_2d": [449, 146, 472, 189], "mistakes": "" }]}"#;
    let result = parse_submission(text, BoxOrder::YxYx, &[]).unwrap();
    assert_eq!(result.annotations[0].box_2d.to_array(), [146, 449, 189, 472]);
    assert_eq!(result.symbol, "");
  }

  #[test]
  fn test_invalid_boxes_are_dropped_in_order() {
    let text = r#"{"annotations": [
      { "text": "a", "box_2d": [1, 2, 3], "mistakes": "" },
      { "text": "b", "box_2d": [10, 10, 20, 20], "mistakes": "" },
      { "text": "c", "box_2d": [900, 10, 20, 20], "mistakes": "" },
      { "text": "d", "box_2d": [30, 30, 40, 40], "mistakes": "x" }
    ]}"#;
    let result = parse_submission(text, BoxOrder::XyXy, &[]).unwrap();
    let texts: Vec<&str> = result.annotations.iter().map(|a| a.text.as_str()).collect();
    assert_eq!(texts, ["b", "d"]);
  }

  #[test]
  fn test_schema_violations() {
    for text in [
      "",
      "the slope is wrong",
      r#"{"symbol": ""}"#,
      r#"{"annotations": [{ "text": "a", "box_2d": [1, 2, 3, 4] }]}"#,
      r#"{"annotations": [{ "text": "a", "box_2d": "1,2,3,4", "mistakes": "" }]}"#,
      r#"[{ "text": "a", "box_2d": [1, 2, 3, 4], "mistakes": "" }]"#,
    ] {
      assert!(
        matches!(
          parse_submission(text, BoxOrder::XyXy, &[]),
          Err(ModelError::SchemaViolation(_))
        ),
        "accepted: {text:?}"
      );
    }
  }

  #[test]
  fn test_code_fence_is_tolerated() {
    let text = "```json\n{\"annotations\": []}\n```";
    assert!(parse_submission(text, BoxOrder::XyXy, &[]).unwrap().is_empty());
  }

  #[test]
  fn test_symbol_requires_candidates() {
    let text = r#"{"symbol": "star", "annotations": []}"#;
    assert_eq!(parse_submission(text, BoxOrder::XyXy, &[]).unwrap().symbol, "");
    assert_eq!(
      parse_submission(text, BoxOrder::XyXy, &["circle".into()])
        .unwrap()
        .symbol,
      ""
    );
  }
}
