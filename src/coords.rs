// 该文件是 Presubmit 项目的一部分。
// src/coords.rs - 归一化坐标到像素坐标的转换
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 模型使用的虚拟画布边长，坐标均落在 [0, NORMALIZED_EXTENT]
pub const NORMALIZED_EXTENT: i64 = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidBoxError {
  #[error("边界框需要 4 个分量, 实际为 {0}")]
  WrongArity(usize),
  #[error("边界框分量 {value} 超出范围 [0, 1000]")]
  OutOfRange { value: i64 },
  #[error("边界框 {axis} 轴反向: min={min}, max={max}")]
  Inverted { axis: char, min: i64, max: i64 },
  #[error("图像尺寸无效: {width}x{height}")]
  EmptyImage { width: u32, height: u32 },
}

/// 像素坐标下的边界框，[x_min, y_min, x_max, y_max]，两端均包含
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
  pub xmin: u32,
  pub ymin: u32,
  pub xmax: u32,
  pub ymax: u32,
}

impl PixelBox {
  pub fn width(&self) -> u32 {
    self.xmax - self.xmin
  }

  pub fn height(&self) -> u32 {
    self.ymax - self.ymin
  }

  pub fn to_array(&self) -> [u32; 4] {
    [self.xmin, self.ymin, self.xmax, self.ymax]
  }
}

/// 校验后的归一化边界框，分量顺序固定为 [x_min, y_min, x_max, y_max]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "[u16; 4]")]
pub struct NormalizedBox {
  xmin: u16,
  ymin: u16,
  xmax: u16,
  ymax: u16,
}

impl NormalizedBox {
  pub fn new(xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> Result<Self, InvalidBoxError> {
    for value in [xmin, ymin, xmax, ymax] {
      if !(0..=NORMALIZED_EXTENT).contains(&value) {
        return Err(InvalidBoxError::OutOfRange { value });
      }
    }
    if xmin > xmax {
      return Err(InvalidBoxError::Inverted {
        axis: 'x',
        min: xmin,
        max: xmax,
      });
    }
    if ymin > ymax {
      return Err(InvalidBoxError::Inverted {
        axis: 'y',
        min: ymin,
        max: ymax,
      });
    }

    // 范围已校验，u16 足以容纳
    Ok(Self {
      xmin: xmin as u16,
      ymin: ymin as u16,
      xmax: xmax as u16,
      ymax: ymax as u16,
    })
  }

  pub fn try_from_slice(components: &[i64]) -> Result<Self, InvalidBoxError> {
    match *components {
      [xmin, ymin, xmax, ymax] => Self::new(xmin, ymin, xmax, ymax),
      _ => Err(InvalidBoxError::WrongArity(components.len())),
    }
  }

  pub fn to_array(&self) -> [u16; 4] {
    [self.xmin, self.ymin, self.xmax, self.ymax]
  }

  /// 按图像尺寸缩放到像素坐标（向下取整），不做翻转和裁剪
  pub fn to_pixels(&self, width: u32, height: u32) -> Result<PixelBox, InvalidBoxError> {
    if width == 0 || height == 0 {
      return Err(InvalidBoxError::EmptyImage { width, height });
    }

    let scale = |value: u16, extent: u32| -> u32 {
      (u64::from(value) * u64::from(extent) / NORMALIZED_EXTENT as u64) as u32
    };

    Ok(PixelBox {
      xmin: scale(self.xmin, width),
      ymin: scale(self.ymin, height),
      xmax: scale(self.xmax, width),
      ymax: scale(self.ymax, height),
    })
  }
}

impl TryFrom<Vec<i64>> for NormalizedBox {
  type Error = InvalidBoxError;

  fn try_from(components: Vec<i64>) -> Result<Self, Self::Error> {
    Self::try_from_slice(&components)
  }
}

impl From<NormalizedBox> for [u16; 4] {
  fn from(value: NormalizedBox) -> Self {
    value.to_array()
  }
}

/// 校验并转换一个规范顺序的归一化边界框
pub fn normalize(components: &[i64], width: u32, height: u32) -> Result<PixelBox, InvalidBoxError> {
  NormalizedBox::try_from_slice(components)?.to_pixels(width, height)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_full_canvas_maps_to_image_extent() {
    for (w, h) in [(1, 1), (640, 480), (1000, 800), (4032, 3024)] {
      let px = normalize(&[0, 0, 1000, 1000], w, h).unwrap();
      assert_eq!(px.to_array(), [0, 0, w, h]);
    }
  }

  #[test]
  fn test_scaling_uses_floor_division() {
    let px = normalize(&[100, 200, 300, 400], 1000, 800).unwrap();
    assert_eq!(px.to_array(), [100, 160, 300, 320]);

    // 333 * 640 / 1000 = 213.12
    let px = normalize(&[333, 333, 999, 999], 640, 480).unwrap();
    assert_eq!(px.to_array(), [213, 159, 639, 479]);
  }

  #[test]
  fn test_ordering_is_preserved() {
    let sizes = [(1u32, 1u32), (3, 7), (640, 480), (1921, 1079)];
    let values = [0i64, 1, 2, 499, 500, 501, 998, 999, 1000];
    for &(w, h) in &sizes {
      for &a in &values {
        for &b in &values {
          if a > b {
            continue;
          }
          let px = normalize(&[a, a, b, b], w, h).unwrap();
          assert!(px.xmin <= px.xmax, "x {a}..{b} @ {w}x{h}");
          assert!(px.ymin <= px.ymax, "y {a}..{b} @ {w}x{h}");
        }
      }
    }
  }

  #[test]
  fn test_zero_width_box_is_allowed() {
    let px = normalize(&[250, 100, 250, 900], 800, 600).unwrap();
    assert_eq!(px.width(), 0);
    assert_eq!(px.xmin, 200);
  }

  #[test]
  fn test_malformed_boxes_are_rejected() {
    assert_eq!(
      normalize(&[1, 2, 3], 100, 100),
      Err(InvalidBoxError::WrongArity(3))
    );
    assert_eq!(
      normalize(&[1, 2, 3, 4, 5], 100, 100),
      Err(InvalidBoxError::WrongArity(5))
    );
    assert!(matches!(
      normalize(&[600, 0, 500, 10], 100, 100),
      Err(InvalidBoxError::Inverted { axis: 'x', .. })
    ));
    assert!(matches!(
      normalize(&[0, 600, 10, 500], 100, 100),
      Err(InvalidBoxError::Inverted { axis: 'y', .. })
    ));
    assert_eq!(
      normalize(&[0, 0, 1001, 10], 100, 100),
      Err(InvalidBoxError::OutOfRange { value: 1001 })
    );
    assert_eq!(
      normalize(&[-1, 0, 10, 10], 100, 100),
      Err(InvalidBoxError::OutOfRange { value: -1 })
    );
  }

  #[test]
  fn test_empty_image_is_rejected() {
    assert!(matches!(
      normalize(&[0, 0, 10, 10], 0, 100),
      Err(InvalidBoxError::EmptyImage { .. })
    ));
  }
}
