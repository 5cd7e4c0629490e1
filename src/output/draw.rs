// 该文件是 Presubmit 项目的一部分。
// src/output/draw.rs - 标注结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{annotation::Annotation, coords::PixelBox};

// 内置字体（DejaVu Sans），可用 `with_font_file` 替换
const DEFAULT_FONT: &[u8] = include_bytes!("../../assets/font.ttf");

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 24.0;
const BOX_THICKNESS: u32 = 2;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const TEXT_COLOR: [u8; 3] = [0, 0, 0]; // 黑色

// 文字放置规则：距顶部太近时放到框下方
const TOP_MARGIN: i64 = 10;
const TEXT_OFFSET_ABOVE: i64 = 10;
const MISTAKE_OFFSET_ABOVE: i64 = 30;
const TEXT_OFFSET_BELOW: i64 = 20;
const MISTAKE_OFFSET_BELOW: i64 = 40;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 一个标注的绘制计划，坐标为像素；文字坐标是基线左端
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayItem {
  pub rect: PixelBox,
  pub text: String,
  pub text_origin: (i64, i64),
  pub mistakes: String,
  pub mistakes_origin: (i64, i64),
}

/// 文字行相对边框的位置（基线 y）
pub fn label_baselines(ymin_px: u32) -> (i64, i64) {
  let ymin = i64::from(ymin_px);
  if ymin - TEXT_OFFSET_ABOVE > TOP_MARGIN {
    (ymin - TEXT_OFFSET_ABOVE, ymin - MISTAKE_OFFSET_ABOVE)
  } else {
    (ymin + TEXT_OFFSET_BELOW, ymin + MISTAKE_OFFSET_BELOW)
  }
}

pub struct Overlay {
  font: Option<FontArc>,
  font_size: f32,
  box_color: [u8; 3],
  text_color: [u8; 3],
  box_thickness: u32,
}

impl Default for Overlay {
  fn default() -> Self {
    let font = FontArc::try_from_slice(DEFAULT_FONT)
      .inspect_err(|e| warn!("无法加载内置字体: {}", e))
      .ok();

    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      box_color: BOX_COLOR,
      text_color: TEXT_COLOR,
      box_thickness: BOX_THICKNESS,
    }
  }
}

impl Overlay {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontArc::try_from_vec(data)?;
    debug!("加载字体: {}", path.as_ref().display());
    Ok(self.with_font(font))
  }

  pub fn font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 计算每个标注的绘制位置，不触碰像素
  pub fn layout(&self, width: u32, height: u32, annotations: &[Annotation]) -> Vec<OverlayItem> {
    annotations
      .iter()
      .filter_map(|annotation| {
        // 非空图像上 to_pixels 不会失败
        let rect = annotation.box_2d.to_pixels(width, height).ok()?;
        let (text_y, mistakes_y) = label_baselines(rect.ymin);
        let x = i64::from(rect.xmin);
        Some(OverlayItem {
          rect,
          text: annotation.text.clone(),
          text_origin: (x, text_y),
          mistakes: annotation.mistakes.clone(),
          mistakes_origin: (x, mistakes_y),
        })
      })
      .collect()
  }

  /// 在原图副本上绘制全部标注，原图不变
  pub fn render(&self, image: &RgbImage, annotations: &[Annotation]) -> RgbImage {
    let mut canvas = image.clone();
    let items = self.layout(image.width(), image.height(), annotations);

    if !self.has_font() && !items.is_empty() {
      warn!("未加载字体，仅绘制边框");
    }

    for item in &items {
      self.draw_rect(&mut canvas, &item.rect);
      self.draw_line(&mut canvas, item.text_origin, &item.text);
      // 没有错误时同样占一行（空行）
      self.draw_line(&mut canvas, item.mistakes_origin, &item.mistakes);
    }

    canvas
  }

  // 描边向内加粗，超出图像的像素直接跳过
  fn draw_rect(&self, image: &mut RgbImage, rect: &PixelBox) {
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    let color = Rgb(self.box_color);
    let mut put = |x: i64, y: i64| {
      if (0..w).contains(&x) && (0..h).contains(&y) {
        image.put_pixel(x as u32, y as u32, color);
      }
    };

    let (x_min, y_min) = (i64::from(rect.xmin), i64::from(rect.ymin));
    let (x_max, y_max) = (i64::from(rect.xmax), i64::from(rect.ymax));

    for t in 0..i64::from(self.box_thickness) {
      // 框太窄时不再向内加粗，退化框保持在原像素线上
      if t > 0 && (i64::from(rect.width()) < 2 * t || i64::from(rect.height()) < 2 * t) {
        break;
      }
      let (x0, y0) = (x_min + t, y_min + t);
      let (x1, y1) = (x_max - t, y_max - t);

      for x in x0..=x1 {
        put(x, y0);
        put(x, y1);
      }
      for y in y0..=y1 {
        put(x0, y);
        put(x1, y);
      }
    }
  }

  fn draw_line(&self, image: &mut RgbImage, origin: (i64, i64), text: &str) {
    let Some(font) = &self.font else {
      return;
    };
    if text.is_empty() {
      return;
    }

    // imageproc 以左上角定位，这里把基线换算为顶部
    let x = origin.0.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    let top = (origin.1 - self.font_size.round() as i64)
      .clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;

    draw_text_mut(
      image,
      Rgb(self.text_color),
      x,
      top,
      PxScale::from(self.font_size),
      font,
      text,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::coords::NormalizedBox;

  const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
  const GREEN: Rgb<u8> = Rgb(BOX_COLOR);

  fn has_ink(image: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> bool {
    ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
      .any(|(x, y)| image.get_pixel(x, y).0.iter().all(|c| *c < 128))
  }

  fn annotation(text: &str, b: [i64; 4], mistakes: &str) -> Annotation {
    Annotation {
      text: text.into(),
      box_2d: NormalizedBox::new(b[0], b[1], b[2], b[3]).unwrap(),
      mistakes: mistakes.into(),
    }
  }

  #[test]
  fn test_label_placement_threshold() {
    // 框离顶部足够远：文字在上方
    assert_eq!(label_baselines(100), (90, 70));
    // ymin - 10 == 10 仍算太近
    assert_eq!(label_baselines(20), (40, 60));
    assert_eq!(label_baselines(21), (11, -9));
    assert_eq!(label_baselines(5), (25, 45));
    assert_eq!(label_baselines(0), (20, 40));
  }

  #[test]
  fn test_layout_end_to_end_scenario() {
    let overlay = Overlay::default();
    let items = overlay.layout(1000, 800, &[annotation("y=mx+b", [100, 200, 300, 400], "")]);

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.rect.to_array(), [100, 160, 300, 320]);
    assert_eq!(item.text, "y=mx+b");
    assert_eq!(item.text_origin, (100, 150));
    // 空的错误说明仍然占一行
    assert_eq!(item.mistakes, "");
    assert_eq!(item.mistakes_origin, (100, 130));
  }

  #[test]
  fn test_layout_places_text_below_near_top() {
    let overlay = Overlay::default();
    // 1000 高的图像上 ymin_n = 5 -> ymin_px = 5
    let items = overlay.layout(1000, 1000, &[annotation("b=2", [0, 5, 100, 50], "x")]);
    assert_eq!(items[0].text_origin, (0, 25));
    assert_eq!(items[0].mistakes_origin, (0, 45));
  }

  #[test]
  fn test_render_draws_rectangle_without_touching_input() {
    let image = RgbImage::from_pixel(1000, 800, WHITE);
    let overlay = Overlay::default();
    let out = overlay.render(&image, &[annotation("y=mx+b", [100, 200, 300, 400], "")]);

    // 原图不变
    assert!(image.pixels().all(|p| *p == WHITE));

    for (x, y) in [(100, 160), (300, 320), (300, 160), (100, 320), (200, 160), (101, 161)] {
      assert_eq!(*out.get_pixel(x, y), GREEN, "({x}, {y})");
    }
    assert_eq!(*out.get_pixel(200, 240), WHITE);
    assert_eq!(*out.get_pixel(99, 160), WHITE);
    assert_eq!(*out.get_pixel(301, 320), WHITE);
  }

  #[test]
  fn test_render_clips_boxes_at_the_edge() {
    let image = RgbImage::from_pixel(50, 40, WHITE);
    let overlay = Overlay::default();
    // [0,0,1000,1000] 的右下角正好落在图像之外
    let out = overlay.render(&image, &[annotation("", [0, 0, 1000, 1000], "")]);
    assert_eq!(*out.get_pixel(0, 0), GREEN);
    assert_eq!(*out.get_pixel(49, 39), GREEN);
  }

  #[test]
  fn test_render_zero_width_box() {
    let image = RgbImage::from_pixel(100, 100, WHITE);
    let out = Overlay::default().render(&image, &[annotation("", [500, 100, 500, 900], "")]);
    assert_eq!(*out.get_pixel(50, 50), GREEN);
    assert_eq!(*out.get_pixel(49, 50), WHITE);
    assert_eq!(*out.get_pixel(51, 50), WHITE);
  }

  #[test]
  fn test_render_one_pixel_box_keeps_outer_pass() {
    let image = RgbImage::from_pixel(1000, 1000, WHITE);
    // 宽 1 像素、高 400 像素
    let out = Overlay::default().render(&image, &[annotation("", [500, 100, 501, 500], "")]);
    assert_eq!(*out.get_pixel(500, 300), GREEN);
    assert_eq!(*out.get_pixel(501, 300), GREEN);
    assert_eq!(*out.get_pixel(502, 300), WHITE);
    assert_eq!(*out.get_pixel(499, 300), WHITE);
  }

  #[test]
  fn test_draw_order_follows_annotations() {
    let image = RgbImage::from_pixel(100, 100, WHITE);
    let annotations = vec![
      annotation("first", [100, 100, 500, 500], ""),
      annotation("second", [300, 300, 900, 900], "wrong"),
    ];
    let items = Overlay::default().layout(100, 100, &annotations);
    let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(texts, ["first", "second"]);

    let boxes_only: Vec<Annotation> = annotations
      .iter()
      .map(|a| Annotation {
        text: String::new(),
        mistakes: String::new(),
        ..a.clone()
      })
      .collect();
    let out = Overlay::default().render(&image, &boxes_only);
    assert_eq!(*out.get_pixel(30, 30), GREEN);
    assert_eq!(*out.get_pixel(10, 10), GREEN);
  }

  #[test]
  fn test_default_overlay_draws_text_at_baseline() {
    let overlay = Overlay::default();
    assert!(overlay.has_font());

    let image = RgbImage::from_pixel(1000, 800, WHITE);
    let out = overlay.render(&image, &[annotation("y=mx+b", [100, 200, 300, 400], "")]);
    // 文字基线 y = 150，字号 24：文字位于 126..150 行
    assert!(has_ink(&out, 100..260, 126..156));
    // 空的错误行不留痕迹
    assert!(!has_ink(&out, 100..260, 100..126));

    let out = overlay.render(
      &image,
      &[annotation("y=mx+b", [100, 200, 300, 400], "slope is wrong")],
    );
    // 错误说明基线 y = 130，位于文字上方
    assert!(has_ink(&out, 100..300, 104..124));
  }

  #[test]
  fn test_font_size_moves_text_top() {
    let image = RgbImage::from_pixel(400, 400, WHITE);
    let overlay = Overlay::default().font_size(12.0);
    // ymin = 200，文字基线 190，字号 12 时顶部在 178
    let out = overlay.render(&image, &[annotation("HHH", [100, 500, 500, 900], "")]);
    assert!(has_ink(&out, 40..120, 178..190));
    assert!(!has_ink(&out, 40..120, 160..176));
  }

  #[test]
  fn test_missing_font_file() {
    assert!(matches!(
      Overlay::default().with_font_file("/nonexistent/font.ttf"),
      Err(DrawError::IoError(_))
    ));
  }
}
