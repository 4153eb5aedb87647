// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{DetectResult, Detection};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 16;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 无字体时每字符平均宽度（粗略估计）
const LABEL_BASELINE: i32 = 4;
const BOX_THICKNESS: i32 = 3;
const BANNER_POSITION: (i32, i32) = (20, 40);

// 颜色
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const BLUE: Rgb<u8> = Rgb([50, 178, 255]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 在图像上绘制检测框、类别标签与推理耗时
pub struct Draw {
  font: Option<FontArc>,
  font_scale: PxScale,
  box_thickness: i32,
  box_color: Rgb<u8>,
  label_background: Rgb<u8>,
  label_color: Rgb<u8>,
  banner_color: Rgb<u8>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      box_thickness: BOX_THICKNESS,
      box_color: BLUE,
      label_background: BLACK,
      label_color: YELLOW,
      banner_color: RED,
    }
  }
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    info!("加载字体文件: {}", path.display());
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    Ok(self.with_font(font))
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    if !self.has_font() && !result.is_empty() {
      warn!("未加载字体, 跳过标签文字绘制");
    }

    for detection in result.iter() {
      if detection.bbox.is_empty() {
        continue;
      }
      self.draw_bbox(image, detection);
      let label = format!("{}: {:.2}", result.label(detection), detection.confidence);
      self.draw_label(image, &label, detection.bbox.left, detection.bbox.top);
    }

    if let Some(elapsed) = result.inference_time {
      let label = format!(
        "inference time:  {:.2} ms",
        elapsed.as_secs_f64() * 1000.0
      );
      self.draw_banner(image, &label);
    }
  }

  fn draw_bbox(&self, image: &mut RgbImage, detection: &Detection) {
    let bbox = detection.bbox;
    for t in 0..self.box_thickness {
      let width = bbox.width - 2 * t;
      let height = bbox.height - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(bbox.left + t, bbox.top + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, self.box_color);
    }
  }

  fn label_size(&self, label: &str) -> (i32, i32) {
    match &self.font {
      Some(font) => {
        let (w, h) = text_size(self.font_scale, font, label);
        (w as i32, h as i32)
      }
      None => (
        (label.chars().count() as f32 * LABEL_CHAR_WIDTH) as i32,
        LABEL_TEXT_HEIGHT,
      ),
    }
  }

  // 标签画在框的左上角，顶部至少留出一个标签高度，避免超出图像
  fn draw_label(&self, image: &mut RgbImage, label: &str, left: i32, top: i32) {
    let (width, height) = self.label_size(label);
    if width <= 0 || height <= 0 {
      return;
    }
    let top = top.max(height);

    let rect = Rect::at(left, top).of_size(width as u32, (height + LABEL_BASELINE) as u32);
    draw_filled_rect_mut(image, rect, self.label_background);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        self.label_color,
        left,
        top,
        self.font_scale,
        font,
        label,
      );
    }
  }

  fn draw_banner(&self, image: &mut RgbImage, label: &str) {
    let Some(font) = &self.font else {
      return;
    };
    let (_, height) = self.label_size(label);
    let (x, y) = BANNER_POSITION;
    draw_text_mut(
      image,
      self.banner_color,
      x,
      (y - height).max(0),
      self.font_scale,
      font,
      label,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{catalog::ClassCatalog, decoder::BoxRect};

  const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

  fn result(bbox: BoxRect) -> DetectResult {
    DetectResult::new(
      vec![Detection {
        class_id: 0,
        confidence: 0.9,
        bbox,
      }],
      ClassCatalog::new(["cat", "dog"]),
    )
  }

  #[test]
  fn draws_box_and_label_background() {
    let mut image = RgbImage::from_pixel(100, 100, WHITE);
    Draw::default().draw_detections_on_image(&mut image, &result(BoxRect::new(20, 40, 30, 30)));

    // 标签背景占据 y in [40, 60)，其下方是框的左边与底边
    assert_eq!(image.get_pixel(20, 65), &BLUE);
    assert_eq!(image.get_pixel(22, 65), &BLUE);
    assert_eq!(image.get_pixel(49, 69), &BLUE);
    assert_eq!(image.get_pixel(35, 69), &BLUE);
    // 框内部保持原样
    assert_eq!(image.get_pixel(35, 64), &WHITE);
    // 标签背景越过框的右边
    assert_eq!(image.get_pixel(60, 45), &BLACK);
    // 框外
    assert_eq!(image.get_pixel(10, 10), &WHITE);
  }

  #[test]
  fn label_is_pushed_down_near_top_edge() {
    let mut image = RgbImage::from_pixel(100, 100, WHITE);
    Draw::default().draw_detections_on_image(&mut image, &result(BoxRect::new(10, 0, 50, 50)));

    // 标签顶部被限制在 y = LABEL_TEXT_HEIGHT
    assert_eq!(image.get_pixel(70, LABEL_TEXT_HEIGHT as u32), &BLACK);
    assert_eq!(image.get_pixel(70, LABEL_TEXT_HEIGHT as u32 - 1), &WHITE);
  }

  #[test]
  fn font_is_optional() {
    assert!(!Draw::default().has_font());
    let missing = Draw::default().with_font_file("/definitely/not/here.ttf");
    assert!(matches!(missing, Err(DrawError::IoError(_))));
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let mut image = RgbImage::from_pixel(20, 20, WHITE);
    Draw::default().draw_detections_on_image(&mut image, &result(BoxRect::new(5, 5, 0, 10)));
    assert!(image.pixels().all(|p| *p == WHITE));
  }

  #[test]
  fn boxes_partly_outside_image_do_not_panic() {
    let mut image = RgbImage::from_pixel(20, 20, WHITE);
    Draw::default().draw_detections_on_image(&mut image, &result(BoxRect::new(-10, -10, 25, 25)));
    assert_eq!(image.get_pixel(14, 14), &BLUE);
    assert_eq!(image.get_pixel(14, 5), &BLUE);
    assert_eq!(image.get_pixel(10, 10), &WHITE);
    assert_eq!(image.get_pixel(17, 5), &WHITE);
    // 标签被推到 y = LABEL_TEXT_HEIGHT
    assert_eq!(image.get_pixel(17, 16), &BLACK);
  }
}
