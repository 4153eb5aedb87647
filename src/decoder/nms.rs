// 该文件是 Shanan （山南西风） 项目的一部分。
// src/decoder/nms.rs - 非极大值抑制
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

use serde::Serialize;

/// 像素坐标下的整数边界框（左上角 + 宽高）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct BoxRect {
  pub left: i32,
  pub top: i32,
  pub width: i32,
  pub height: i32,
}

impl BoxRect {
  pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
    Self {
      left,
      top,
      width,
      height,
    }
  }

  pub fn right(&self) -> i64 {
    self.left as i64 + self.width as i64
  }

  pub fn bottom(&self) -> i64 {
    self.top as i64 + self.height as i64
  }

  /// 宽或高不为正的框视为空
  pub fn is_empty(&self) -> bool {
    self.width <= 0 || self.height <= 0
  }

  pub fn area(&self) -> i64 {
    if self.is_empty() {
      0
    } else {
      self.width as i64 * self.height as i64
    }
  }

  /// 两个框的交集，不相交时返回 `None`
  pub fn intersection(&self, other: &BoxRect) -> Option<BoxRect> {
    if self.is_empty() || other.is_empty() {
      return None;
    }

    let x1 = self.left.max(other.left);
    let y1 = self.top.max(other.top);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());

    if x2 <= x1 as i64 || y2 <= y1 as i64 {
      return None;
    }

    Some(BoxRect::new(
      x1,
      y1,
      (x2 - x1 as i64) as i32,
      (y2 - y1 as i64) as i32,
    ))
  }

  /// 交并比。两个空框视为完全重合（1.0）。
  pub fn iou(&self, other: &BoxRect) -> f32 {
    let area_a = self.area();
    let area_b = other.area();
    if area_a + area_b <= 0 {
      return 1.0;
    }

    let intersection = self.intersection(other).map_or(0, |r| r.area());
    let union = area_a + area_b - intersection;

    (intersection as f64 / union as f64) as f32
  }
}

/// 贪心非极大值抑制，返回保留下来的下标，按选择顺序（分数从高到低）排列。
///
/// 只有 `score > score_threshold` 的候选参与；分数相同时保持原始顺序。
/// 候选与任意已保留框的 IoU 超过 `iou_threshold` 即被抑制，不区分类别。
pub fn nms_boxes(
  boxes: &[BoxRect],
  scores: &[f32],
  score_threshold: f32,
  iou_threshold: f32,
) -> Vec<usize> {
  debug_assert_eq!(boxes.len(), scores.len());

  let mut order: Vec<usize> = (0..boxes.len().min(scores.len()))
    .filter(|&i| scores[i] > score_threshold)
    .collect();
  // sort_by 是稳定排序
  order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  let mut keep: Vec<usize> = Vec::with_capacity(order.len());
  for idx in order {
    let suppressed = keep
      .iter()
      .any(|&kept| boxes[idx].iou(&boxes[kept]) > iou_threshold);
    if !suppressed {
      keep.push(idx);
    }
  }

  keep
}
