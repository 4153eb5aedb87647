// 该文件是 Shanan （山南西风） 项目的一部分。
// src/decoder/rows.rs - 检测输出行视图
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

use super::DecodeError;

/// 每行开头的固定字段数：cx, cy, w, h, objectness
pub const ROW_HEADER_LEN: usize = 5;

/// 单行检测输出 `[cx, cy, w, h, objectness, class_score_0 ..]`，坐标相对模型输入尺寸
#[derive(Debug, Clone, Copy)]
pub struct RawDetectionRow<'a> {
  values: &'a [f32],
}

impl<'a> RawDetectionRow<'a> {
  /// 检查行长度为 `5 + num_classes`
  pub fn new(values: &'a [f32], num_classes: usize) -> Result<Self, DecodeError> {
    let expected = ROW_HEADER_LEN + num_classes;
    if values.len() != expected {
      return Err(DecodeError::ShapeMismatch {
        expected,
        found: values.len(),
      });
    }
    Ok(Self { values })
  }

  pub fn cx(&self) -> f32 {
    self.values[0]
  }

  pub fn cy(&self) -> f32 {
    self.values[1]
  }

  pub fn w(&self) -> f32 {
    self.values[2]
  }

  pub fn h(&self) -> f32 {
    self.values[3]
  }

  pub fn objectness(&self) -> f32 {
    self.values[4]
  }

  pub fn class_scores(&self) -> &'a [f32] {
    &self.values[ROW_HEADER_LEN..]
  }

  /// 最高类别分数及其下标，分数相同取下标最小者；没有类别时返回 `None`
  pub fn best_class(&self) -> Option<(usize, f32)> {
    self
      .class_scores()
      .iter()
      .copied()
      .enumerate()
      .fold(None, |best, (idx, score)| match best {
        Some((_, best_score)) if score <= best_score => best,
        _ => Some((idx, score)),
      })
  }
}

/// 行主序平铺缓冲区上的定长行视图
#[derive(Debug, Clone, Copy)]
pub struct DetectionRows<'a> {
  data: &'a [f32],
  num_classes: usize,
}

impl<'a> DetectionRows<'a> {
  pub fn new(data: &'a [f32], num_classes: usize) -> Result<Self, DecodeError> {
    let stride = ROW_HEADER_LEN + num_classes;
    if data.len() % stride != 0 {
      return Err(DecodeError::PartialRow {
        stride,
        len: data.len(),
      });
    }
    Ok(Self { data, num_classes })
  }

  pub fn stride(&self) -> usize {
    ROW_HEADER_LEN + self.num_classes
  }

  pub fn len(&self) -> usize {
    self.data.len() / self.stride()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<RawDetectionRow<'a>> {
    let stride = self.stride();
    let start = index.checked_mul(stride)?;
    let values = self.data.get(start..start + stride)?;
    Some(RawDetectionRow { values })
  }

  pub fn iter(&self) -> impl Iterator<Item = RawDetectionRow<'a>> + use<'a> {
    self
      .data
      .chunks_exact(self.stride())
      .map(|values| RawDetectionRow { values })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn row_accessors() {
    let values = [1.0, 2.0, 3.0, 4.0, 0.5, 0.1, 0.7, 0.2];
    let row = RawDetectionRow::new(&values, 3).unwrap();
    assert_eq!((row.cx(), row.cy(), row.w(), row.h()), (1.0, 2.0, 3.0, 4.0));
    assert_eq!(row.objectness(), 0.5);
    assert_eq!(row.class_scores(), &[0.1, 0.7, 0.2]);
    assert_eq!(row.best_class(), Some((1, 0.7)));
  }

  #[test]
  fn best_class_ties_take_lowest_index() {
    let values = [0.0, 0.0, 0.0, 0.0, 0.9, 0.3, 0.8, 0.8, 0.1];
    let row = RawDetectionRow::new(&values, 4).unwrap();
    assert_eq!(row.best_class(), Some((1, 0.8)));
  }

  #[test]
  fn row_length_is_checked() {
    let err = RawDetectionRow::new(&[0.0; 6], 2).unwrap_err();
    assert_eq!(
      err,
      DecodeError::ShapeMismatch {
        expected: 7,
        found: 6
      }
    );
  }

  #[test]
  fn strided_view_splits_rows() {
    let data: Vec<f32> = (0..14).map(|v| v as f32).collect();
    let rows = DetectionRows::new(&data, 2).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.get(1).unwrap().cx(), 7.0);
    assert!(rows.get(2).is_none());
    let objectness: Vec<f32> = rows.iter().map(|r| r.objectness()).collect();
    assert_eq!(objectness, vec![4.0, 11.0]);
  }

  #[test]
  fn strided_view_rejects_partial_row() {
    let data = [0.0f32; 15];
    let err = DetectionRows::new(&data, 2).unwrap_err();
    assert_eq!(err, DecodeError::PartialRow { stride: 7, len: 15 });
    assert_eq!(err.to_string(), "输出缓冲区长度 15 不是行长度 7 的整数倍");
  }
}
