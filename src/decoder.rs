// 该文件是 Shanan （山南西风） 项目的一部分。
// src/decoder.rs - 检测输出解码
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

use thiserror::Error;
use tracing::debug;

use crate::{
  catalog::ClassCatalog,
  model::{DetectResult, Detection, OutputTensor},
};

mod nms;
mod rows;

pub use self::nms::{BoxRect, nms_boxes};
pub use self::rows::{DetectionRows, ROW_HEADER_LEN, RawDetectionRow};

pub const DEFAULT_INPUT_WIDTH: f32 = 640.0;
pub const DEFAULT_INPUT_HEIGHT: f32 = 640.0;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.45;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NMS_IOU_THRESHOLD: f32 = 0.45;
/// 模型输入边长上限
pub const MAX_INPUT_SIZE: f32 = 8192.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
  #[error("配置无效: {0}")]
  InvalidConfig(String),
  #[error("输出形状不匹配: 期望每行 {expected} 个值, 实际 {found} 个")]
  ShapeMismatch { expected: usize, found: usize },
  #[error("输出缓冲区长度 {len} 不是行长度 {stride} 的整数倍")]
  PartialRow { stride: usize, len: usize },
}

/// 原始图像（缩放前）的像素尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
  pub width: u32,
  pub height: u32,
}

impl FrameSize {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

/// 解码参数
///
/// - `input_width`/`input_height`：检测器运行时的固定输入尺寸
/// - `confidence_threshold`：objectness 下限，低于该值的行直接丢弃
/// - `score_threshold`：最高类别分数必须严格大于该值，同时作为 NMS 的分数下限
/// - `nms_iou_threshold`：IoU 超过该值的框被抑制
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeConfig {
  pub input_width: f32,
  pub input_height: f32,
  pub confidence_threshold: f32,
  pub score_threshold: f32,
  pub nms_iou_threshold: f32,
}

impl Default for DecodeConfig {
  fn default() -> Self {
    Self {
      input_width: DEFAULT_INPUT_WIDTH,
      input_height: DEFAULT_INPUT_HEIGHT,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      nms_iou_threshold: DEFAULT_NMS_IOU_THRESHOLD,
    }
  }
}

impl DecodeConfig {
  pub fn with_input_size(mut self, width: f32, height: f32) -> Self {
    self.input_width = width;
    self.input_height = height;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_score_threshold(mut self, threshold: f32) -> Self {
    self.score_threshold = threshold;
    self
  }

  pub fn with_nms_iou_threshold(mut self, threshold: f32) -> Self {
    self.nms_iou_threshold = threshold;
    self
  }

  pub fn validate(&self) -> Result<(), DecodeError> {
    for (name, value) in [
      ("confidence_threshold", self.confidence_threshold),
      ("score_threshold", self.score_threshold),
      ("nms_iou_threshold", self.nms_iou_threshold),
    ] {
      if !(value > 0.0 && value < 1.0) {
        return Err(DecodeError::InvalidConfig(format!(
          "{} 必须在 (0, 1) 区间内, 实际为 {}",
          name, value
        )));
      }
    }

    for (name, value) in [
      ("input_width", self.input_width),
      ("input_height", self.input_height),
    ] {
      // blob 按同一尺寸构造，必须是整数像素
      if !((1.0..=MAX_INPUT_SIZE).contains(&value) && value.fract() == 0.0) {
        return Err(DecodeError::InvalidConfig(format!(
          "{} 必须为 1 到 {} 之间的整数, 实际为 {}",
          name, MAX_INPUT_SIZE, value
        )));
      }
    }

    Ok(())
  }
}

/// 检测输出解码器
///
/// 对每一行依次做 objectness 过滤、最高类别选择、类别分数过滤与坐标反归一化，
/// 再对所有候选做贪心 NMS。解码器本身不保存任何跨调用状态，
/// 多帧可以各自调用 `decode_*` 并行处理。
///
/// 注意：输出的置信度是 objectness，类别分数只用于过滤，
/// 没有使用 `objectness * class_score` 的组合分数。
#[derive(Debug, Clone)]
pub struct DetectionDecoder {
  catalog: ClassCatalog,
  config: DecodeConfig,
}

struct Candidates {
  class_ids: Vec<usize>,
  confidences: Vec<f32>,
  boxes: Vec<BoxRect>,
}

impl DetectionDecoder {
  pub fn new(catalog: ClassCatalog, config: DecodeConfig) -> Result<Self, DecodeError> {
    config.validate()?;
    if catalog.is_empty() {
      return Err(DecodeError::InvalidConfig("类别表为空".to_string()));
    }
    Ok(Self { catalog, config })
  }

  pub fn config(&self) -> &DecodeConfig {
    &self.config
  }

  pub fn catalog(&self) -> &ClassCatalog {
    &self.catalog
  }

  pub fn num_classes(&self) -> usize {
    self.catalog.len()
  }

  /// 每行期望的长度 `5 + C`
  pub fn row_len(&self) -> usize {
    ROW_HEADER_LEN + self.num_classes()
  }

  /// 解码逐行给出的输出，任一行长度不是 `5 + C` 即失败
  pub fn decode_rows<R: AsRef<[f32]>>(
    &self,
    rows: &[R],
    frame: FrameSize,
  ) -> Result<DetectResult, DecodeError> {
    let num_classes = self.num_classes();
    let rows = rows
      .iter()
      .map(|row| RawDetectionRow::new(row.as_ref(), num_classes))
      .collect::<Result<Vec<_>, _>>()?;
    self.decode(rows, frame)
  }

  /// 解码行主序平铺的输出缓冲区
  pub fn decode_buffer(&self, data: &[f32], frame: FrameSize) -> Result<DetectResult, DecodeError> {
    let rows = DetectionRows::new(data, self.num_classes())?;
    self.decode(rows.iter(), frame)
  }

  /// 解码一次前向推理的输出张量，张量最后一维必须为 `5 + C`
  pub fn decode_output(
    &self,
    output: &OutputTensor,
    frame: FrameSize,
  ) -> Result<DetectResult, DecodeError> {
    let expected = self.row_len();
    let found = output.shape().last().copied().unwrap_or(0);
    if found != expected {
      return Err(DecodeError::ShapeMismatch { expected, found });
    }
    self.decode_buffer(output.data(), frame)
  }

  fn decode<'a>(
    &self,
    rows: impl IntoIterator<Item = RawDetectionRow<'a>>,
    frame: FrameSize,
  ) -> Result<DetectResult, DecodeError> {
    if frame.width == 0 || frame.height == 0 {
      return Err(DecodeError::InvalidConfig(format!(
        "图像尺寸必须为正数, 实际为 {}x{}",
        frame.width, frame.height
      )));
    }

    let candidates = self.collect_candidates(rows, frame);
    debug!("候选框数量: {}", candidates.boxes.len());

    let indices = nms_boxes(
      &candidates.boxes,
      &candidates.confidences,
      self.config.score_threshold,
      self.config.nms_iou_threshold,
    );
    debug!("NMS 后保留 {} 个检测框", indices.len());

    let items = indices
      .into_iter()
      .map(|idx| Detection {
        class_id: candidates.class_ids[idx],
        confidence: candidates.confidences[idx],
        bbox: candidates.boxes[idx],
      })
      .collect::<Vec<_>>();

    Ok(DetectResult::new(items, self.catalog.clone()))
  }

  fn collect_candidates<'a>(
    &self,
    rows: impl IntoIterator<Item = RawDetectionRow<'a>>,
    frame: FrameSize,
  ) -> Candidates {
    let x_factor = frame.width as f32 / self.config.input_width;
    let y_factor = frame.height as f32 / self.config.input_height;

    let mut candidates = Candidates {
      class_ids: Vec::new(),
      confidences: Vec::new(),
      boxes: Vec::new(),
    };

    for row in rows {
      let confidence = row.objectness();
      if !(confidence >= self.config.confidence_threshold) {
        continue;
      }

      let Some((class_id, class_score)) = row.best_class() else {
        continue;
      };
      if !(class_score > self.config.score_threshold) {
        continue;
      }

      let (cx, cy, w, h) = (row.cx(), row.cy(), row.w(), row.h());
      // 左上角以 f64 计算，宽高以 f32 计算，`as` 向零截断
      let bbox = BoxRect::new(
        ((cx as f64 - 0.5 * w as f64) * x_factor as f64) as i32,
        ((cy as f64 - 0.5 * h as f64) * y_factor as f64) as i32,
        (w * x_factor) as i32,
        (h * y_factor) as i32,
      );

      candidates.class_ids.push(class_id);
      candidates.confidences.push(confidence);
      candidates.boxes.push(bbox);
    }

    candidates
  }
}
