// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, catalog::ClassCatalog, decoder::BoxRect, frame::Blob};

const UNKNOWN_LABEL: &str = "unknown";

/// 模型执行器：输入预处理后的 blob，输出一次前向推理的原始张量
pub trait ModelRunner {
  type Error;

  fn forward(&self, blob: &Blob) -> Result<OutputTensor, Self::Error>;
}

/// 单个检测结果，坐标为原图像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
  pub class_id: usize,
  pub confidence: f32,
  pub bbox: BoxRect,
}

/// 一帧的检测结果，按 NMS 选择顺序（置信度从高到低）排列
#[derive(Debug, Clone)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
  pub catalog: ClassCatalog,
  pub inference_time: Option<Duration>,
}

impl DetectResult {
  pub fn new(items: impl Into<Box<[Detection]>>, catalog: ClassCatalog) -> Self {
    Self {
      items: items.into(),
      catalog,
      inference_time: None,
    }
  }

  pub fn with_inference_time(mut self, elapsed: Duration) -> Self {
    self.inference_time = Some(elapsed);
    self
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Detection> {
    self.items.iter()
  }

  pub fn label(&self, detection: &Detection) -> &str {
    self
      .catalog
      .name(detection.class_id)
      .unwrap_or(UNKNOWN_LABEL)
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorShapeError {
  #[error("张量形状 {0:?} 的元素数量超出 usize 范围")]
  Overflow(Vec<usize>),
  #[error("张量形状 {shape:?} 需要 {expected} 个元素, 实际 {found} 个")]
  LengthMismatch {
    shape: Vec<usize>,
    expected: usize,
    found: usize,
  },
}

/// 形状对应的元素总数，溢出时返回 `None`
pub fn element_count(shape: &[usize]) -> Option<usize> {
  shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

/// 一次前向推理的输出张量（行主序）
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  shape: Box<[usize]>,
  data: Box<[f32]>,
}

impl OutputTensor {
  pub fn new(
    shape: impl Into<Box<[usize]>>,
    data: impl Into<Box<[f32]>>,
  ) -> Result<Self, TensorShapeError> {
    let shape = shape.into();
    let data = data.into();
    let Some(expected) = element_count(&shape) else {
      return Err(TensorShapeError::Overflow(shape.into_vec()));
    };
    if expected != data.len() {
      return Err(TensorShapeError::LengthMismatch {
        shape: shape.into_vec(),
        expected,
        found: data.len(),
      });
    }
    Ok(Self { shape, data })
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }
}

mod tensor_file;
pub use self::tensor_file::{TensorFileError, TensorFileRunner};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("张量文件模型错误: {0}")]
  TensorFileError(#[from] TensorFileError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum ModelWrapper {
  TensorFile(TensorFileRunner),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      TensorFileRunner::SCHEME => Ok(ModelWrapper::TensorFile(TensorFileRunner::from_url(url)?)),
      scheme => Err(ModelError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl ModelRunner for ModelWrapper {
  type Error = ModelError;

  fn forward(&self, blob: &Blob) -> Result<OutputTensor, Self::Error> {
    match self {
      ModelWrapper::TensorFile(runner) => runner.forward(blob).map_err(ModelError::from),
    }
  }
}
