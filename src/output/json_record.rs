// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/json_record.rs - JSON 检测记录输出
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

use std::{fs::File, io::BufWriter, path::PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, decoder::BoxRect, model::DetectResult, output::Render};

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct DetectionRecord<'a> {
  class_id: usize,
  label: &'a str,
  confidence: f32,
  bbox: BoxRect,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
  inference_time_ms: Option<f64>,
  detections: Vec<DetectionRecord<'a>>,
}

impl<'a> From<&'a DetectResult> for FrameRecord<'a> {
  fn from(result: &'a DetectResult) -> Self {
    FrameRecord {
      inference_time_ms: result.inference_time.map(|d| d.as_secs_f64() * 1000.0),
      detections: result
        .iter()
        .map(|det| DetectionRecord {
          class_id: det.class_id,
          label: result.label(det),
          confidence: det.confidence,
          bbox: det.bbox,
        })
        .collect(),
    }
  }
}

/// 将检测结果写成 JSON 文件：`json:///path/to/result.json`
pub struct JsonRecordOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordError::SchemeMismatch);
    }

    Ok(JsonRecordOutput::new(uri.path()))
  }
}

impl JsonRecordOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn record(&self, result: &DetectResult) -> Result<(), JsonRecordError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(&self.path)?);
    serde_json::to_writer_pretty(writer, &FrameRecord::from(result))?;
    info!("检测记录已写入: {}", self.path.display());
    Ok(())
  }
}

impl<F> Render<F> for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, _frame: &F, result: &DetectResult) -> Result<(), Self::Error> {
    self.record(result)
  }
}
