// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/tensor_file.rs - 张量文件回放模型
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Blob,
  model::{ModelRunner, OutputTensor, TensorShapeError, element_count},
};

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug)]
pub enum TensorFileError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch {
    expected: &'static str,
    found: String,
  },
  #[error("缺少 shape 参数, 例如 ?shape=1,25200,85")]
  MissingShape,
  #[error("shape 参数无效: {0}")]
  InvalidShape(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("文件大小 {0} 字节不是 f32 大小的整数倍")]
  TruncatedData(usize),
  #[error("张量形状错误: {0}")]
  ShapeError(#[from] TensorShapeError),
}

/// 回放预先导出的检测器输出。
///
/// 文件内容为小端 `f32` 原始数据，形状由 URL 的 `shape` 参数给出：
/// `tensor:///path/to/output.bin?shape=1,25200,85`。
/// 每次 `forward` 都重新读取文件，输入的 blob 只用于日志。
#[derive(Debug, Clone)]
pub struct TensorFileRunner {
  path: PathBuf,
  shape: Vec<usize>,
}

impl FromUrlWithScheme for TensorFileRunner {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileRunner {
  type Error = TensorFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TensorFileError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    let shape = url
      .query_pairs()
      .find(|(k, _)| k == "shape")
      .map(|(_, v)| parse_shape(&v))
      .ok_or(TensorFileError::MissingShape)??;

    Ok(TensorFileRunner {
      path: PathBuf::from(url.path()),
      shape,
    })
  }
}

fn parse_shape(text: &str) -> Result<Vec<usize>, TensorFileError> {
  let shape = text
    .split(',')
    .map(|dim| dim.trim().parse::<usize>())
    .collect::<Result<Vec<_>, _>>()
    .map_err(|e| TensorFileError::InvalidShape(format!("{}: {}", text, e)))?;

  if shape.is_empty() || shape.contains(&0) {
    return Err(TensorFileError::InvalidShape(text.to_string()));
  }
  if element_count(&shape).is_none() {
    return Err(TensorFileError::InvalidShape(format!("{}: 元素数量溢出", text)));
  }

  Ok(shape)
}

impl TensorFileRunner {
  pub fn new(path: impl Into<PathBuf>, shape: Vec<usize>) -> Self {
    Self {
      path: path.into(),
      shape,
    }
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  fn load(&self) -> Result<OutputTensor, TensorFileError> {
    info!("读取张量文件: {}", self.path.display());
    let bytes = std::fs::read(&self.path)?;
    if bytes.len() % F32_BYTES != 0 {
      return Err(TensorFileError::TruncatedData(bytes.len()));
    }

    let data = bytes
      .chunks_exact(F32_BYTES)
      .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
      .collect::<Vec<_>>();
    debug!("张量元素数量: {}, 形状: {:?}", data.len(), self.shape);

    Ok(OutputTensor::new(self.shape.clone(), data)?)
  }
}

impl ModelRunner for TensorFileRunner {
  type Error = TensorFileError;

  fn forward(&self, blob: &Blob) -> Result<OutputTensor, Self::Error> {
    debug!("输入 blob 尺寸: {}x{}", blob.width(), blob.height());
    self.load()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("shanan-{}-{}", std::process::id(), name))
  }

  #[test]
  fn from_url_parses_path_and_shape() {
    let url = Url::parse("tensor:///tmp/out.bin?shape=1,25200,85").unwrap();
    let runner = TensorFileRunner::from_url(&url).unwrap();
    assert_eq!(runner.path, PathBuf::from("/tmp/out.bin"));
    assert_eq!(runner.shape(), &[1, 25200, 85]);
  }

  #[test]
  fn from_url_requires_shape() {
    let url = Url::parse("tensor:///tmp/out.bin").unwrap();
    assert!(matches!(
      TensorFileRunner::from_url(&url),
      Err(TensorFileError::MissingShape)
    ));

    let url = Url::parse("tensor:///tmp/out.bin?shape=1,x,85").unwrap();
    assert!(matches!(
      TensorFileRunner::from_url(&url),
      Err(TensorFileError::InvalidShape(_))
    ));
  }

  #[test]
  fn from_url_rejects_overflowing_shape() {
    let url = Url::parse("tensor:///x.bin?shape=8589934592,8589934592,6").unwrap();
    assert!(matches!(
      TensorFileRunner::from_url(&url),
      Err(TensorFileError::InvalidShape(_))
    ));
  }

  #[test]
  fn forward_with_overflowing_shape_is_an_error() {
    let path = temp_path("overflow.bin");
    std::fs::write(&path, [0u8; 24]).unwrap();

    let runner = TensorFileRunner::new(&path, vec![1 << 33, 1 << 33, 6]);
    let err = runner.forward(&Blob::zeros(4, 4)).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(
      err,
      TensorFileError::ShapeError(TensorShapeError::Overflow(_))
    ));
  }

  #[test]
  fn from_url_checks_scheme() {
    let url = Url::parse("image:///tmp/out.bin?shape=1,2").unwrap();
    assert!(matches!(
      TensorFileRunner::from_url(&url),
      Err(TensorFileError::SchemeMismatch { .. })
    ));
  }

  #[test]
  fn forward_replays_little_endian_data() {
    let path = temp_path("replay.bin");
    let values = [320.0f32, 320.0, 100.0, 100.0, 0.9, 0.95, 0.01];
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(&path, bytes).unwrap();

    let runner = TensorFileRunner::new(&path, vec![1, 1, 7]);
    let output = runner.forward(&Blob::zeros(4, 4)).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(output.shape(), &[1, 1, 7]);
    assert_eq!(output.data(), &values);
  }

  #[test]
  fn forward_rejects_wrong_element_count() {
    let path = temp_path("short.bin");
    std::fs::write(&path, [0u8; 12]).unwrap();

    let runner = TensorFileRunner::new(&path, vec![1, 1, 7]);
    let err = runner.forward(&Blob::zeros(4, 4)).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, TensorFileError::ShapeError(_)));
  }

  #[test]
  fn forward_rejects_truncated_float() {
    let path = temp_path("truncated.bin");
    std::fs::write(&path, [0u8; 10]).unwrap();

    let runner = TensorFileRunner::new(&path, vec![1, 1, 7]);
    let err = runner.forward(&Blob::zeros(4, 4)).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, TensorFileError::TruncatedData(10)));
  }
}
