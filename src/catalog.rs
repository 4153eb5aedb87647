// 该文件是 Shanan （山南西风） 项目的一部分。
// src/catalog.rs - 类别名称表
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

use std::{path::Path, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum CatalogError {
  #[error("无法读取类别文件 {0}: {1}")]
  Io(String, std::io::Error),
}

/// 有序的类别名称表，`class_id` 即下标。
///
/// 内部以 `Arc` 共享，克隆开销很小，可以随检测结果一起传递。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCatalog {
  names: Arc<[String]>,
}

impl ClassCatalog {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  /// 内置的 80 类 COCO 类别表
  pub fn coco() -> Self {
    Self::new(COCO_CLASSES)
  }

  /// 按行解析类别表，每行一个类别。
  ///
  /// 末尾的换行不会产生额外的空类别；中间的空行保留，仍占一个下标。
  pub fn from_lines(text: &str) -> Self {
    Self::new(text.lines().map(|line| line.strip_suffix('\r').unwrap_or(line)))
  }

  /// 从按行分隔的文本文件（如 `coco.names`）读取类别表
  pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
    let path = path.as_ref();
    info!("加载类别文件: {}", path.display());
    let text = std::fs::read_to_string(path)
      .map_err(|e| CatalogError::Io(path.display().to_string(), e))?;
    let catalog = Self::from_lines(&text);
    debug!("类别数量: {}", catalog.len());
    Ok(catalog)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn name(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

impl Default for ClassCatalog {
  fn default() -> Self {
    Self::coco()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_lines_keeps_order_and_interior_blank_lines() {
    let catalog = ClassCatalog::from_lines("cat\r\ndog\n\nbird\n");
    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.name(0), Some("cat"));
    assert_eq!(catalog.name(1), Some("dog"));
    assert_eq!(catalog.name(2), Some(""));
    assert_eq!(catalog.name(3), Some("bird"));
    assert_eq!(catalog.name(4), None);
  }

  #[test]
  fn from_lines_on_empty_text_is_empty() {
    assert!(ClassCatalog::from_lines("").is_empty());
  }

  #[test]
  fn coco_has_eighty_classes() {
    let catalog = ClassCatalog::coco();
    assert_eq!(catalog.len(), 80);
    assert_eq!(catalog.name(0), Some("person"));
    assert_eq!(catalog.name(79), Some("toothbrush"));
  }

  #[test]
  fn load_reads_names_file() {
    let path = std::env::temp_dir().join(format!("shanan-catalog-{}.names", std::process::id()));
    std::fs::write(&path, "person\nbicycle\ncar\n").unwrap();
    let catalog = ClassCatalog::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(catalog.iter().collect::<Vec<_>>(), ["person", "bicycle", "car"]);
  }

  #[test]
  fn load_missing_file_is_io_error() {
    let err = ClassCatalog::load("/definitely/not/here.names").unwrap_err();
    assert!(matches!(err, CatalogError::Io(..)));
  }
}
