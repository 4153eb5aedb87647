// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 推理输入 blob 定义
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

use crate::decoder::FrameSize;

const RGB_CHANNELS: usize = 3;

/// 像素最大值，`u8` 除以它映射到 [0, 1]
pub const PIXEL_MAX: f32 = 255.0;

/// 模型输入 blob：NCHW 排布，RGB 三通道，`f32` 取值 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
  width: u32,
  height: u32,
  data: Box<[f32]>,
}

impl Blob {
  pub fn zeros(width: u32, height: u32) -> Self {
    let size = RGB_CHANNELS * (width as usize) * (height as usize);
    Self {
      width,
      height,
      data: vec![0.0; size].into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 张量形状 `[1, C, H, W]`
  pub fn shape(&self) -> [usize; 4] {
    [
      1,
      self.channels(),
      self.height as usize,
      self.width as usize,
    ]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }
}

impl AsMut<[f32]> for Blob {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

/// 可以送入检测流程的帧：提供原始尺寸，并能生成指定尺寸的 blob
pub trait InferenceFrame {
  fn frame_size(&self) -> FrameSize;
  fn to_blob(&self, width: u32, height: u32) -> Blob;
}

#[cfg(feature = "read_image_file")]
mod rgb_image {
  use image::{RgbImage, imageops::FilterType};

  use super::{Blob, InferenceFrame, PIXEL_MAX};
  use crate::decoder::FrameSize;

  impl Blob {
    /// 缩放到模型输入尺寸并转为 NCHW 的 `f32` blob，不裁剪
    pub fn from_rgb_image(image: &RgbImage, width: u32, height: u32) -> Self {
      let resized;
      let image = if image.dimensions() == (width, height) {
        image
      } else {
        resized = image::imageops::resize(image, width, height, FilterType::Triangle);
        &resized
      };

      let mut blob = Blob::zeros(width, height);
      let plane_size = (width as usize) * (height as usize);
      let slice = blob.as_mut();

      for (x, y, pixel) in image.enumerate_pixels() {
        let idx = (y as usize) * (width as usize) + (x as usize);
        for c in 0..3 {
          slice[c * plane_size + idx] = pixel[c] as f32 / PIXEL_MAX;
        }
      }
      blob
    }
  }

  impl InferenceFrame for RgbImage {
    fn frame_size(&self) -> FrameSize {
      FrameSize::new(self.width(), self.height())
    }

    fn to_blob(&self, width: u32, height: u32) -> Blob {
      Blob::from_rgb_image(self, width, height)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zeros_has_nchw_shape() {
    let blob = Blob::zeros(4, 2);
    assert_eq!(blob.channels(), 3);
    assert_eq!(blob.shape(), [1, 3, 2, 4]);
    assert_eq!(blob.as_nchw().len(), 24);
  }

  #[cfg(feature = "read_image_file")]
  #[test]
  fn from_rgb_image_is_planar_and_scaled() {
    use image::{Rgb, RgbImage};

    let image = RgbImage::from_fn(2, 2, |x, y| Rgb([(x * 255) as u8, (y * 255) as u8, 51]));
    let blob = Blob::from_rgb_image(&image, 2, 2);
    let data = blob.as_nchw();

    // R 平面
    assert_eq!(&data[0..4], &[0.0, 1.0, 0.0, 1.0]);
    // G 平面
    assert_eq!(&data[4..8], &[0.0, 0.0, 1.0, 1.0]);
    // B 平面
    assert!(data[8..12].iter().all(|v| (v - 0.2).abs() < 1e-6));
  }

  #[cfg(feature = "read_image_file")]
  #[test]
  fn from_rgb_image_resizes_to_model_input() {
    use image::{Rgb, RgbImage};

    let image = RgbImage::from_pixel(40, 20, Rgb([255, 0, 0]));
    assert_eq!(image.frame_size(), FrameSize::new(40, 20));
    let blob = image.to_blob(16, 16);
    assert_eq!(blob.shape(), [1, 3, 16, 16]);
    assert!(blob.as_nchw()[..256].iter().all(|v| (v - 1.0).abs() < 1e-2));
    assert!(blob.as_nchw()[256..].iter().all(|v| v.abs() < 1e-2));
  }
}
