// 该文件是 XR-RFID 项目的一部分。
// src/model/preprocess.rs - 图像预处理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 XR-RFID Authors

use image::imageops::{self, FilterType};
use ndarray::Array4;

use crate::frame::RgbNhwcFrame;

/// 拉伸到 `input_size` 见方（不保持宽高比），归一化到 [0, 1]，
/// HWC 转 CHW 并添加批次维度
pub fn preprocess(frame: &RgbNhwcFrame, input_size: u32) -> Array4<f32> {
  let image = frame.to_rgb_image();
  let resized = imageops::resize(&image, input_size, input_size, FilterType::Triangle);

  let size = input_size as usize;
  let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
  for (x, y, pixel) in resized.enumerate_pixels() {
    for c in 0..3 {
      tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
    }
  }
  tensor
}

#[cfg(test)]
mod tests {
  use image::{Rgb, RgbImage};

  use super::*;

  #[test]
  fn produces_nchw_batch_of_one() {
    let frame = RgbNhwcFrame::from_image(0, RgbImage::new(320, 240));
    let tensor = preprocess(&frame, 640);
    assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
  }

  #[test]
  fn keeps_rgb_channel_order_and_normalizes() {
    let image = RgbImage::from_pixel(50, 30, Rgb([255, 0, 51]));
    let frame = RgbNhwcFrame::from_image(0, image);
    let tensor = preprocess(&frame, 64);

    assert!((tensor[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
    assert!(tensor[[0, 1, 10, 10]].abs() < 1e-6);
    assert!((tensor[[0, 2, 10, 10]] - 0.2).abs() < 1e-6);
    assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
  }
}
