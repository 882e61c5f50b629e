// 该文件是 XR-RFID 项目的一部分。
// src/output/draw.rs - 检测结果绘制
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

use std::path::Path;

use ab_glyph::{FontArc, FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;

use crate::{
  frame::RgbNhwcFrame,
  model::{DetectItem, DetectResult},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_OFFSET: i32 = 10; // 标签基线位于框上方 10 像素
const BOX_THICKNESS: u32 = 2;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("读取字体文件失败 {path}: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("无效的字体文件: {0}")]
  InvalidFont(String),
}

pub struct Draw {
  color: Rgb<u8>,
  thickness: u32,
  font_size: f32,
  font: FontArc,
  labels: bool,
}

impl Default for Draw {
  fn default() -> Self {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf"); // default font
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");
    Self {
      color: Rgb(BOX_COLOR),
      thickness: BOX_THICKNESS,
      font_size: LABEL_FONT_SIZE,
      font,
      labels: true,
    }
  }
}

impl Draw {
  /// 用 TrueType 字体文件替换内置字体
  pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| DrawError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let font =
      FontVec::try_from_vec(data).map_err(|_| DrawError::InvalidFont(path.display().to_string()))?;
    info!("加载字体: {}", path.display());
    self.font = FontArc::new(font);
    Ok(self)
  }

  pub fn with_font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  /// 只画框，不画标签
  pub fn without_labels(mut self) -> Self {
    self.labels = false;
    self
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      self.draw_item(image, item);
    }
  }

  /// 复制帧并画上检测结果
  pub fn draw_frame(&self, frame: &RgbNhwcFrame, result: &DetectResult) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_detections(&mut image, result);
    image
  }

  fn draw_item(&self, image: &mut RgbImage, item: &DetectItem) {
    let [x1, y1, x2, y2] = item.bbox.map(|v| v as i32);

    if x2 <= x1 || y2 <= y1 {
      return;
    }

    for t in 0..self.thickness as i32 {
      let (w, h) = (x2 - x1 - 2 * t, y2 - y1 - 2 * t);
      if w <= 0 || h <= 0 {
        break;
      }
      let rect = Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32);
      draw_hollow_rect_mut(image, rect, self.color);
    }

    if !self.labels {
      return;
    }
    let font = &self.font;

    let label = format!("{}: {:.2}", item.class_name, item.score);
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, &label);
    if text_width == 0 || text_height == 0 {
      return;
    }

    let label_x = x1.max(0);
    let label_y = (y1 - LABEL_OFFSET - text_height as i32).max(0);
    draw_filled_rect_mut(
      image,
      Rect::at(label_x, label_y).of_size(text_width, text_height),
      self.color,
    );
    draw_text_mut(image, Rgb([0, 0, 0]), label_x, label_y, scale, font, &label);
  }
}
