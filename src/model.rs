// 该文件是 XR-RFID 项目的一部分。
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
// Copyright (C) 2026 XR-RFID Authors

use thiserror::Error;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub class_name: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
}

#[derive(Debug, Clone)]
pub struct DetectResult {
  pub width: u32,
  pub height: u32,
  pub items: Box<[DetectItem]>,
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型文件不存在: {0}")]
  NotFound(String),
  #[error("ONNX Runtime 错误: {0}")]
  Ort(#[from] ort::Error),
  #[error("模型没有输入")]
  NoInput,
  #[error("模型没有输出")]
  NoOutput,
  #[error("不支持的输出形状: {0:?}")]
  UnsupportedLayout(Vec<usize>),
  #[error("输出数据长度 {actual} 与形状 {shape:?} 不符")]
  ShapeMismatch { shape: Vec<usize>, actual: usize },
  #[error("标签错误: {0}")]
  Label(#[from] LabelError),
}

mod labels;
pub use self::labels::{LabelError, Labels};

pub mod decode;
pub use self::decode::{Decoding, OutputLayout, Scale};

mod preprocess;
pub use self::preprocess::preprocess;

mod onnx;
pub use self::onnx::{OnnxDetector, OnnxDetectorBuilder, OutputTensor, describe_outputs};

/// 模型输入边长
pub const INPUT_SIZE: u32 = 640;
/// 默认置信度阈值
pub const DEFAULT_CONFIDENCE: f32 = 0.5;
/// 默认 NMS IoU 阈值
pub const DEFAULT_IOU: f32 = 0.45;
