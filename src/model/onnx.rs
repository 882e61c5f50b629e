// 该文件是 XR-RFID 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 检测器
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

use std::path::{Path, PathBuf};

use ort::{
  inputs,
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{
  DEFAULT_CONFIDENCE, DEFAULT_IOU, DetectResult, INPUT_SIZE, Labels, Model, ModelError,
  decode::{self, Decoding, OutputLayout, Scale},
  preprocess,
};
use crate::frame::RgbNhwcFrame;

/// 打印输出张量时展示的元素个数
const PREVIEW_ELEMENTS: usize = 500;

/// 复制出会话的一个输出张量
#[derive(Debug, Clone)]
pub struct OutputTensor {
  pub name: String,
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

pub struct OnnxDetectorBuilder {
  model_path: PathBuf,
  input_size: u32,
  confidence: f32,
  iou: f32,
  labels: Option<Labels>,
  decoding: Decoding,
}

impl OnnxDetectorBuilder {
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    Self {
      model_path: model_path.as_ref().to_path_buf(),
      input_size: INPUT_SIZE,
      confidence: DEFAULT_CONFIDENCE,
      iou: DEFAULT_IOU,
      labels: None,
      decoding: Decoding::Auto,
    }
  }

  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn iou(mut self, iou: f32) -> Self {
    self.iou = iou;
    self
  }

  /// 指定类别名称；否则依次尝试模型元数据与 COCO 类别
  pub fn labels(mut self, labels: Labels) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn decoding(mut self, decoding: Decoding) -> Self {
    self.decoding = decoding;
    self
  }

  pub fn build(self) -> Result<OnnxDetector, ModelError> {
    if !self.model_path.exists() {
      return Err(ModelError::NotFound(self.model_path.display().to_string()));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .commit_from_file(&self.model_path)?;

    let input_name = session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .ok_or(ModelError::NoInput)?;
    let output_names: Vec<String> = session
      .outputs
      .iter()
      .map(|output| output.name.clone())
      .collect();
    if output_names.is_empty() {
      return Err(ModelError::NoOutput);
    }
    debug!("模型输入: {}", input_name);
    for (i, name) in output_names.iter().enumerate() {
      debug!("模型输出[{}]: {}", i, name);
    }

    let labels = match self.labels {
      Some(labels) => labels,
      None => metadata_labels(&session).unwrap_or_else(|| {
        warn!("模型元数据中没有类别名称，使用 COCO 类别");
        Labels::coco()
      }),
    };
    info!("模型加载完成，共 {} 个类别", labels.len());

    Ok(OnnxDetector {
      session: Mutex::new(session),
      input_name,
      output_names,
      input_size: self.input_size,
      confidence: self.confidence,
      iou: self.iou,
      labels,
      decoding: self.decoding,
    })
  }
}

fn metadata_labels(session: &Session) -> Option<Labels> {
  let names = match session.metadata().and_then(|meta| meta.custom("names")) {
    Ok(names) => names?,
    Err(e) => {
      debug!("读取模型元数据失败: {}", e);
      return None;
    }
  };
  match Labels::from_metadata(&names) {
    Ok(labels) => Some(labels),
    Err(e) => {
      warn!("解析模型类别名称失败: {}", e);
      None
    }
  }
}

pub struct OnnxDetector {
  session: Mutex<Session>,
  input_name: String,
  output_names: Vec<String>,
  input_size: u32,
  confidence: f32,
  iou: f32,
  labels: Labels,
  decoding: Decoding,
}

impl OnnxDetector {
  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  /// 预处理并执行一次前向推理，返回所有输出张量
  pub fn forward(&self, frame: &RgbNhwcFrame) -> Result<Vec<OutputTensor>, ModelError> {
    let tensor = Tensor::from_array(preprocess(frame, self.input_size))?;

    let mut session = self.session.lock();
    let outputs = session.run(inputs![self.input_name.as_str() => tensor])?;

    let mut tensors = Vec::with_capacity(self.output_names.len());
    for name in &self.output_names {
      let array = outputs[name.as_str()].try_extract_array::<f32>()?;
      tensors.push(OutputTensor {
        name: name.clone(),
        shape: array.shape().to_vec(),
        data: array.iter().copied().collect(),
      });
    }
    Ok(tensors)
  }

  /// 解码第一个输出张量
  pub fn decode(
    &self,
    outputs: &[OutputTensor],
    width: u32,
    height: u32,
  ) -> Result<DetectResult, ModelError> {
    let output = outputs.first().ok_or(ModelError::NoOutput)?;
    let layout = match self.decoding {
      Decoding::Auto => OutputLayout::from_shape(&output.shape)?,
      Decoding::EndToEnd => OutputLayout::end_to_end(&output.shape)?,
    };
    debug!("输出布局: {:?}", layout);

    let scale = Scale::new(width, height, self.input_size);
    let items = decode::decode(
      &output.data,
      layout,
      self.confidence,
      self.iou,
      &scale,
      &self.labels,
    )?;

    Ok(DetectResult {
      width,
      height,
      items: items.into_boxed_slice(),
    })
  }
}

impl Model for OnnxDetector {
  type Input = RgbNhwcFrame;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let outputs = self.forward(input)?;
    self.decode(&outputs, input.width(), input.height())
  }
}

/// 输出张量的名称、形状、类型与前若干个元素
pub fn describe_outputs(outputs: &[OutputTensor]) -> String {
  let mut text = String::from("Model Outputs:\n");
  for (i, output) in outputs.iter().enumerate() {
    let preview: Vec<String> = output
      .data
      .iter()
      .take(PREVIEW_ELEMENTS)
      .map(|v| v.to_string())
      .collect();
    text.push_str(&format!("Output {} (Name: {}):\n", i, output.name));
    text.push_str(&format!("  Shape: {:?}\n", output.shape));
    text.push_str("  Data Type: float32\n");
    text.push_str(&format!("  First elements: [{}]\n", preview.join(" ")));
    text.push_str(&format!("{}\n", "-".repeat(20)));
  }
  text
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_model_is_reported() {
    let err = OnnxDetectorBuilder::new("/nonexistent/best.onnx")
      .build()
      .err()
      .unwrap();
    assert!(matches!(err, ModelError::NotFound(_)));
  }

  #[test]
  fn describes_every_output() {
    let outputs = vec![
      OutputTensor {
        name: "output0".to_string(),
        shape: vec![1, 2, 6],
        data: vec![1.0, 2.0, 3.0, 4.0, 0.5, 0.0, 5.0, 6.0, 7.0, 8.0, 0.9, 1.0],
      },
      OutputTensor {
        name: "extra".to_string(),
        shape: vec![1],
        data: vec![0.25],
      },
    ];
    let text = describe_outputs(&outputs);
    assert!(text.contains("Output 0 (Name: output0):"));
    assert!(text.contains("Shape: [1, 2, 6]"));
    assert!(text.contains("Output 1 (Name: extra):"));
    assert!(text.contains("First elements: [0.25]"));
  }
}
