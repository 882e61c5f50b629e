// 该文件是 XR-RFID 项目的一部分。
// src/model/decode.rs - 检测输出解码
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

//! 支持两种 YOLO ONNX 输出：
//!
//! - 端到端：`[1, N, 6]`，每行 `[x1, y1, x2, y2, conf, class]`，NMS 已在图内完成；
//! - 锚点：`[1, 4 + C, A]`，每个锚点 `cx, cy, w, h` 后跟 `C` 个类别分数，需要在此做 NMS。
//!
//! 坐标均为模型输入空间（640x640）坐标。

use std::cmp::Ordering;

use tracing::debug;

use super::{DetectItem, Labels, ModelError};

/// 单帧最多保留的检测数
const MAX_DETECTIONS: usize = 300;
const END_TO_END_ROW: usize = 6;

/// 解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decoding {
  /// 根据输出形状自动判断
  #[default]
  Auto,
  /// 总是按 `[x1, y1, x2, y2, conf, class]` 行解析，只取每行前 6 个值
  EndToEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  EndToEnd { rows: usize, width: usize },
  Anchors { classes: usize, anchors: usize },
}

impl OutputLayout {
  pub fn from_shape(shape: &[usize]) -> Result<Self, ModelError> {
    let (a, b) = match shape {
      [1, a, b] | [a, b] => (*a, *b),
      _ => return Err(ModelError::UnsupportedLayout(shape.to_vec())),
    };

    // 6 列总是端到端行，即使行数少于 6
    if b == END_TO_END_ROW {
      Ok(OutputLayout::EndToEnd { rows: a, width: b })
    } else if a > 4 && b > a {
      Ok(OutputLayout::Anchors {
        classes: a - 4,
        anchors: b,
      })
    } else if b >= END_TO_END_ROW {
      Ok(OutputLayout::EndToEnd { rows: a, width: b })
    } else {
      Err(ModelError::UnsupportedLayout(shape.to_vec()))
    }
  }

  /// 强制按端到端行解析，忽略批次维度
  pub fn end_to_end(shape: &[usize]) -> Result<Self, ModelError> {
    match shape {
      [.., rows, width] if *width >= END_TO_END_ROW => Ok(OutputLayout::EndToEnd {
        rows: *rows,
        width: *width,
      }),
      _ => Err(ModelError::UnsupportedLayout(shape.to_vec())),
    }
  }

  fn len(&self) -> usize {
    match *self {
      OutputLayout::EndToEnd { rows, width } => rows * width,
      OutputLayout::Anchors { classes, anchors } => (classes + 4) * anchors,
    }
  }
}

/// 模型输入空间到原图的缩放
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
  width: u32,
  height: u32,
  sx: f32,
  sy: f32,
}

impl Scale {
  pub fn new(original_width: u32, original_height: u32, input_size: u32) -> Self {
    Self {
      width: original_width,
      height: original_height,
      sx: original_width as f32 / input_size as f32,
      sy: original_height as f32 / input_size as f32,
    }
  }

  /// 缩放后取整，截断到图像范围内，并保证 `x1 <= x2`、`y1 <= y2`
  pub fn to_original(&self, bbox: [f32; 4]) -> [f32; 4] {
    let fix = |v: f32, s: f32, max: u32| -> f32 {
      let v = (v * s) as i64;
      v.clamp(0, max as i64) as f32
    };
    let x1 = fix(bbox[0], self.sx, self.width);
    let y1 = fix(bbox[1], self.sy, self.height);
    let x2 = fix(bbox[2], self.sx, self.width);
    let y2 = fix(bbox[3], self.sy, self.height);
    [x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)]
  }
}

/// 按布局解码
pub fn decode(
  data: &[f32],
  layout: OutputLayout,
  threshold: f32,
  iou: f32,
  scale: &Scale,
  labels: &Labels,
) -> Result<Vec<DetectItem>, ModelError> {
  if data.len() < layout.len() {
    return Err(ModelError::ShapeMismatch {
      shape: match layout {
        OutputLayout::EndToEnd { rows, width } => vec![rows, width],
        OutputLayout::Anchors { classes, anchors } => vec![classes + 4, anchors],
      },
      actual: data.len(),
    });
  }

  let items = match layout {
    OutputLayout::EndToEnd { rows, width } => {
      decode_end_to_end(&data[..rows * width], width, threshold, scale, labels)
    }
    OutputLayout::Anchors { classes, anchors } => {
      let candidates = decode_anchors(data, classes, anchors, threshold, scale, labels);
      nms(candidates, iou)
    }
  };
  debug!("解码得到 {} 个检测结果", items.len());
  Ok(items)
}

/// 置信度严格大于 `threshold` 的行才保留
pub fn decode_end_to_end(
  data: &[f32],
  row_width: usize,
  threshold: f32,
  scale: &Scale,
  labels: &Labels,
) -> Vec<DetectItem> {
  data
    .chunks_exact(row_width)
    .filter_map(|row| {
      let (x1, y1, x2, y2, conf, class) = (row[0], row[1], row[2], row[3], row[4], row[5]);
      if !(conf > threshold) {
        return None;
      }
      let class_id = class.max(0.0) as u32;
      Some(DetectItem {
        class_id,
        class_name: labels.name(class_id),
        score: conf,
        bbox: scale.to_original([x1, y1, x2, y2]),
      })
    })
    .take(MAX_DETECTIONS)
    .collect()
}

/// 数据按 `[4 + classes][anchors]` 行优先排列
pub fn decode_anchors(
  data: &[f32],
  classes: usize,
  anchors: usize,
  threshold: f32,
  scale: &Scale,
  labels: &Labels,
) -> Vec<DetectItem> {
  let at = |row: usize, anchor: usize| data[row * anchors + anchor];
  let mut items = Vec::new();

  for anchor in 0..anchors {
    let mut score = f32::MIN;
    let mut class_id = 0usize;
    for c in 0..classes {
      let s = at(4 + c, anchor);
      if s > score {
        score = s;
        class_id = c;
      }
    }

    if !(score > threshold) {
      continue;
    }

    let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
    let bbox = [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0];
    items.push(DetectItem {
      class_id: class_id as u32,
      class_name: labels.name(class_id as u32),
      score,
      bbox: scale.to_original(bbox),
    });
  }

  items
}

/// 按类别的非极大值抑制
pub fn nms(mut detections: Vec<DetectItem>, iou_threshold: f32) -> Vec<DetectItem> {
  // 按置信度降序排序
  detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

  let mut result: Vec<DetectItem> = Vec::new();
  for det in detections {
    if result.len() >= MAX_DETECTIONS {
      break;
    }
    let suppressed = result
      .iter()
      .any(|kept| kept.class_id == det.class_id && iou(&kept.bbox, &det.bbox) >= iou_threshold);
    if !suppressed {
      result.push(det);
    }
  }
  result
}

/// 计算两个边界框的 IoU
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}
