// 该文件是 XR-RFID 项目的一部分。
// src/model/labels.rs - 类别名称
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

use std::{path::Path, sync::LazyLock};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

/// COCO 数据集类别名称
const COCO_CLASSES: [&str; 80] = [
  "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
  "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
  "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
  "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
  "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
  "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
  "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
  "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
  "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
  "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Ultralytics 写入 ONNX 元数据的 `names` 字典，例如 `{0: 'person', 1: "o'clock"}`
static NAMES_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(\d+)\s*:\s*(?:'([^']*)'|"([^"]*)")"#).expect("类别名称正则表达式无效")
});

/// 元数据中允许的类别编号上限（不含）
pub const MAX_CLASSES: usize = 65_536;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("读取标签文件 {path} 失败: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("元数据中没有类别名称: {0}")]
  EmptyMetadata(String),
  #[error("类别编号 {0} 超出范围，应小于 {max}", max = MAX_CLASSES)]
  ClassIdOutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
  names: Vec<String>,
}

impl Labels {
  pub fn new(names: Vec<String>) -> Self {
    Self { names }
  }

  /// 每行一个类别名称
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let names: Vec<String> = text.lines().map(|line| line.trim().to_string()).collect();
    info!("从 {} 加载 {} 个类别名称", path.display(), names.len());
    Ok(Self { names })
  }

  pub fn from_metadata(names: &str) -> Result<Self, LabelError> {
    let mut entries: Vec<(usize, String)> = Vec::new();
    for caps in NAMES_ENTRY.captures_iter(names) {
      let (Some(id), Some(name)) = (caps.get(1), caps.get(2).or_else(|| caps.get(3))) else {
        continue;
      };
      let id = id
        .as_str()
        .parse::<usize>()
        .ok()
        .filter(|id| *id < MAX_CLASSES)
        .ok_or_else(|| LabelError::ClassIdOutOfRange(id.as_str().to_string()))?;
      entries.push((id, name.as_str().to_string()));
    }

    let Some(max_id) = entries.iter().map(|(id, _)| *id).max() else {
      return Err(LabelError::EmptyMetadata(names.to_string()));
    };

    let mut labels: Vec<String> = (0..=max_id).map(|id| id.to_string()).collect();
    for (id, name) in entries {
      labels[id] = name;
    }
    debug!("元数据类别名称: {:?}", labels);
    Ok(Self { names: labels })
  }

  pub fn coco() -> Self {
    Self {
      names: COCO_CLASSES.iter().map(|name| name.to_string()).collect(),
    }
  }

  /// 未知类别以数字编号显示
  pub fn name(&self, class_id: u32) -> String {
    self
      .names
      .get(class_id as usize)
      .cloned()
      .unwrap_or_else(|| class_id.to_string())
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}
