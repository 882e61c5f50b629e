// 该文件是 XR-RFID 项目的一部分。
// src/rfid/tag_map.rs - 标签 UID 与检测类别的对应关系
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

use std::{collections::HashMap, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  model::{DetectItem, DetectResult},
  rfid::client::TagSource,
};

const BUILTIN_TAG_MAP: &str = include_str!("../../assets/tag-map.toml");

#[derive(Error, Debug)]
pub enum TagMapError {
  #[error("读取标签映射文件 {path} 失败: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("标签映射格式错误: {0}")]
  Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagEntry {
  /// 显示在检测框上的颜色名
  pub label: String,
  /// 例如 `row 1, column 2`
  pub location: String,
  /// 要保留的检测类别，缺省与 `label` 相同
  #[serde(default)]
  pub detect: Option<String>,
}

impl TagEntry {
  pub fn detect_class(&self) -> &str {
    self.detect.as_deref().unwrap_or(&self.label)
  }

  pub fn caption(&self) -> String {
    format!("{} {}", self.label, self.location)
  }

  /// 类别名中的空格按下划线比较，不区分大小写
  fn matches(&self, class_name: &str) -> bool {
    class_name
      .replace(' ', "_")
      .eq_ignore_ascii_case(self.detect_class())
  }
}

#[derive(Deserialize)]
struct TagMapFile {
  #[serde(default)]
  tags: HashMap<String, TagEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct TagMap {
  tags: HashMap<String, TagEntry>,
}

impl TagMap {
  pub fn from_toml(text: &str) -> Result<Self, TagMapError> {
    let file: TagMapFile = toml::from_str(text)?;
    let tags = file
      .tags
      .into_iter()
      .map(|(uid, entry)| (uid.trim().to_lowercase(), entry))
      .collect();
    Ok(Self { tags })
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TagMapError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| TagMapError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let map = Self::from_toml(&text)?;
    info!("从 {} 加载 {} 个标签", path.display(), map.len());
    Ok(map)
  }

  /// 线束工位自带的映射
  pub fn builtin() -> Result<Self, TagMapError> {
    Self::from_toml(BUILTIN_TAG_MAP)
  }

  pub fn get(&self, uid: &str) -> Option<&TagEntry> {
    self.tags.get(&uid.trim().to_lowercase())
  }

  pub fn len(&self) -> usize {
    self.tags.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tags.is_empty()
  }

  /// 只保留与标签对应的检测项，并把类别名换成标签的颜色和位置。
  /// 没有标签或标签未登记时结果为空。
  pub fn select(&self, uid: Option<&str>, result: &DetectResult) -> DetectResult {
    let entry = uid.and_then(|uid| self.get(uid));
    let items: Vec<DetectItem> = match entry {
      Some(entry) => result
        .items
        .iter()
        .filter(|item| entry.matches(&item.class_name))
        .map(|item| DetectItem {
          class_name: entry.caption(),
          ..item.clone()
        })
        .collect(),
      None => Vec::new(),
    };
    debug!(
      "标签 {:?}: 保留 {}/{} 个检测项",
      uid,
      items.len(),
      result.items.len()
    );

    DetectResult {
      width: result.width,
      height: result.height,
      items: items.into_boxed_slice(),
    }
  }
}

/// 每次渲染前查询标签并过滤检测结果
pub struct TagFilter {
  source: Box<dyn TagSource>,
  tags: TagMap,
}

impl TagFilter {
  pub fn new(source: impl TagSource + 'static, tags: TagMap) -> Self {
    Self {
      source: Box::new(source),
      tags,
    }
  }

  pub fn apply(&self, result: &DetectResult) -> DetectResult {
    let uid = self.source.current_tag();
    self.tags.select(uid.as_deref(), result)
  }
}
