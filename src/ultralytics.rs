// 该文件是 XR-RFID 项目的一部分。
// src/ultralytics.rs - Ultralytics 命令行导出与训练
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

//! 调用 `yolo` 命令行完成模型导出与训练。
//!
//! ```text
//! yolo export model=best.pt format=onnx imgsz=640 dynamic=False simplify=True
//! yolo train model=yolo11n.pt data=data.yaml epochs=100 imgsz=640
//! ```
//!
//! 参数原样传给工具，不读取数据集内容；训练检查点由工具自身管理。

use std::{
  ffi::OsString,
  path::{Path, PathBuf},
  process::{Command, ExitStatus},
};

use thiserror::Error;
use tracing::{error, info};

use crate::model::INPUT_SIZE;

pub const DEFAULT_PROGRAM: &str = "yolo";
pub const DEFAULT_EPOCHS: u32 = 100;

#[derive(Error, Debug)]
pub enum ToolError {
  #[error("无法启动 {program}: {source}")]
  Spawn {
    program: String,
    source: std::io::Error,
  },
  #[error("命令执行失败: {0}")]
  Failed(ExitStatus),
  #[error("导出完成但未找到输出文件: {}", .0.display())]
  MissingOutput(PathBuf),
}

fn python_bool(value: bool) -> &'static str {
  if value { "True" } else { "False" }
}

fn key_value(key: &str, value: impl AsRef<std::ffi::OsStr>) -> OsString {
  let mut arg = OsString::from(key);
  arg.push("=");
  arg.push(value);
  arg
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
  pub model: PathBuf,
  pub imgsz: u32,
  pub dynamic: bool,
  pub simplify: bool,
}

impl ExportRequest {
  pub fn onnx(model: impl AsRef<Path>) -> Self {
    Self {
      model: model.as_ref().to_path_buf(),
      imgsz: INPUT_SIZE,
      dynamic: false,
      simplify: true,
    }
  }

  pub fn imgsz(mut self, imgsz: u32) -> Self {
    self.imgsz = imgsz;
    self
  }

  pub fn args(&self) -> Vec<OsString> {
    vec![
      OsString::from("export"),
      key_value("model", &self.model),
      OsString::from("format=onnx"),
      OsString::from(format!("imgsz={}", self.imgsz)),
      OsString::from(format!("dynamic={}", python_bool(self.dynamic))),
      OsString::from(format!("simplify={}", python_bool(self.simplify))),
    ]
  }

  /// 工具把 ONNX 文件写在权重文件旁边，同名不同扩展名
  pub fn output_path(&self) -> PathBuf {
    self.model.with_extension("onnx")
  }
}

#[derive(Debug, Clone)]
pub struct TrainRequest {
  pub model: PathBuf,
  pub data: PathBuf,
  pub epochs: u32,
  pub imgsz: u32,
}

impl TrainRequest {
  pub fn new(model: impl AsRef<Path>, data: impl AsRef<Path>) -> Self {
    Self {
      model: model.as_ref().to_path_buf(),
      data: data.as_ref().to_path_buf(),
      epochs: DEFAULT_EPOCHS,
      imgsz: INPUT_SIZE,
    }
  }

  pub fn args(&self) -> Vec<OsString> {
    vec![
      OsString::from("train"),
      key_value("model", &self.model),
      key_value("data", &self.data),
      OsString::from(format!("epochs={}", self.epochs)),
      OsString::from(format!("imgsz={}", self.imgsz)),
    ]
  }
}

#[derive(Debug, Clone)]
pub struct YoloCli {
  program: PathBuf,
}

impl Default for YoloCli {
  fn default() -> Self {
    Self::new(DEFAULT_PROGRAM)
  }
}

impl YoloCli {
  pub fn new(program: impl AsRef<Path>) -> Self {
    Self {
      program: program.as_ref().to_path_buf(),
    }
  }

  fn run(&self, args: &[OsString]) -> Result<(), ToolError> {
    info!(
      "执行: {} {}",
      self.program.display(),
      args
        .iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
    );

    let status = Command::new(&self.program)
      .args(args)
      .status()
      .map_err(|source| ToolError::Spawn {
        program: self.program.display().to_string(),
        source,
      })?;

    if !status.success() {
      error!("{} 退出状态: {}", self.program.display(), status);
      return Err(ToolError::Failed(status));
    }
    Ok(())
  }

  /// 导出 ONNX 模型并返回输出路径
  pub fn export(&self, request: &ExportRequest) -> Result<PathBuf, ToolError> {
    self.run(&request.args())?;

    let output = request.output_path();
    if !output.exists() {
      error!("未找到导出的模型: {}", output.display());
      return Err(ToolError::MissingOutput(output));
    }
    info!("模型已导出到: {}", output.display());
    Ok(output)
  }

  pub fn train(&self, request: &TrainRequest) -> Result<(), ToolError> {
    self.run(&request.args())?;
    info!("训练完成");
    Ok(())
  }
}
