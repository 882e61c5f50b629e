// 该文件是 XR-RFID 项目的一部分。
// src/bin/yolo_export.rs - 导出 ONNX 模型
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use xr_rfid::{
  model::INPUT_SIZE,
  ultralytics::{DEFAULT_PROGRAM, ExportRequest, YoloCli},
};

/// 将训练好的权重导出为 ONNX
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 权重文件路径，例如 best.pt
  #[arg(value_name = "MODEL")]
  pub model: PathBuf,
  /// Ultralytics 命令行程序
  #[arg(long, default_value = DEFAULT_PROGRAM)]
  pub yolo: PathBuf,
  /// 导出输入尺寸
  #[arg(long, default_value_t = INPUT_SIZE)]
  pub imgsz: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("导出模型: {}", args.model.display());

  let request = ExportRequest::onnx(&args.model).imgsz(args.imgsz);
  let output = YoloCli::new(&args.yolo).export(&request)?;
  println!("{}", output.display());

  Ok(())
}
