// 该文件是 XR-RFID 项目的一部分。
// src/bin/yolo_train.rs - 训练检测模型
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

use xr_rfid::ultralytics::{DEFAULT_PROGRAM, TrainRequest, YoloCli};

/// 以固定的轮数与输入尺寸训练模型
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 初始权重或模型配置，例如 yolo11n.pt
  #[arg(value_name = "MODEL")]
  pub model: PathBuf,
  /// 数据集描述文件，例如 data.yaml
  #[arg(value_name = "DATA")]
  pub data: PathBuf,
  /// Ultralytics 命令行程序
  #[arg(long, default_value = DEFAULT_PROGRAM)]
  pub yolo: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("模型: {}", args.model.display());
  info!("数据集: {}", args.data.display());

  YoloCli::new(&args.yolo).train(&TrainRequest::new(&args.model, &args.data))?;

  Ok(())
}
