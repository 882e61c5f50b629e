// 该文件是 XR-RFID 项目的一部分。
// src/bin/onnx_inference.rs - 直接调用 ONNX Runtime 推理
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

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::info;

use xr_rfid::{
  FromUrl, FromUrlWithScheme,
  input::ImageFileInput,
  model::{Decoding, Labels, OnnxDetectorBuilder, describe_outputs},
  output::{Draw, LogDetections, OutputWrapper, Render, SaveImageFileOutput},
  parse_location, url_file_path,
};

/// 打印模型的原始输出并按端到端格式解码
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径（端到端导出）
  #[arg(value_name = "MODEL")]
  pub model: PathBuf,
  /// 输入图像路径
  #[arg(value_name = "IMAGE")]
  pub image: String,
  /// 类别名称文件，每行一个
  #[arg(long, default_value = "best-labels.txt")]
  pub labels: PathBuf,
  /// 输出位置，默认为输入旁边的 <名称>-onnx.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<String>,
  /// 替换内置的标签字体（TrueType）
  #[arg(long)]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let labels = Labels::from_file(&args.labels)?;
  let model = OnnxDetectorBuilder::new(&args.model)
    .labels(labels)
    .decoding(Decoding::EndToEnd)
    .build()?;

  let input_url = parse_location(&args.image, ImageFileInput::SCHEME)?;
  let frame = ImageFileInput::from_url(&input_url)?
    .next()
    .ok_or_else(|| anyhow!("没有输入帧"))?;

  let outputs = model.forward(&frame)?;
  println!("{}", describe_outputs(&outputs));
  let result = model.decode(&outputs, frame.width(), frame.height())?;

  let output_url = match &args.output {
    Some(output) => parse_location(output, SaveImageFileOutput::SCHEME)?,
    None => {
      let image = PathBuf::from(url_file_path(&input_url));
      let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
      let path = image.with_file_name(format!("{}-onnx.png", stem));
      parse_location(&path.to_string_lossy(), SaveImageFileOutput::SCHEME)?
    }
  };
  info!("输出路径: {}", output_url);

  let mut draw = Draw::default();
  if let Some(font) = &args.font {
    draw = draw.with_font_file(font)?;
  }
  let output = LogDetections(OutputWrapper::from_url(&output_url)?.with_draw(draw));
  output.render_result(&frame, &result)?;

  Ok(())
}
