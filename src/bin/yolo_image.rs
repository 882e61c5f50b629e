// 该文件是 XR-RFID 项目的一部分。
// src/bin/yolo_image.rs - 单张图像检测
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

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use xr_rfid::{
  FromUrl, FromUrlWithScheme,
  input::{ImageFileInput, InputWrapper},
  model::{DEFAULT_CONFIDENCE, Labels, OnnxDetectorBuilder},
  output::{Draw, FilterByTag, LogDetections, OutputWrapper, SaveImageFileOutput},
  parse_location,
  rfid::{DEFAULT_REQUEST_TIMEOUT, RfidClient, TagFilter, TagMap},
  task::{OneShotTask, Task},
  url_file_path,
};

/// 对一张图像运行检测模型并保存标注结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(value_name = "MODEL")]
  pub model: PathBuf,
  /// 输入图像路径或 URL
  #[arg(value_name = "IMAGE")]
  pub image: String,
  /// 输出位置，默认为输入旁边的 <名称>-detections.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<String>,
  /// 类别名称文件，每行一个；默认读取模型元数据
  #[arg(long)]
  pub labels: Option<PathBuf>,
  /// 替换内置的标签字体（TrueType）
  #[arg(long)]
  pub font: Option<PathBuf>,
  /// 置信度阈值
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
  pub confidence: f32,
  /// RFID 服务地址，例如 http://raspberrypi.local:5000/；指定后只画与当前标签对应的检测项
  #[arg(long, value_name = "URL")]
  pub rfid_url: Option<Url>,
  /// 标签映射文件（TOML），默认使用内置映射
  #[arg(long)]
  pub tag_map: Option<PathBuf>,
  /// 每次查询 RFID 服务的超时（毫秒）
  #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
  pub rfid_timeout_ms: u64,
}

fn default_output(image: &Path) -> Result<Url> {
  let stem = image
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "image".to_string());
  let path = image.with_file_name(format!("{}-detections.png", stem));
  Ok(parse_location(&path.to_string_lossy(), SaveImageFileOutput::SCHEME)?)
}

fn tag_filter(args: &Args) -> Result<Option<TagFilter>> {
  let Some(url) = &args.rfid_url else {
    return Ok(None);
  };
  let tags = match &args.tag_map {
    Some(path) => TagMap::from_file(path)?,
    None => TagMap::builtin()?,
  };
  let client = RfidClient::new(url.clone(), Duration::from_millis(args.rfid_timeout_ms))?;
  Ok(Some(TagFilter::new(client, tags)))
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let input_url = parse_location(&args.image, ImageFileInput::SCHEME)?;
  let output_url = match &args.output {
    Some(output) => parse_location(output, SaveImageFileOutput::SCHEME)?,
    None => default_output(Path::new(&url_file_path(&input_url)))?,
  };
  info!("模型文件路径: {}", args.model.display());
  info!("输入来源: {}", input_url);
  info!("输出路径: {}", output_url);

  let mut builder = OnnxDetectorBuilder::new(&args.model).confidence(args.confidence);
  if let Some(labels) = &args.labels {
    builder = builder.labels(Labels::from_file(labels)?);
  }
  let model = builder.build()?;

  let mut draw = Draw::default();
  if let Some(font) = &args.font {
    draw = draw.with_font_file(font)?;
  }

  let input = InputWrapper::from_url(&input_url)?;
  let output = FilterByTag::new(
    tag_filter(&args)?,
    LogDetections(OutputWrapper::from_url(&output_url)?.with_draw(draw)),
  );
  OneShotTask.run_task(input, model, output)?;

  Ok(())
}
