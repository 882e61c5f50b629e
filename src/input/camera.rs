// 该文件是 XR-RFID 项目的一部分。
// src/input/camera.rs - GStreamer 摄像头输入
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

//! # 摄像头输入
//!
//! 通过 V4L2 读取摄像头，解码并转换为 RGB 后由 appsink 交给推理循环。
//!
//! ```text
//! camera:///dev/video0?width=1280&height=720&fps=30
//! ```
//!
//! 不带参数时使用摄像头的默认分辨率与帧率。
//!
//! 读帧失败（包括流结束）时迭代器结束，不做重试。
//! 输入被丢弃时管道置为 `Null`，释放摄像头。
//!
//! ## 系统依赖
//!
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev \
//!   gstreamer1.0-plugins-good
//! ```

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbNhwcFrame, url_file_path};

const DEFAULT_CAMERA: &str = "/dev/video0";

#[derive(Error, Debug)]
pub enum CameraInputError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("Unsupported video format: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInputBuilder {
  device: String,
  width: Option<u32>,
  height: Option<u32>,
  fps: Option<u32>,
}

impl Default for CameraInputBuilder {
  fn default() -> Self {
    Self {
      device: DEFAULT_CAMERA.to_string(),
      width: None,
      height: None,
      fps: None,
    }
  }
}

impl FromUrlWithScheme for CameraInputBuilder {
  const SCHEME: &'static str = "camera";
}

impl FromUrl for CameraInputBuilder {
  type Error = CameraInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(CameraInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let number = |key: &str| query.get(key).and_then(|v| v.parse::<u32>().ok());

    let path = url_file_path(url);
    let device = if path.is_empty() || path == "/" {
      DEFAULT_CAMERA.to_string()
    } else {
      path
    };

    Ok(CameraInputBuilder {
      device,
      width: number("width"),
      height: number("height"),
      fps: number("fps"),
    })
  }
}

impl CameraInputBuilder {
  pub fn device(mut self, device: impl Into<String>) -> Self {
    self.device = device.into();
    self
  }

  pub fn pipeline_description(&self) -> String {
    let mut items = vec![
      format!("v4l2src device={}", self.device),
      "decodebin".to_string(),
      "videoconvert".to_string(),
    ];

    let mut caps = vec!["video/x-raw".to_string(), "format=RGB".to_string()];
    if self.width.is_some() || self.height.is_some() {
      items.push("videoscale".to_string());
    }
    if let Some(width) = self.width {
      caps.push(format!("width={}", width));
    }
    if let Some(height) = self.height {
      caps.push(format!("height={}", height));
    }
    if let Some(fps) = self.fps {
      items.push("videorate".to_string());
      caps.push(format!("framerate={}/1", fps));
    }
    items.push(caps.join(","));
    items.push("appsink name=sink max-buffers=2 drop=true sync=false".to_string());

    items.join(" ! ")
  }

  pub fn build(self) -> Result<CameraInput, CameraInputError> {
    gst::init()?;

    let description = self.pipeline_description();
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| CameraInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(CameraInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| CameraInputError::AppSinkNotFound)?;

    pipeline.set_state(gst::State::Playing)?;
    info!("摄像头已打开: {}", self.device);

    Ok(CameraInput {
      pipeline,
      appsink,
      device: self.device,
      next_index: 0,
    })
  }
}

pub struct CameraInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  device: String,
  next_index: u64,
}

impl Drop for CameraInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
    info!("摄像头已释放: {}", self.device);
  }
}

impl Iterator for CameraInput {
  type Item = RgbNhwcFrame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = match self.appsink.pull_sample() {
      Ok(sample) => sample,
      Err(e) => {
        warn!("摄像头没有更多帧: {}", e);
        return None;
      }
    };

    match convert_sample(self.next_index, &sample) {
      Ok(frame) => {
        self.next_index += 1;
        Some(frame)
      }
      Err(e) => {
        error!("Failed to fetch sample: {}", e);
        None
      }
    }
  }
}

/// 去掉行尾填充，复制为紧密排列的 RGB 帧
fn convert_sample(index: u64, sample: &gst::Sample) -> Result<RgbNhwcFrame, CameraInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| CameraInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| CameraInputError::PipelineError("No caps in sample".to_string()))?;
  let info = gst_video::VideoInfo::from_caps(caps)
    .map_err(|e| CameraInputError::PipelineError(format!("Invalid caps: {}", e)))?;

  if info.format() != gst_video::VideoFormat::Rgb {
    return Err(CameraInputError::UnsupportedFormat(info.format()));
  }

  let map = buffer.map_readable().map_err(|e| {
    CameraInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;

  let (width, height) = (info.width(), info.height());
  let row = width as usize * 3;
  let stride = info.stride()[0] as usize;
  let data = map.as_slice();
  if height == 0 || stride < row || data.len() < stride * (height as usize - 1) + row {
    return Err(CameraInputError::PipelineError(format!(
      "Buffer size mismatch: {} bytes for {}x{} (stride {})",
      data.len(),
      width,
      height,
      stride
    )));
  }

  let mut pixels = Vec::with_capacity(row * height as usize);
  for y in 0..height as usize {
    pixels.extend_from_slice(&data[y * stride..y * stride + row]);
  }

  RgbNhwcFrame::try_from_raw(index, width, height, pixels)
    .map_err(|e| CameraInputError::PipelineError(e.to_string()))
}
