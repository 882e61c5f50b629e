// 该文件是 XR-RFID 项目的一部分。
// src/output/display.rs - GStreamer 窗口显示
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

//! # 窗口显示
//!
//! 将画好检测框的帧推入 `appsrc ! videoconvert ! autovideosink`。
//! 画面尺寸取自第一帧，尺寸变化时重新设置 caps。
//! 窗口被关闭后管道报错，下一次渲染返回错误，循环随之结束。

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  model::DetectResult,
  output::{Render, draw::Draw},
};

const PIPELINE: &str = "appsrc name=src is-live=true format=time ! videoconvert ! \
                        autovideosink sync=false";

#[derive(Error, Debug)]
pub enum DisplayOutputError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

pub struct DisplayOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  draw: Draw,
  shape: Mutex<Option<(u32, u32)>>,
}

impl FromUrlWithScheme for DisplayOutput {
  const SCHEME: &'static str = "display";
}

impl FromUrl for DisplayOutput {
  type Error = DisplayOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DisplayOutputError::SchemeMismatch);
    }

    gst::init()?;
    info!("Creating display pipeline: {}", PIPELINE);

    let pipeline = gst::parse::launch(PIPELINE)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| DisplayOutputError::PipelineError("Failed to create pipeline".to_string()))?;
    let appsrc = pipeline
      .by_name("src")
      .ok_or(DisplayOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| DisplayOutputError::AppSrcNotFound)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(DisplayOutput {
      pipeline,
      appsrc,
      draw: Draw::default(),
      shape: Mutex::new(None),
    })
  }
}

impl Drop for DisplayOutput {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop display pipeline: {}", e);
    }
    info!("显示窗口已关闭");
  }
}

impl DisplayOutput {
  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  fn ensure_caps(&self, width: u32, height: u32) {
    let mut shape = self.shape.lock();
    if *shape == Some((width, height)) {
      return;
    }
    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", width as i32)
      .field("height", height as i32)
      .field("framerate", gst::Fraction::new(0, 1))
      .build();
    self.appsrc.set_caps(Some(&caps));
    info!("显示尺寸: {}x{}", width, height);
    *shape = Some((width, height));
  }

  fn check_bus(&self) -> Result<(), DisplayOutputError> {
    let Some(bus) = self.pipeline.bus() else {
      return Ok(());
    };
    if let Some(message) = bus.pop_filtered(&[gst::MessageType::Error, gst::MessageType::Eos]) {
      return Err(match message.view() {
        gst::MessageView::Error(err) => DisplayOutputError::PipelineError(err.error().to_string()),
        _ => DisplayOutputError::PipelineError("display stream ended".to_string()),
      });
    }
    Ok(())
  }
}

impl Render<RgbNhwcFrame, DetectResult> for DisplayOutput {
  type Error = DisplayOutputError;

  fn render_result(&self, frame: &RgbNhwcFrame, result: &DetectResult) -> Result<(), Self::Error> {
    self.check_bus()?;

    let image = self.draw.draw_frame(frame, result);
    self.ensure_caps(image.width(), image.height());

    let buffer = gst::Buffer::from_mut_slice(image.into_raw());
    self.appsrc.push_buffer(buffer).map_err(|e| {
      DisplayOutputError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;
    Ok(())
  }
}
