// 该文件是 XR-RFID 项目的一部分。
// src/output.rs - 检测结果输出
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::RgbNhwcFrame, model::DetectResult, rfid::TagFilter,
};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

pub mod draw;
pub use self::draw::{Draw, DrawError};

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "gstreamer_output")]
mod display;
#[cfg(feature = "gstreamer_output")]
pub use self::display::{DisplayOutput, DisplayOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "gstreamer_output")]
  #[error("窗口显示错误: {0}")]
  DisplayOutputError(#[from] DisplayOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  SaveImageFile(SaveImageFileOutput),
  #[cfg(feature = "gstreamer_output")]
  Display(DisplayOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => Ok(OutputWrapper::SaveImageFile(
        SaveImageFileOutput::from_url(url)?,
      )),
      #[cfg(feature = "gstreamer_output")]
      DisplayOutput::SCHEME => Ok(OutputWrapper::Display(DisplayOutput::from_url(url)?)),
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl OutputWrapper {
  pub fn with_draw(self, draw: Draw) -> Self {
    match self {
      OutputWrapper::SaveImageFile(output) => OutputWrapper::SaveImageFile(output.with_draw(draw)),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::Display(output) => OutputWrapper::Display(output.with_draw(draw)),
    }
  }
}

impl Render<RgbNhwcFrame, DetectResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbNhwcFrame, result: &DetectResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFile(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::Display(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

/// 渲染前把每个检测项写进日志
pub struct LogDetections<O>(pub O);

impl<O: Render<RgbNhwcFrame, DetectResult>> Render<RgbNhwcFrame, DetectResult>
  for LogDetections<O>
{
  type Error = O::Error;

  fn render_result(&self, frame: &RgbNhwcFrame, result: &DetectResult) -> Result<(), Self::Error> {
    info!("第 {} 帧: {} 个目标", frame.index(), result.items.len());
    for item in result.items.iter() {
      info!(
        "  {} ({}): {:.2} [{:.0}, {:.0}, {:.0}, {:.0}]",
        item.class_name,
        item.class_id,
        item.score,
        item.bbox[0],
        item.bbox[1],
        item.bbox[2],
        item.bbox[3]
      );
    }
    self.0.render_result(frame, result)
  }
}

/// 渲染前按 RFID 标签过滤检测项；没有过滤器时原样渲染
pub struct FilterByTag<O> {
  filter: Option<TagFilter>,
  inner: O,
}

impl<O> FilterByTag<O> {
  pub fn new(filter: Option<TagFilter>, inner: O) -> Self {
    Self { filter, inner }
  }
}

impl<O: Render<RgbNhwcFrame, DetectResult>> Render<RgbNhwcFrame, DetectResult>
  for FilterByTag<O>
{
  type Error = O::Error;

  fn render_result(&self, frame: &RgbNhwcFrame, result: &DetectResult) -> Result<(), Self::Error> {
    match &self.filter {
      Some(filter) => self.inner.render_result(frame, &filter.apply(result)),
      None => self.inner.render_result(frame, result),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::cell::{Cell, RefCell};

  use super::*;
  use crate::{
    model::DetectItem,
    rfid::{TagMap, TagSource},
  };

  struct Counting(Cell<usize>);

  impl Render<RgbNhwcFrame, DetectResult> for Counting {
    type Error = std::convert::Infallible;

    fn render_result(&self, _: &RgbNhwcFrame, _: &DetectResult) -> Result<(), Self::Error> {
      self.0.set(self.0.get() + 1);
      Ok(())
    }
  }

  struct Recording(RefCell<Vec<Vec<String>>>);

  impl Render<RgbNhwcFrame, DetectResult> for Recording {
    type Error = std::convert::Infallible;

    fn render_result(&self, _: &RgbNhwcFrame, result: &DetectResult) -> Result<(), Self::Error> {
      let names = result.items.iter().map(|i| i.class_name.clone()).collect();
      self.0.borrow_mut().push(names);
      Ok(())
    }
  }

  struct FixedTag(&'static str);

  impl TagSource for FixedTag {
    fn current_tag(&self) -> Option<String> {
      Some(self.0.to_string())
    }
  }

  fn two_items() -> DetectResult {
    let item = |name: &str| DetectItem {
      class_id: 0,
      class_name: name.to_string(),
      score: 0.8,
      bbox: [0.0, 0.0, 1.0, 1.0],
    };
    DetectResult {
      width: 2,
      height: 2,
      items: vec![item("blue"), item("red")].into_boxed_slice(),
    }
  }

  #[test]
  fn filter_by_tag_renders_matching_items() {
    let filter = TagFilter::new(FixedTag("e0b95df1"), TagMap::builtin().unwrap());
    let output = FilterByTag::new(Some(filter), Recording(RefCell::new(Vec::new())));
    let frame = RgbNhwcFrame::with_shape(0, 2, 2);
    output.render_result(&frame, &two_items()).unwrap();
    assert_eq!(
      output.inner.0.borrow().as_slice(),
      &[vec!["blue row 1, column 2".to_string()]]
    );
  }

  #[test]
  fn filter_by_tag_without_filter_passes_through() {
    let output = FilterByTag::new(None, Recording(RefCell::new(Vec::new())));
    let frame = RgbNhwcFrame::with_shape(0, 2, 2);
    output.render_result(&frame, &two_items()).unwrap();
    assert_eq!(
      output.inner.0.borrow().as_slice(),
      &[vec!["blue".to_string(), "red".to_string()]]
    );
  }

  #[test]
  fn log_detections_delegates() {
    let output = LogDetections(Counting(Cell::new(0)));
    let frame = RgbNhwcFrame::with_shape(0, 2, 2);
    let result = DetectResult {
      width: 2,
      height: 2,
      items: Box::new([]),
    };
    output.render_result(&frame, &result).unwrap();
    output.render_result(&frame, &result).unwrap();
    assert_eq!(output.0.0.get(), 2);
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://localhost:8554/out").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(scheme)) if scheme == "rtsp"
    ));
  }
}
