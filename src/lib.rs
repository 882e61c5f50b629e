// 该文件是 XR-RFID 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod frame;
pub mod input;
pub mod model;
pub mod output;
pub mod rfid;
pub mod server;
pub mod task;
pub mod ultralytics;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 将命令行中的路径或 URL 解析为 URL。
///
/// 不带协议的本地路径按 `default_scheme` 处理，例如 `photo.jpg` 变为
/// `image:///<绝对路径>/photo.jpg`。路径中的每一段都做百分号编码，
/// 文件名里的 `#`、`?`、`%` 不会被当作 URL 语法。
pub fn parse_location(location: &str, default_scheme: &str) -> Result<url::Url, url::ParseError> {
  if let Ok(url) = url::Url::parse(location)
    && url.scheme().len() > 1
  {
    return Ok(url);
  }

  let path = std::path::Path::new(location);
  let absolute = if path.is_absolute() {
    path.to_path_buf()
  } else {
    std::env::current_dir()
      .map(|dir| dir.join(path))
      .unwrap_or_else(|_| path.to_path_buf())
  };
  let encoded = absolute
    .to_string_lossy()
    .split('/')
    .map(|segment| urlencoding::encode(segment).into_owned())
    .collect::<Vec<_>>()
    .join("/");
  url::Url::parse(&format!("{}://{}", default_scheme, encoded))
}

/// 取出 URL 中的文件路径，并还原百分号编码。
pub fn url_file_path(url: &url::Url) -> String {
  urlencoding::decode(url.path())
    .map(|path| path.into_owned())
    .unwrap_or_else(|_| url.path().to_string())
}
