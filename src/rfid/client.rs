// 该文件是 XR-RFID 项目的一部分。
// src/rfid/client.rs - 查询 RFID 服务的 HTTP 客户端
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

use std::time::Duration;

use reqwest::{StatusCode, blocking::Client};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://raspberrypi.local:5000/";
/// 每帧查询一次，超过这个时间就当作没有标签
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("创建 HTTP 客户端失败: {0}")]
  Build(#[from] reqwest::Error),
}

/// 当前在读卡器上的标签
pub trait TagSource {
  fn current_tag(&self) -> Option<String>;
}

pub struct RfidClient {
  client: Client,
  url: Url,
}

impl RfidClient {
  pub fn new(url: Url, timeout: Duration) -> Result<Self, ClientError> {
    let client = Client::builder().timeout(timeout).build()?;
    info!("RFID 服务地址: {}，超时 {:?}", url, timeout);
    Ok(Self { client, url })
  }

  pub fn url(&self) -> &Url {
    &self.url
  }
}

impl TagSource for RfidClient {
  /// 连接失败、超时、408 或其他非 2xx 状态都视为没有标签
  fn current_tag(&self) -> Option<String> {
    let response = match self.client.get(self.url.clone()).send() {
      Ok(response) => response,
      Err(e) if e.is_timeout() => {
        debug!("RFID 查询超时: {}", e);
        return None;
      }
      Err(e) => {
        warn!("RFID 查询失败: {}", e);
        return None;
      }
    };

    match response.status() {
      StatusCode::REQUEST_TIMEOUT => {
        debug!("读卡器上没有标签");
        return None;
      }
      status if !status.is_success() => {
        warn!("RFID 服务返回 {}", status);
        return None;
      }
      _ => {}
    }

    match response.text() {
      Ok(body) => {
        let uid = body.trim().to_lowercase();
        if uid.is_empty() {
          return None;
        }
        debug!("读到标签 {}", uid);
        Some(uid)
      }
      Err(e) => {
        warn!("读取 RFID 响应失败: {}", e);
        None
      }
    }
  }
}
