// 该文件是 XR-RFID 项目的一部分。
// src/server.rs - RFID 查询 HTTP 服务
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

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
  Router,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::get,
};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::rfid::{RfidError, TagReader};

pub const NO_TAG_MESSAGE: &str = "No RFID tag found within the timeout";
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("读卡器错误: {0}")]
  Rfid(#[from] RfidError),
  #[error("读卡任务失败: {0}")]
  Join(#[from] tokio::task::JoinError),
  #[error("监听 {addr} 失败: {source}")]
  Bind {
    addr: SocketAddr,
    source: std::io::Error,
  },
  #[error("服务运行失败: {0}")]
  Serve(std::io::Error),
}

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    error!("请求失败: {}", self);
    (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
  }
}

pub type SharedReader = Arc<Mutex<Box<dyn TagReader>>>;

#[derive(Clone)]
pub struct AppState {
  reader: SharedReader,
  poll_timeout: Duration,
}

impl AppState {
  pub fn new(reader: impl TagReader + 'static, poll_timeout: Duration) -> Self {
    Self {
      reader: Arc::new(Mutex::new(Box::new(reader))),
      poll_timeout,
    }
  }
}

pub fn create_app(state: AppState) -> Router {
  Router::new()
    .route("/", get(get_rfid_code))
    .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ServerError> {
  let app = create_app(state);

  let listener = TcpListener::bind(addr)
    .await
    .map_err(|source| ServerError::Bind { addr, source })?;
  info!("RFID 服务启动: http://{}", addr);
  info!("  GET / - 读取当前标签 UID");

  axum::serve(listener, app).await.map_err(ServerError::Serve)
}

/// 等待标签并以纯文本返回 UID
async fn get_rfid_code(State(state): State<AppState>) -> Result<Response, ServerError> {
  info!("等待 RFID 标签...");
  let reader = state.reader.clone();
  let timeout = state.poll_timeout;

  // 互斥锁使请求在同一读卡器上依次执行
  let uid = tokio::task::spawn_blocking(move || reader.lock().read_passive_target(timeout)).await??;

  match uid {
    Some(uid) => {
      let hex_uid = uid.to_hex();
      info!("读取到标签 UID: {}", hex_uid);
      Ok(hex_uid.into_response())
    }
    None => {
      info!("超时时间内未检测到 RFID 标签");
      Ok((StatusCode::REQUEST_TIMEOUT, NO_TAG_MESSAGE).into_response())
    }
  }
}
