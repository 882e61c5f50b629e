// 该文件是 XR-RFID 项目的一部分。
// tests/rfid_server.rs - RFID 查询接口测试
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
  collections::VecDeque,
  sync::{Arc, Mutex},
  time::Duration,
};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use xr_rfid::{
  rfid::{RfidError, TagReader, TagUid},
  server::{AppState, NO_TAG_MESSAGE, create_app},
};

enum Poll {
  Tag(Vec<u8>),
  Nothing,
  Fail,
}

/// 依次返回预设结果，并记录每次收到的超时
#[derive(Clone)]
struct FakeReader {
  polls: Arc<Mutex<VecDeque<Poll>>>,
  timeouts: Arc<Mutex<Vec<Duration>>>,
}

impl FakeReader {
  fn new(polls: Vec<Poll>) -> Self {
    Self {
      polls: Arc::new(Mutex::new(polls.into())),
      timeouts: Arc::new(Mutex::new(Vec::new())),
    }
  }
}

impl TagReader for FakeReader {
  fn read_passive_target(&mut self, timeout: Duration) -> Result<Option<TagUid>, RfidError> {
    self.timeouts.lock().unwrap().push(timeout);
    match self.polls.lock().unwrap().pop_front() {
      Some(Poll::Tag(bytes)) => Ok(Some(TagUid::new(bytes))),
      Some(Poll::Nothing) | None => Ok(None),
      Some(Poll::Fail) => Err(RfidError::NotReady(timeout)),
    }
  }
}

async fn get_root(app: axum::Router) -> (StatusCode, Option<String>, String) {
  let response = app
    .oneshot(Request::get("/").body(Body::empty()).unwrap())
    .await
    .unwrap();
  let status = response.status();
  let content_type = response
    .headers()
    .get(header::CONTENT_TYPE)
    .map(|v| v.to_str().unwrap().to_string());
  let body = response.into_body().collect().await.unwrap().to_bytes();
  (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn returns_uid_as_lowercase_hex() {
  let reader = FakeReader::new(vec![Poll::Tag(vec![0x04, 0xA3, 0xFF])]);
  let app = create_app(AppState::new(reader, Duration::from_millis(100)));

  let (status, content_type, body) = get_root(app).await;
  assert_eq!(status, StatusCode::OK);
  assert!(content_type.unwrap().starts_with("text/plain"));
  assert_eq!(body, "04a3ff");
}

#[tokio::test]
async fn timeout_is_408_with_fixed_message() {
  let reader = FakeReader::new(vec![Poll::Nothing]);
  let app = create_app(AppState::new(reader, Duration::from_millis(100)));

  let (status, content_type, body) = get_root(app).await;
  assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
  assert!(content_type.unwrap().starts_with("text/plain"));
  assert_eq!(body, NO_TAG_MESSAGE);
  assert_eq!(body, "No RFID tag found within the timeout");
}

#[tokio::test]
async fn timeout_does_not_depend_on_previous_requests() {
  let reader = FakeReader::new(vec![
    Poll::Tag(vec![0xDE, 0xAD]),
    Poll::Nothing,
    Poll::Tag(vec![0x01]),
    Poll::Nothing,
  ]);
  let app = create_app(AppState::new(reader.clone(), Duration::from_millis(100)));

  let mut results = Vec::new();
  for _ in 0..4 {
    let (status, _, body) = get_root(app.clone()).await;
    results.push((status, body));
  }

  assert_eq!(
    results,
    vec![
      (StatusCode::OK, "dead".to_string()),
      (StatusCode::REQUEST_TIMEOUT, NO_TAG_MESSAGE.to_string()),
      (StatusCode::OK, "01".to_string()),
      (StatusCode::REQUEST_TIMEOUT, NO_TAG_MESSAGE.to_string()),
    ]
  );
}

#[tokio::test]
async fn every_request_polls_with_configured_timeout() {
  let reader = FakeReader::new(vec![Poll::Nothing, Poll::Nothing]);
  let app = create_app(AppState::new(reader.clone(), Duration::from_millis(100)));

  get_root(app.clone()).await;
  get_root(app).await;

  assert_eq!(
    *reader.timeouts.lock().unwrap(),
    vec![Duration::from_millis(100); 2]
  );
}

#[tokio::test]
async fn reader_failure_is_server_error() {
  let reader = FakeReader::new(vec![Poll::Fail]);
  let app = create_app(AppState::new(reader, Duration::from_millis(100)));

  let (status, _, _) = get_root(app).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn only_root_is_routed() {
  let reader = FakeReader::new(vec![]);
  let app = create_app(AppState::new(reader, Duration::from_millis(100)));

  let response = app
    .oneshot(Request::get("/tags").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::NOT_FOUND);

  let reader = FakeReader::new(vec![]);
  let app = create_app(AppState::new(reader, Duration::from_millis(100)));
  let response = app
    .oneshot(Request::post("/").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
