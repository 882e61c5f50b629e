// 该文件是 XR-RFID 项目的一部分。
// src/rfid.rs - PN532 RFID 读卡器
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
  fmt,
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, info};

pub mod frame;

pub mod client;
pub use self::client::{
  ClientError, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SERVER_URL, RfidClient, TagSource,
};

mod tag_map;
pub use self::tag_map::{TagEntry, TagFilter, TagMap, TagMapError};

#[cfg(feature = "rfid_spi")]
mod spi;
#[cfg(feature = "rfid_spi")]
pub use self::spi::{SpiTransport, SpiTransportBuilder};

const COMMAND_GET_FIRMWARE_VERSION: u8 = 0x02;
const COMMAND_SAM_CONFIGURATION: u8 = 0x14;
const COMMAND_IN_LIST_PASSIVE_TARGET: u8 = 0x4A;

/// 106 kbps ISO/IEC 14443 Type A
const CARD_BAUD_106K_TYPE_A: u8 = 0x00;
const MAX_UID_LEN: usize = 7;

/// 等待 ACK 的最长时间
const ACK_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum RfidError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("PN532 未在 {0:?} 内就绪")]
  NotReady(Duration),
  #[error("PN532 ACK 无效: {0:02x?}")]
  InvalidAck(Vec<u8>),
  #[error("PN532 帧无效: {0}")]
  InvalidFrame(String),
  #[error("PN532 帧校验和错误: {0}")]
  Checksum(&'static str),
  #[error("PN532 响应与命令 0x{command:02x} 不匹配: {response:02x?}")]
  UnexpectedResponse { command: u8, response: Vec<u8> },
  #[error("检测到多张卡片: {0}")]
  TooManyTargets(u8),
  #[error("卡片 UID 过长: {0} 字节")]
  UidTooLong(usize),
}

/// 被动标签的 UID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUid(Vec<u8>);

impl TagUid {
  pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
    Self(bytes.into())
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// 小写十六进制，每字节两位
  pub fn to_hex(&self) -> String {
    self.to_string()
  }
}

impl fmt::Display for TagUid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for byte in &self.0 {
      write!(f, "{:02x}", byte)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
  pub ic: u8,
  pub version: u8,
  pub revision: u8,
  pub support: u8,
}

/// PN532 物理链路
///
/// `write_frame` 与 `read` 处理完整的 PN532 帧字节，链路相关的前缀、位序由实现负责。
pub trait Pn532Transport {
  fn wakeup(&mut self) -> Result<(), RfidError>;
  fn write_frame(&mut self, frame: &[u8]) -> Result<(), RfidError>;
  fn is_ready(&mut self) -> Result<bool, RfidError>;
  fn read(&mut self, buf: &mut [u8]) -> Result<(), RfidError>;
}

/// 可轮询被动标签的读卡器
pub trait TagReader: Send {
  /// 在 `timeout` 内等待一张标签；超时返回 `Ok(None)`
  fn read_passive_target(&mut self, timeout: Duration) -> Result<Option<TagUid>, RfidError>;
}

pub struct Pn532<T> {
  transport: T,
  poll_interval: Duration,
}

impl<T: Pn532Transport> Pn532<T> {
  /// 唤醒芯片并返回驱动
  pub fn new(mut transport: T) -> Result<Self, RfidError> {
    transport.wakeup()?;
    Ok(Self {
      transport,
      poll_interval: DEFAULT_POLL_INTERVAL,
    })
  }

  pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self
  }

  pub fn into_inner(self) -> T {
    self.transport
  }

  fn wait_ready(&mut self, timeout: Duration) -> Result<bool, RfidError> {
    let start = Instant::now();
    loop {
      if self.transport.is_ready()? {
        return Ok(true);
      }
      if start.elapsed() >= timeout {
        return Ok(false);
      }
      std::thread::sleep(self.poll_interval);
    }
  }

  /// 发送命令并确认 ACK
  fn send_command(&mut self, command: u8, params: &[u8]) -> Result<(), RfidError> {
    let frame = frame::encode_command(command, params);
    debug!("PN532 发送命令 0x{:02x}: {:02x?}", command, frame);
    self.transport.write_frame(&frame)?;

    if !self.wait_ready(ACK_TIMEOUT)? {
      return Err(RfidError::NotReady(ACK_TIMEOUT));
    }

    let mut ack = [0u8; frame::ACK.len()];
    self.transport.read(&mut ack)?;
    if ack != frame::ACK {
      return Err(RfidError::InvalidAck(ack.to_vec()));
    }
    Ok(())
  }

  /// 等待并读取响应，超时返回 `Ok(None)`
  fn read_response(
    &mut self,
    command: u8,
    response_len: usize,
    timeout: Duration,
  ) -> Result<Option<Vec<u8>>, RfidError> {
    if !self.wait_ready(timeout)? {
      return Ok(None);
    }

    // TFI 与响应命令码占两字节
    let mut raw = vec![0u8; response_len + 2 + frame::FRAME_OVERHEAD];
    self.transport.read(&mut raw)?;
    let data = frame::decode_response(&raw)?;

    if data.len() < 2
      || data[0] != frame::TFI_PN532_TO_HOST
      || data[1] != command.wrapping_add(1)
    {
      return Err(RfidError::UnexpectedResponse {
        command,
        response: data,
      });
    }
    Ok(Some(data[2..].to_vec()))
  }

  fn call(
    &mut self,
    command: u8,
    params: &[u8],
    response_len: usize,
    timeout: Duration,
  ) -> Result<Vec<u8>, RfidError> {
    self.send_command(command, params)?;
    self
      .read_response(command, response_len, timeout)?
      .ok_or(RfidError::NotReady(timeout))
  }

  pub fn firmware_version(&mut self) -> Result<FirmwareVersion, RfidError> {
    let response = self.call(COMMAND_GET_FIRMWARE_VERSION, &[], 4, ACK_TIMEOUT)?;
    match response.as_slice() {
      [ic, version, revision, support, ..] => Ok(FirmwareVersion {
        ic: *ic,
        version: *version,
        revision: *revision,
        support: *support,
      }),
      _ => Err(RfidError::UnexpectedResponse {
        command: COMMAND_GET_FIRMWARE_VERSION,
        response,
      }),
    }
  }

  /// 普通模式，虚拟卡超时 1 秒，启用 IRQ
  pub fn sam_configuration(&mut self) -> Result<(), RfidError> {
    self.call(COMMAND_SAM_CONFIGURATION, &[0x01, 0x14, 0x01], 0, ACK_TIMEOUT)?;
    info!("PN532 SAM 配置完成");
    Ok(())
  }
}

impl<T: Pn532Transport + Send> TagReader for Pn532<T> {
  fn read_passive_target(&mut self, timeout: Duration) -> Result<Option<TagUid>, RfidError> {
    self.send_command(COMMAND_IN_LIST_PASSIVE_TARGET, &[0x01, CARD_BAUD_106K_TYPE_A])?;

    let Some(response) = self.read_response(COMMAND_IN_LIST_PASSIVE_TARGET, 30, timeout)? else {
      // 发送 ACK 取消挂起的 InListPassiveTarget，迟到的标签不会留下响应
      debug!("PN532 等待标签超时，取消命令");
      self.transport.write_frame(&frame::ACK)?;
      return Ok(None);
    };

    // NbTg, Tg, SENS_RES(2), SEL_RES, NFCIDLength, NFCID...
    let targets = response.first().copied().unwrap_or(0);
    match targets {
      0 => return Ok(None),
      1 => {}
      n => return Err(RfidError::TooManyTargets(n)),
    }

    let uid_len = *response
      .get(5)
      .ok_or_else(|| RfidError::InvalidFrame("缺少 NFCID 长度".to_string()))?
      as usize;
    if uid_len > MAX_UID_LEN {
      return Err(RfidError::UidTooLong(uid_len));
    }
    let uid = response
      .get(6..6 + uid_len)
      .ok_or_else(|| RfidError::InvalidFrame("NFCID 数据不足".to_string()))?;

    Ok(Some(TagUid::new(uid)))
  }
}

#[cfg(test)]
mod tests {
  use std::collections::VecDeque;

  use super::*;

  /// 按脚本回放芯片响应的链路
  #[derive(Default)]
  struct ScriptedTransport {
    written: Vec<Vec<u8>>,
    pending: VecDeque<Vec<u8>>,
    woken: bool,
  }

  impl ScriptedTransport {
    fn ack_then(mut self, command: u8, payload: Option<&[u8]>) -> Self {
      self.pending.push_back(frame::ACK.to_vec());
      if let Some(payload) = payload {
        self.pending.push_back(frame::encode_response(command, payload));
      }
      self
    }
  }

  impl Pn532Transport for ScriptedTransport {
    fn wakeup(&mut self) -> Result<(), RfidError> {
      self.woken = true;
      Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), RfidError> {
      self.written.push(frame.to_vec());
      Ok(())
    }

    fn is_ready(&mut self) -> Result<bool, RfidError> {
      Ok(!self.pending.is_empty())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), RfidError> {
      let next = self.pending.pop_front().unwrap_or_default();
      buf.fill(0);
      let n = next.len().min(buf.len());
      buf[..n].copy_from_slice(&next[..n]);
      Ok(())
    }
  }

  fn driver(transport: ScriptedTransport) -> Pn532<ScriptedTransport> {
    Pn532::new(transport)
      .unwrap()
      .with_poll_interval(Duration::ZERO)
  }

  #[test]
  fn uid_renders_as_lowercase_padded_hex() {
    let uid = TagUid::new(vec![0x04, 0xA3, 0xFF]);
    assert_eq!(uid.to_hex(), "04a3ff");

    let uid = TagUid::new(vec![0x00, 0x0b, 0xC0, 0x01, 0x7e, 0x10, 0x9a]);
    let hex = uid.to_hex();
    assert_eq!(hex, "000bc0017e109a");
    assert_eq!(hex.len(), uid.as_bytes().len() * 2);
  }

  #[test]
  fn reads_firmware_version() {
    let transport = ScriptedTransport::default().ack_then(0x02, Some(&[0x32, 0x01, 0x06, 0x07]));
    let mut pn532 = driver(transport);
    let version = pn532.firmware_version().unwrap();
    assert_eq!(
      version,
      FirmwareVersion {
        ic: 0x32,
        version: 0x01,
        revision: 0x06,
        support: 0x07
      }
    );
    let transport = pn532.into_inner();
    assert!(transport.woken);
    assert_eq!(transport.written, vec![frame::encode_command(0x02, &[])]);
  }

  #[test]
  fn sam_configuration_sends_normal_mode() {
    let transport = ScriptedTransport::default().ack_then(0x14, Some(&[]));
    let mut pn532 = driver(transport);
    pn532.sam_configuration().unwrap();
    assert_eq!(
      pn532.into_inner().written,
      vec![frame::encode_command(0x14, &[0x01, 0x14, 0x01])]
    );
  }

  #[test]
  fn reads_passive_target_uid() {
    let payload = [0x01, 0x01, 0x00, 0x04, 0x08, 0x04, 0xDE, 0xAD, 0xBE, 0xEF];
    let transport = ScriptedTransport::default().ack_then(0x4A, Some(&payload));
    let mut pn532 = driver(transport);
    let uid = pn532
      .read_passive_target(Duration::from_millis(100))
      .unwrap()
      .unwrap();
    assert_eq!(uid.to_hex(), "deadbeef");
  }

  #[test]
  fn no_tag_within_timeout_is_none() {
    let transport = ScriptedTransport::default().ack_then(0x4A, None);
    let mut pn532 = driver(transport);
    let uid = pn532.read_passive_target(Duration::from_millis(5)).unwrap();
    assert!(uid.is_none());

    let written = pn532.into_inner().written;
    assert_eq!(written.len(), 2);
    assert_eq!(written[1], frame::ACK.to_vec());
  }

  #[test]
  fn next_poll_after_timeout_reads_fresh_frames() {
    let transport = ScriptedTransport::default().ack_then(0x4A, None);
    let mut pn532 = driver(transport);
    assert!(
      pn532
        .read_passive_target(Duration::from_millis(5))
        .unwrap()
        .is_none()
    );

    let payload = [0x01, 0x01, 0x00, 0x04, 0x08, 0x04, 0x01, 0x02, 0x03, 0x04];
    pn532.transport = pn532.transport.ack_then(0x4A, Some(&payload));
    let uid = pn532
      .read_passive_target(Duration::from_millis(100))
      .unwrap()
      .unwrap();
    assert_eq!(uid.to_hex(), "01020304");
  }

  #[test]
  fn rejects_more_than_one_target() {
    let payload = [0x02, 0x01, 0x00, 0x04, 0x08, 0x04, 0x01, 0x02, 0x03, 0x04];
    let transport = ScriptedTransport::default().ack_then(0x4A, Some(&payload));
    let mut pn532 = driver(transport);
    assert!(matches!(
      pn532.read_passive_target(Duration::from_millis(100)),
      Err(RfidError::TooManyTargets(2))
    ));
  }

  #[test]
  fn rejects_overlong_uid() {
    let payload = [0x01, 0x01, 0x00, 0x04, 0x08, 0x0A, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
    let transport = ScriptedTransport::default().ack_then(0x4A, Some(&payload));
    let mut pn532 = driver(transport);
    assert!(matches!(
      pn532.read_passive_target(Duration::from_millis(100)),
      Err(RfidError::UidTooLong(10))
    ));
  }

  #[test]
  fn missing_ack_is_an_error() {
    let mut transport = ScriptedTransport::default();
    transport.pending.push_back(vec![0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00]);
    let mut pn532 = driver(transport);
    assert!(matches!(
      pn532.firmware_version(),
      Err(RfidError::InvalidAck(_))
    ));
  }

  #[test]
  fn response_to_other_command_is_rejected() {
    let transport = ScriptedTransport::default().ack_then(0x14, Some(&[]));
    let mut pn532 = driver(transport);
    assert!(matches!(
      pn532.firmware_version(),
      Err(RfidError::UnexpectedResponse { command: 0x02, .. })
    ));
  }
}
