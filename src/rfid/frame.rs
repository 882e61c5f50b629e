// 该文件是 XR-RFID 项目的一部分。
// src/rfid/frame.rs - PN532 帧编解码
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

//! PN532 普通信息帧：
//!
//! ```text
//! 00 00 FF LEN LCS TFI PD0 .. PDn DCS 00
//! ```
//!
//! `LEN` 覆盖 TFI 与数据，`LEN + LCS` 与 `sum(TFI..PDn) + DCS` 的低 8 位均为 0。

use super::RfidError;

pub const PREAMBLE: u8 = 0x00;
pub const START_CODE_1: u8 = 0x00;
pub const START_CODE_2: u8 = 0xFF;
pub const POSTAMBLE: u8 = 0x00;

/// 主机到芯片
pub const TFI_HOST_TO_PN532: u8 = 0xD4;
/// 芯片到主机
pub const TFI_PN532_TO_HOST: u8 = 0xD5;

pub const ACK: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

/// 帧头尾（前导、起始码、LEN、LCS、DCS、后导）所占字节数
pub const FRAME_OVERHEAD: usize = 7;

fn checksum(bytes: &[u8]) -> u8 {
  bytes
    .iter()
    .fold(0u8, |acc, b| acc.wrapping_add(*b))
    .wrapping_neg()
}

/// 编码一条主机命令帧
pub fn encode_command(command: u8, params: &[u8]) -> Vec<u8> {
  let mut data = Vec::with_capacity(params.len() + 2);
  data.push(TFI_HOST_TO_PN532);
  data.push(command);
  data.extend_from_slice(params);

  let len = data.len() as u8;
  let mut frame = Vec::with_capacity(data.len() + FRAME_OVERHEAD);
  frame.extend_from_slice(&[PREAMBLE, START_CODE_1, START_CODE_2, len, len.wrapping_neg()]);
  frame.extend_from_slice(&data);
  frame.push(checksum(&data));
  frame.push(POSTAMBLE);
  frame
}

/// 解码芯片返回的帧，返回包含 TFI 的数据部分
pub fn decode_response(raw: &[u8]) -> Result<Vec<u8>, RfidError> {
  let offset = raw
    .iter()
    .position(|b| *b != PREAMBLE)
    .ok_or_else(|| RfidError::InvalidFrame("响应全部为前导字节".to_string()))?;

  if raw[offset] != START_CODE_2 {
    return Err(RfidError::InvalidFrame(format!(
      "起始码错误: 0x{:02x}",
      raw[offset]
    )));
  }

  let header = raw
    .get(offset + 1..offset + 3)
    .ok_or_else(|| RfidError::InvalidFrame("帧长度不足".to_string()))?;
  let (len, lcs) = (header[0], header[1]);
  if len.wrapping_add(lcs) != 0 {
    return Err(RfidError::Checksum("LCS"));
  }

  let start = offset + 3;
  let end = start + len as usize;
  let data = raw
    .get(start..end)
    .ok_or_else(|| RfidError::InvalidFrame(format!("数据长度不足: 期望 {}", len)))?;
  let dcs = *raw
    .get(end)
    .ok_or_else(|| RfidError::InvalidFrame("缺少 DCS".to_string()))?;
  if checksum(data) != dcs {
    return Err(RfidError::Checksum("DCS"));
  }

  Ok(data.to_vec())
}

/// 构造芯片侧的响应帧（测试与模拟读卡器使用）
pub fn encode_response(command: u8, payload: &[u8]) -> Vec<u8> {
  let mut frame = encode_command(command.wrapping_add(1), payload);
  frame[5] = TFI_PN532_TO_HOST;
  let dcs_index = frame.len() - 2;
  frame[dcs_index] = checksum(&frame[5..dcs_index]);
  frame
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn firmware_version_command_matches_datasheet() {
    assert_eq!(
      encode_command(0x02, &[]),
      vec![0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD4, 0x02, 0x2A, 0x00]
    );
  }

  #[test]
  fn response_roundtrip_through_decoder() {
    let frame = encode_response(0x02, &[0x32, 0x01, 0x06, 0x07]);
    let data = decode_response(&frame).unwrap();
    assert_eq!(data, vec![TFI_PN532_TO_HOST, 0x03, 0x32, 0x01, 0x06, 0x07]);
  }

  #[test]
  fn decoder_skips_extra_leading_zeros() {
    let mut raw = vec![0x00, 0x00, 0x00];
    raw.extend(encode_response(0x14, &[]));
    assert_eq!(
      decode_response(&raw).unwrap(),
      vec![TFI_PN532_TO_HOST, 0x15]
    );
  }

  #[test]
  fn decoder_rejects_bad_data_checksum() {
    let mut frame = encode_response(0x02, &[0x32, 0x01, 0x06, 0x07]);
    let dcs_index = frame.len() - 2;
    frame[dcs_index] ^= 0x01;
    assert!(matches!(
      decode_response(&frame),
      Err(RfidError::Checksum("DCS"))
    ));
  }

  #[test]
  fn decoder_rejects_bad_length_checksum() {
    let mut frame = encode_response(0x02, &[0x32]);
    frame[4] = 0x00;
    assert!(matches!(
      decode_response(&frame),
      Err(RfidError::Checksum("LCS"))
    ));
  }

  #[test]
  fn decoder_rejects_truncated_frame() {
    let frame = encode_response(0x02, &[0x32, 0x01, 0x06, 0x07]);
    assert!(matches!(
      decode_response(&frame[..7]),
      Err(RfidError::InvalidFrame(_))
    ));
  }
}
