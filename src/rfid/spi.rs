// 该文件是 XR-RFID 项目的一部分。
// src/rfid/spi.rs - Linux spidev 链路
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

//! PN532 的 SPI 接口为 LSB 先行，而树莓派的 SPI 控制器只支持 MSB 先行，
//! 因此所有字节在收发时按位反转。片选使用内核管理的 CE 引脚
//! （`/dev/spidev0.0` 对应 GPIO8）。

use std::{io::Write, thread, time::Duration};

use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use tracing::{debug, info};

use super::{Pn532Transport, RfidError};

const SPI_DATA_WRITE: u8 = 0x01;
const SPI_STATUS_READ: u8 = 0x02;
const SPI_DATA_READ: u8 = 0x03;
const SPI_READY: u8 = 0x01;

const DEFAULT_DEVICE: &str = "/dev/spidev0.0";
const DEFAULT_SPEED_HZ: u32 = 1_000_000;
const WAKEUP_DELAY: Duration = Duration::from_secs(1);

pub struct SpiTransportBuilder {
  device: String,
  speed_hz: u32,
}

impl Default for SpiTransportBuilder {
  fn default() -> Self {
    Self {
      device: DEFAULT_DEVICE.to_string(),
      speed_hz: DEFAULT_SPEED_HZ,
    }
  }
}

impl SpiTransportBuilder {
  pub fn device(mut self, device: impl Into<String>) -> Self {
    self.device = device.into();
    self
  }

  pub fn speed_hz(mut self, speed_hz: u32) -> Self {
    self.speed_hz = speed_hz;
    self
  }

  pub fn build(self) -> Result<SpiTransport, RfidError> {
    info!("打开 SPI 设备: {} @ {} Hz", self.device, self.speed_hz);
    let mut spi = Spidev::open(&self.device)?;
    let options = SpidevOptions::new()
      .bits_per_word(8)
      .max_speed_hz(self.speed_hz)
      .mode(SpiModeFlags::SPI_MODE_0)
      .build();
    spi.configure(&options)?;
    Ok(SpiTransport { spi })
  }
}

pub struct SpiTransport {
  spi: Spidev,
}

fn reversed(bytes: &[u8]) -> Vec<u8> {
  bytes.iter().map(|b| b.reverse_bits()).collect()
}

impl Pn532Transport for SpiTransport {
  fn wakeup(&mut self) -> Result<(), RfidError> {
    debug!("唤醒 PN532");
    thread::sleep(WAKEUP_DELAY);
    self.spi.write_all(&[0x00])?;
    Ok(())
  }

  fn write_frame(&mut self, frame: &[u8]) -> Result<(), RfidError> {
    let mut buf = Vec::with_capacity(frame.len() + 1);
    buf.push(SPI_DATA_WRITE);
    buf.extend_from_slice(frame);
    self.spi.write_all(&reversed(&buf))?;
    Ok(())
  }

  fn is_ready(&mut self) -> Result<bool, RfidError> {
    let tx = reversed(&[SPI_STATUS_READ, 0x00]);
    let mut rx = [0u8; 2];
    self
      .spi
      .transfer(&mut SpidevTransfer::read_write(&tx, &mut rx))?;
    Ok(rx[1].reverse_bits() == SPI_READY)
  }

  fn read(&mut self, buf: &mut [u8]) -> Result<(), RfidError> {
    let mut tx = vec![0u8; buf.len() + 1];
    tx[0] = SPI_DATA_READ.reverse_bits();
    let mut rx = vec![0u8; tx.len()];
    self
      .spi
      .transfer(&mut SpidevTransfer::read_write(&tx, &mut rx))?;
    for (dst, src) in buf.iter_mut().zip(&rx[1..]) {
      *dst = src.reverse_bits();
    }
    Ok(())
  }
}
