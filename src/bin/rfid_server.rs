// 该文件是 XR-RFID 项目的一部分。
// src/bin/rfid_server.rs - RFID 标签查询服务
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
  net::{IpAddr, SocketAddr},
  time::Duration,
};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use xr_rfid::{
  rfid::{Pn532, SpiTransportBuilder},
  server::{self, AppState, DEFAULT_POLL_TIMEOUT},
};

/// 通过 HTTP 返回 PN532 读到的标签 UID
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, default_value = "0.0.0.0")]
  pub host: IpAddr,
  /// 监听端口
  #[arg(long, default_value_t = 5000)]
  pub port: u16,
  /// SPI 设备
  #[arg(long, default_value = "/dev/spidev0.0")]
  pub device: String,
  /// SPI 时钟频率
  #[arg(long, default_value_t = 1_000_000)]
  pub speed_hz: u32,
  /// 每次请求等待标签的时间（毫秒）
  #[arg(long, default_value_t = DEFAULT_POLL_TIMEOUT.as_millis() as u64)]
  pub timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let transport = SpiTransportBuilder::default()
    .device(args.device.as_str())
    .speed_hz(args.speed_hz)
    .build()?;
  let mut pn532 = Pn532::new(transport)?;

  let firmware = match pn532.firmware_version() {
    Ok(firmware) => firmware,
    Err(e) => {
      error!("未找到 PN53x 读卡器: {}", e);
      return Err(e.into());
    }
  };
  info!(
    "找到 PN5{:02x} 读卡器，固件版本 {}.{}",
    firmware.ic, firmware.version, firmware.revision
  );
  pn532.sam_configuration()?;

  let state = AppState::new(pn532, Duration::from_millis(args.timeout_ms));
  server::serve(SocketAddr::new(args.host, args.port), state).await?;

  Ok(())
}
