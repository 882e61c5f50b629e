// 该文件是 XR-RFID 项目的一部分。
// src/task.rs - 推理任务循环
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
  io::Read,
  sync::mpsc::{self, Receiver, Sender},
  thread,
  time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{model::Model, output::Render};

/// 标准输入上的退出键
pub const QUIT_KEY: u8 = b'q';

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    drop(input);
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  quit: Option<Receiver<()>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 收到消息后在当前帧处理完时退出循环
  pub fn with_quit(mut self, quit: Receiver<()>) -> Self {
    self.quit = Some(quit);
    self
  }

  fn quit_requested(&self) -> bool {
    matches!(self.quit.as_ref().map(|rx| rx.try_recv()), Some(Ok(())))
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  // input 按值传入，任何路径返回前都会被释放
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");

    let mut frame_index = 0usize;
    let mut now = Instant::now();
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if self.quit_requested() {
        warn!("收到退出请求，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

/// 注册 Ctrl-C 处理并监听标准输入上的退出键
pub fn quit_channel() -> anyhow::Result<Receiver<()>> {
  let (tx, rx) = mpsc::channel();

  let ctrlc_tx = tx.clone();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = ctrlc_tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  thread::spawn(move || watch_quit_key(std::io::stdin().lock(), QUIT_KEY, tx));
  info!("按 'q' 回车或 Ctrl-C 退出");

  Ok(rx)
}

/// 读到 `key` 时发送退出消息；输入结束或出错时直接返回
pub fn watch_quit_key(reader: impl Read, key: u8, tx: Sender<()>) {
  for byte in reader.bytes() {
    match byte {
      Ok(b) if b == key => {
        let _ = tx.send(());
        return;
      }
      Ok(_) => {}
      Err(_) => return,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    cell::RefCell,
    convert::Infallible,
    io::Cursor,
    sync::{
      Arc,
      atomic::{AtomicBool, AtomicUsize, Ordering},
    },
  };

  use super::*;

  /// 记录被拉取的帧数并在释放时置位
  struct Source {
    remaining: usize,
    pulled: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
  }

  impl Iterator for Source {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
      if self.remaining == 0 {
        return None;
      }
      self.remaining -= 1;
      Some(self.pulled.fetch_add(1, Ordering::SeqCst))
    }
  }

  impl Drop for Source {
    fn drop(&mut self) {
      self.released.store(true, Ordering::SeqCst);
    }
  }

  fn source(frames: usize) -> (Source, Arc<AtomicUsize>, Arc<AtomicBool>) {
    let pulled = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicBool::new(false));
    let source = Source {
      remaining: frames,
      pulled: pulled.clone(),
      released: released.clone(),
    };
    (source, pulled, released)
  }

  struct Double;

  impl Model for Double {
    type Input = usize;
    type Output = usize;
    type Error = Infallible;

    fn infer(&self, input: &usize) -> Result<usize, Infallible> {
      Ok(input * 2)
    }
  }

  #[derive(Default)]
  struct Collect(RefCell<Vec<usize>>);

  impl Render<usize, usize> for &Collect {
    type Error = Infallible;

    fn render_result(&self, _: &usize, result: &usize) -> Result<(), Infallible> {
      self.0.borrow_mut().push(*result);
      Ok(())
    }
  }

  #[test]
  fn one_shot_uses_first_frame_only() {
    let (input, pulled, released) = source(3);
    let rendered = Collect::default();
    OneShotTask.run_task(input, Double, &rendered).unwrap();
    assert_eq!(*rendered.0.borrow(), vec![0]);
    assert_eq!(pulled.load(Ordering::SeqCst), 1);
    assert!(released.load(Ordering::SeqCst));
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let (input, _, released) = source(0);
    let rendered = Collect::default();
    assert!(OneShotTask.run_task(input, Double, &rendered).is_err());
    assert!(released.load(Ordering::SeqCst));
  }

  #[test]
  fn continuous_runs_until_input_is_exhausted() {
    let (input, _, released) = source(3);
    let rendered = Collect::default();
    ContinuousTask::default()
      .run_task(input, Double, &rendered)
      .unwrap();
    assert_eq!(*rendered.0.borrow(), vec![0, 2, 4]);
    assert!(released.load(Ordering::SeqCst));
  }

  #[test]
  fn continuous_stops_on_quit() {
    let (input, pulled, released) = source(100);
    let (tx, rx) = mpsc::channel();
    tx.send(()).unwrap();
    let rendered = Collect::default();
    ContinuousTask::default()
      .with_quit(rx)
      .run_task(input, Double, &rendered)
      .unwrap();
    assert_eq!(rendered.0.borrow().len(), 1);
    assert_eq!(pulled.load(Ordering::SeqCst), 1);
    assert!(released.load(Ordering::SeqCst));
  }

  #[test]
  fn closed_quit_channel_does_not_stop() {
    let (input, _, _) = source(4);
    let (tx, rx) = mpsc::channel::<()>();
    drop(tx);
    let rendered = Collect::default();
    ContinuousTask::default()
      .with_quit(rx)
      .run_task(input, Double, &rendered)
      .unwrap();
    assert_eq!(rendered.0.borrow().len(), 4);
  }

  #[test]
  fn continuous_respects_frame_limit() {
    let (input, pulled, released) = source(10);
    let rendered = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(input, Double, &rendered)
      .unwrap();
    assert_eq!(*rendered.0.borrow(), vec![0, 2]);
    assert_eq!(pulled.load(Ordering::SeqCst), 2);
    assert!(released.load(Ordering::SeqCst));
  }

  #[test]
  fn quit_key_is_detected() {
    let (tx, rx) = mpsc::channel();
    watch_quit_key(Cursor::new(b"ab\nq\n".to_vec()), QUIT_KEY, tx);
    assert!(rx.try_recv().is_ok());

    let (tx, rx) = mpsc::channel();
    watch_quit_key(Cursor::new(b"hello\n".to_vec()), QUIT_KEY, tx);
    assert!(rx.try_recv().is_err());
  }
}
