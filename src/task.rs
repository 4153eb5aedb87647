// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 推理任务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use tracing::info;

use crate::{
  decoder::DetectionDecoder,
  frame::InferenceFrame,
  model::{DetectResult, ModelRunner},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<DetectResult, Self::Error>;
}

/// 读取一帧，推理一次，解码并渲染
pub struct OneShotTask {
  decoder: DetectionDecoder,
}

impl OneShotTask {
  pub fn new(decoder: DetectionDecoder) -> Self {
    Self { decoder }
  }
}

impl<
  F: InferenceFrame,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: ModelRunner<Error = ME>,
  O: Render<F, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<DetectResult, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    let frame_size = frame.frame_size();
    info!(
      "输入帧获取成功 ({}x{})，开始推理...",
      frame_size.width, frame_size.height
    );

    let config = self.decoder.config();
    let blob = frame.to_blob(config.input_width as u32, config.input_height as u32);

    let now = std::time::Instant::now();
    let tensor = model.forward(&blob)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);

    let result = self
      .decoder
      .decode_output(&tensor, frame_size)?
      .with_inference_time(elapsed);
    info!("检测到 {} 个对象", result.len());

    output.render_result(&frame, &result)?;
    info!("渲染完成");

    Ok(result)
  }
}
