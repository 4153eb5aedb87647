// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/simple_oneshot.rs - 单帧检测解码
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_yolov5::{
  FromUrl,
  catalog::ClassCatalog,
  decoder::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_HEIGHT, DEFAULT_INPUT_WIDTH,
    DEFAULT_NMS_IOU_THRESHOLD, DEFAULT_SCORE_THRESHOLD, DecodeConfig, DetectionDecoder,
  },
  input::InputWrapper,
  model::ModelWrapper,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

/// Shanan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型（例如 tensor:///path/out.bin?shape=1,25200,85）
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源（例如 image:///path/sample.jpg）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径（image:///path/out.png?font=... / json:///path/out.json / log:）
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 按行分隔的类别文件，缺省使用内置 COCO 类别
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,
  /// objectness 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,
  /// 类别分数阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_SCORE_THRESHOLD, value_name = "THRESHOLD")]
  pub score: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_NMS_IOU_THRESHOLD, value_name = "THRESHOLD")]
  pub nms_threshold: f32,
  /// 模型输入宽度
  #[arg(long, default_value_t = DEFAULT_INPUT_WIDTH, value_name = "PIXELS")]
  pub input_width: f32,
  /// 模型输入高度
  #[arg(long, default_value_t = DEFAULT_INPUT_HEIGHT, value_name = "PIXELS")]
  pub input_height: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let catalog = match &args.labels {
    Some(path) => ClassCatalog::load(path)?,
    None => ClassCatalog::coco(),
  };

  let config = DecodeConfig::default()
    .with_input_size(args.input_width, args.input_height)
    .with_confidence_threshold(args.confidence)
    .with_score_threshold(args.score)
    .with_nms_iou_threshold(args.nms_threshold);
  info!("解码参数: {:?}", config);

  let decoder = DetectionDecoder::new(catalog, config)?;
  let input = InputWrapper::from_url(&args.input)?;
  let model = ModelWrapper::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let result = OneShotTask::new(decoder).run_task(input, model, output)?;
  info!("任务完成，共 {} 个检测结果", result.len());

  Ok(())
}
