// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/bin/search.rs - 关键帧搜索命令行
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use xunzhen::{
  Budget, FromUrl, SearchConfig, Searcher, Termination,
  heuristic::RecordedHeuristic,
  input::ImageFolderInput,
  output::DirectoryRecordOutput,
  select::SelectedFrame,
  task::{SearchTask, Task},
};

/// Xunzhen 关键帧搜索
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 帧来源，例如 folder:///data/frames?fps=1
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 检测启发式，例如 recorded:///data/detections.json
  #[arg(long, value_name = "HEURISTIC")]
  pub heuristic: Url,
  /// 诊断输出目录，例如 record:///tmp/xunzhen
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,
  /// 目标物体（可重复）
  #[arg(long = "target", value_name = "OBJECT", required = true)]
  pub targets: Vec<String>,
  /// 线索物体（可重复）
  #[arg(long = "cue", value_name = "OBJECT")]
  pub cues: Vec<String>,
  /// 返回的帧数 K
  #[arg(long, default_value = "8", value_name = "K")]
  pub search_nframes: usize,
  /// 网格行数
  #[arg(long, default_value = "4", value_name = "ROWS")]
  pub grid_rows: usize,
  /// 网格列数
  #[arg(long, default_value = "4", value_name = "COLS")]
  pub grid_cols: usize,
  /// 提前停止的置信度阈值 (0.0 - 1.0)，不设置则不提前停止
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence_threshold: Option<f64>,
  /// 帧预算：整数为绝对帧数，小数为总帧数的比例
  #[arg(long, default_value = "0.5", value_name = "BUDGET")]
  pub search_budget: Budget,
  /// 样条平滑系数
  #[arg(long, default_value = "0.001", value_name = "LAMBDA")]
  pub smoothing: f64,
  /// 检测器暂时失败时的重试次数
  #[arg(long, default_value = "3", value_name = "COUNT")]
  pub max_retries: usize,
  /// 随机种子
  #[arg(long, default_value_t = xunzhen::config::DEFAULT_SEED, value_name = "SEED")]
  pub seed: u64,
}

impl Args {
  fn config(&self) -> SearchConfig {
    SearchConfig::default()
      .with_search_nframes(self.search_nframes)
      .with_image_grid_shape(self.grid_rows, self.grid_cols)
      .with_confidence_threshold(self.confidence_threshold)
      .with_search_budget(self.search_budget)
      .with_smoothing(self.smoothing)
      .with_max_retries(self.max_retries)
      .with_seed(self.seed)
  }
}

#[derive(Serialize)]
struct Selection<'a> {
  selected: &'a [SelectedFrame],
  termination: Termination,
  visited_count: usize,
  iterations: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("帧来源: {}", args.input);
  info!("检测启发式: {}", args.heuristic);
  if let Some(output) = &args.output {
    info!("诊断输出: {}", output);
  }

  let input = ImageFolderInput::from_url(&args.input)?;
  let heuristic = RecordedHeuristic::from_url(&args.heuristic)?;
  let output = match &args.output {
    Some(url) => Some(DirectoryRecordOutput::from_url(url)?.with_targets(args.targets.clone())),
    None => None,
  };

  let abort = Arc::new(AtomicBool::new(false));
  {
    let abort = abort.clone();
    ctrlc::set_handler(move || {
      warn!("收到中断信号，本轮结束后停止搜索...");
      abort.store(true, Ordering::Relaxed);
    })?;
  }

  let searcher = Searcher::new(args.targets.clone(), args.cues.clone(), args.config()).with_abort(abort);
  let (searcher, outcome) = SearchTask::new(searcher).run_task(&input, &heuristic, &output)?;

  if let Some(output) = &output {
    output.save_frames(&outcome.frames)?;
    let path = output.save_summary(&searcher, &outcome)?;
    info!("搜索概要已保存: {}", path.display());
  }

  let selection = Selection {
    selected: &outcome.selected,
    termination: outcome.termination,
    visited_count: outcome.visited_count,
    iterations: outcome.iterations,
  };
  println!("{}", serde_json::to_string_pretty(&selection)?);

  Ok(())
}
