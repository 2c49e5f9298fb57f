// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/task.rs - 任务定义
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

use std::sync::{Arc, atomic::AtomicBool};

use serde::Serialize;
use tracing::info;

use crate::{
  config::SearchConfig,
  frame::Frame,
  grounding::{Answerer, Grounder},
  heuristic::Heuristic,
  input::FrameSource,
  output::Render,
  search::{IterationRecord, SearchOutcome, Searcher, Termination},
  select::SelectedFrame,
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 对一段视频执行一次关键帧搜索
pub struct SearchTask {
  searcher: Searcher,
}

impl SearchTask {
  pub fn new(searcher: Searcher) -> Self {
    Self { searcher }
  }
}

impl<S, H, O> Task<S, H, O> for SearchTask
where
  S: FrameSource,
  H: Heuristic,
  O: Render<[Frame], IterationRecord>,
  O::Error: std::fmt::Display,
{
  type Output = (Searcher, SearchOutcome);
  type Error = anyhow::Error;

  fn run_task(self, input: S, model: H, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始搜索任务...");
    let now = std::time::Instant::now();
    let outcome = self.searcher.search(&input, &model, &output)?;
    info!("搜索完成，耗时: {:.2?}", now.elapsed());
    Ok((self.searcher, outcome))
  }
}

/// 问答任务的结果
#[derive(Debug, Clone, Serialize)]
pub struct QaReport {
  pub question: String,
  pub options: String,
  pub targets: Vec<String>,
  pub cues: Vec<String>,
  pub selected: Vec<SelectedFrame>,
  pub termination: Termination,
  pub visited_count: usize,
  pub iterations: usize,
  pub answer: String,
}

/// 定位目标 → 搜索关键帧 → 回答问题
pub struct QaTask<G, A> {
  grounder: G,
  answerer: A,
  question: String,
  options: String,
  config: SearchConfig,
  abort: Option<Arc<AtomicBool>>,
}

impl<G, A> QaTask<G, A> {
  pub fn new(grounder: G, answerer: A, question: String, options: String) -> Self {
    Self {
      grounder,
      answerer,
      question,
      options,
      config: SearchConfig::default(),
      abort: None,
    }
  }

  pub fn with_config(mut self, config: SearchConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_abort(mut self, abort: Arc<AtomicBool>) -> Self {
    self.abort = Some(abort);
    self
  }
}

impl<G, A, S, H, O> Task<S, H, O> for QaTask<G, A>
where
  G: Grounder,
  G::Error: std::error::Error + Send + Sync + 'static,
  A: Answerer,
  A::Error: std::error::Error + Send + Sync + 'static,
  S: FrameSource,
  H: Heuristic,
  O: Render<[Frame], IterationRecord>,
  O::Error: std::fmt::Display,
{
  type Output = QaReport;
  type Error = anyhow::Error;

  fn run_task(self, input: S, model: H, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始问答任务: {}", self.question);
    let grounding = self.grounder.ground(&input, &self.question)?;
    if grounding.targets.is_empty() {
      anyhow::bail!("问题中没有可搜索的目标物体");
    }
    info!("目标物体: {:?}, 线索物体: {:?}", grounding.targets, grounding.cues);

    let mut searcher = Searcher::new(grounding.targets, grounding.cues, self.config);
    if let Some(abort) = self.abort {
      searcher = searcher.with_abort(abort);
    }

    let now = std::time::Instant::now();
    let outcome = searcher.search(&input, &model, &output)?;
    info!("搜索完成，耗时: {:.2?}", now.elapsed());

    let answer = self
      .answerer
      .answer(&outcome.frames, &self.question, &self.options)?;
    info!("回答: {}", answer);

    Ok(QaReport {
      question: self.question,
      options: self.options,
      targets: searcher.targets().to_vec(),
      cues: searcher.cues().to_vec(),
      selected: outcome.selected,
      termination: outcome.termination,
      visited_count: outcome.visited_count,
      iterations: outcome.iterations,
      answer,
    })
  }
}
