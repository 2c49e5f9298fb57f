// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/search.rs - 自适应关键帧搜索
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

//! 搜索主循环。
//!
//! 每一轮：外推置信度 → 加权采样一批未访问帧 → 读取帧 → 检测器打分 →
//! 写回置信度 → 通知观察者 → 检查终止条件。结束后再做一次外推，
//! 按最终置信度选出 K 帧并按时间排序返回。

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use image::RgbImage;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  belief::{BeliefError, BeliefStore},
  config::{ConfigError, ResolvedConfig, SearchConfig},
  frame::Frame,
  heuristic::{FrameScore, Heuristic, HeuristicError},
  input::FrameSource,
  output::Render,
  policy::select_batch,
  select::{SelectedFrame, select_frames},
};

#[derive(Error, Debug)]
pub enum SearchError {
  #[error("配置无效: {0}")]
  InvalidConfiguration(#[from] ConfigError),
  #[error("置信度更新失败: {0}")]
  InvalidIndex(#[from] BeliefError),
}

/// 搜索终止的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
  /// 已访问帧数达到预算
  BudgetExhausted,
  /// 前 K 个观测置信度均超过阈值
  ConfidenceReached,
  /// 所有帧都已访问
  AllFramesVisited,
  /// 收到外部中断信号
  Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchStatus {
  Running,
  Terminated(Termination),
}

/// 单轮搜索的只读快照，仅用于诊断
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
  /// 从 1 开始的轮次
  pub iteration: usize,
  /// 本轮访问的帧索引（升序）
  pub batch: Vec<usize>,
  /// 与 `batch` 一一对应的检测结果
  pub scores: Vec<FrameScore>,
  /// 本轮观测写入后、外推之前的置信度
  pub belief: Vec<f64>,
  pub visited: Vec<bool>,
  pub visited_count: usize,
  /// 本轮被吸收的检测器失败
  pub failure: Option<String>,
}

/// 搜索过程中唯一的可变状态，由主循环独占并逐轮传递
#[derive(Debug)]
struct SearchState {
  belief: BeliefStore,
  /// 搜索中读取失败的帧，最终选择时跳过
  unreadable: Vec<bool>,
  iteration: usize,
  status: SearchStatus,
  batches: Vec<Vec<usize>>,
}

impl SearchState {
  fn new(total_frame_num: usize, smoothing: f64) -> Self {
    Self {
      belief: BeliefStore::new(total_frame_num, smoothing),
      unreadable: vec![false; total_frame_num],
      iteration: 0,
      status: SearchStatus::Running,
      batches: Vec::new(),
    }
  }
}

/// 搜索结果
#[derive(Debug, Clone)]
pub struct SearchOutcome {
  /// 选中的帧，按时间升序
  pub frames: Vec<Frame>,
  /// 选中帧的索引、分数与时间戳，与 `frames` 顺序一致
  pub selected: Vec<SelectedFrame>,
  /// 最终外推后的置信度
  pub final_belief: Vec<f64>,
  pub visited_count: usize,
  pub iterations: usize,
  /// 每轮访问的帧索引
  pub batches: Vec<Vec<usize>>,
  pub termination: Termination,
}

impl SearchOutcome {
  pub fn timestamps(&self) -> Vec<f64> {
    self.selected.iter().map(|s| s.timestamp).collect()
  }

  pub fn indices(&self) -> Vec<usize> {
    self.selected.iter().map(|s| s.index).collect()
  }
}

/// 关键帧搜索器
pub struct Searcher {
  targets: Vec<String>,
  cues: Vec<String>,
  config: SearchConfig,
  abort: Option<Arc<AtomicBool>>,
}

impl Searcher {
  pub fn new(targets: Vec<String>, cues: Vec<String>, config: SearchConfig) -> Self {
    Self {
      targets,
      cues,
      config,
      abort: None,
    }
  }

  /// 设置中断标记，每轮开始前检查
  pub fn with_abort(mut self, abort: Arc<AtomicBool>) -> Self {
    self.abort = Some(abort);
    self
  }

  pub fn targets(&self) -> &[String] {
    &self.targets
  }

  pub fn cues(&self) -> &[String] {
    &self.cues
  }

  /// 使用配置中的随机种子执行搜索
  pub fn search<S, H, O>(
    &self,
    source: &S,
    heuristic: &H,
    observer: &O,
  ) -> Result<SearchOutcome, SearchError>
  where
    S: FrameSource + ?Sized,
    H: Heuristic + ?Sized,
    O: Render<[Frame], IterationRecord> + ?Sized,
    O::Error: std::fmt::Display,
  {
    let mut rng = StdRng::seed_from_u64(self.config.seed);
    self.search_with_rng(source, heuristic, observer, &mut rng)
  }

  /// 使用显式给定的随机源执行搜索
  pub fn search_with_rng<S, H, O, R>(
    &self,
    source: &S,
    heuristic: &H,
    observer: &O,
    rng: &mut R,
  ) -> Result<SearchOutcome, SearchError>
  where
    S: FrameSource + ?Sized,
    H: Heuristic + ?Sized,
    O: Render<[Frame], IterationRecord> + ?Sized,
    O::Error: std::fmt::Display,
    R: Rng + ?Sized,
  {
    let resolved = self.config.resolve(source.total_frame_num())?;
    info!(
      "开始搜索: 总帧数 {}, 预算 {}, 批大小 {}, K = {}",
      resolved.total_frame_num, resolved.budget, resolved.batch_size, resolved.search_nframes
    );
    info!("目标物体: {:?}, 线索物体: {:?}", self.targets, self.cues);

    let mut state = SearchState::new(resolved.total_frame_num, self.config.smoothing);
    while state.status == SearchStatus::Running {
      state = self.step(state, &resolved, source, heuristic, observer, rng)?;
    }

    let termination = match state.status {
      SearchStatus::Terminated(termination) => termination,
      SearchStatus::Running => Termination::BudgetExhausted,
    };
    info!(
      "搜索结束 ({:?}): 共 {} 轮, 访问 {} 帧",
      termination,
      state.iteration,
      state.belief.visited_count()
    );

    let final_belief = state.belief.extrapolate();
    let unreadable = &state.unreadable;
    let picked = select_frames(
      &final_belief,
      resolved.search_nframes,
      source.sample_interval(),
      |index| {
        if unreadable[index] {
          return None;
        }
        match source.read_frame(index) {
          Ok(image) => Some(image),
          Err(e) => {
            warn!("读取帧 {} 失败，改用下一候选帧: {}", index, e);
            None
          }
        }
      },
    );
    if picked.len() < resolved.search_nframes {
      warn!(
        "只有 {} 帧可读取，少于请求的 {} 帧",
        picked.len(),
        resolved.search_nframes
      );
    }

    let (selected, frames): (Vec<SelectedFrame>, Vec<Frame>) = picked
      .into_iter()
      .map(|(s, image)| {
        let frame = Frame {
          index: s.index,
          timestamp: s.timestamp,
          image,
        };
        (s, frame)
      })
      .unzip();

    info!(
      "选中帧的时间戳: {:?}",
      selected.iter().map(|s| s.timestamp).collect::<Vec<_>>()
    );

    Ok(SearchOutcome {
      frames,
      selected,
      final_belief,
      visited_count: state.belief.visited_count(),
      iterations: state.iteration,
      batches: state.batches,
      termination,
    })
  }

  fn aborted(&self) -> bool {
    self
      .abort
      .as_ref()
      .is_some_and(|abort| abort.load(Ordering::Relaxed))
  }

  /// 执行一轮搜索
  fn step<S, H, O, R>(
    &self,
    mut state: SearchState,
    resolved: &ResolvedConfig,
    source: &S,
    heuristic: &H,
    observer: &O,
    rng: &mut R,
  ) -> Result<SearchState, SearchError>
  where
    S: FrameSource + ?Sized,
    H: Heuristic + ?Sized,
    O: Render<[Frame], IterationRecord> + ?Sized,
    O::Error: std::fmt::Display,
    R: Rng + ?Sized,
  {
    if self.aborted() {
      warn!("收到中断信号，停止搜索");
      state.status = SearchStatus::Terminated(Termination::Aborted);
      return Ok(state);
    }

    let remaining = resolved.budget.saturating_sub(state.belief.visited_count());
    let belief = state.belief.extrapolate();
    let batch = select_batch(
      &belief,
      state.belief.visited_mask(),
      resolved.batch_size.min(remaining),
      rng,
    );
    if batch.is_empty() {
      state.status = SearchStatus::Terminated(Termination::AllFramesVisited);
      return Ok(state);
    }

    let iteration = state.iteration + 1;
    info!("第 {} 轮: 访问帧 {:?}", iteration, batch);

    let mut scores = vec![FrameScore::zero(); batch.len()];
    let mut frames = Vec::with_capacity(batch.len());
    let mut slots = Vec::with_capacity(batch.len());
    for (slot, &index) in batch.iter().enumerate() {
      match source.read_frame(index) {
        Ok(image) => {
          frames.push(Frame {
            index,
            timestamp: source.timestamp(index),
            image,
          });
          slots.push(slot);
        }
        Err(e) => {
          warn!("读取帧 {} 失败，记为 0 分: {}", index, e);
          state.unreadable[index] = true;
        }
      }
    }

    let failure = if frames.is_empty() {
      Some("本轮所有帧均无法读取".to_string())
    } else {
      match self.score_with_retry(heuristic, &frames) {
        Ok(frame_scores) => {
          for (slot, score) in slots.into_iter().zip(frame_scores) {
            scores[slot] = score;
          }
          None
        }
        Err(e) => {
          warn!("第 {} 轮检测失败，本批次记为 0 分: {}", iteration, e);
          Some(e.to_string())
        }
      }
    };

    let confidences: Vec<f64> = scores
      .iter()
      .map(|s| {
        if s.confidence.is_nan() {
          0.0
        } else {
          s.confidence.clamp(0.0, 1.0)
        }
      })
      .collect();
    state.belief.observe(&batch, &confidences)?;
    state.iteration = iteration;
    debug!("第 {} 轮置信度: {:?}", iteration, confidences);

    let record = IterationRecord {
      iteration,
      batch: batch.clone(),
      scores,
      belief: state.belief.belief().to_vec(),
      visited: state.belief.visited_mask().to_vec(),
      visited_count: state.belief.visited_count(),
      failure,
    };
    if let Err(e) = observer.render_result(frames.as_slice(), &record) {
      warn!("第 {} 轮诊断输出失败: {}", iteration, e);
    }
    state.batches.push(batch);

    if let Some(termination) = self.check_termination(&state, resolved) {
      state.status = SearchStatus::Terminated(termination);
    }
    Ok(state)
  }

  /// 瞬时失败重试同一批次，不额外消耗预算
  fn score_with_retry<H: Heuristic + ?Sized>(
    &self,
    heuristic: &H,
    frames: &[Frame],
  ) -> Result<Vec<FrameScore>, HeuristicError> {
    let mut attempt = 0;
    loop {
      match heuristic.score(frames, &self.targets, &self.cues) {
        Ok(scores) if scores.len() == frames.len() => return Ok(scores),
        Ok(scores) => {
          return Err(HeuristicError::Permanent(format!(
            "检测结果数量 {} 与帧数 {} 不一致",
            scores.len(),
            frames.len()
          )));
        }
        Err(e) if e.is_transient() && attempt < self.config.max_retries => {
          attempt += 1;
          warn!("检测器暂时失败，第 {} 次重试: {}", attempt, e);
        }
        Err(e) => return Err(e),
      }
    }
  }

  fn check_termination(&self, state: &SearchState, resolved: &ResolvedConfig) -> Option<Termination> {
    let visited = state.belief.visited_count();
    if visited >= resolved.budget {
      return Some(Termination::BudgetExhausted);
    }
    if let Some(threshold) = self.config.confidence_threshold {
      let top = state.belief.top_visited(resolved.search_nframes);
      if top.len() >= resolved.search_nframes && top.iter().all(|&c| c > threshold) {
        info!("前 {} 帧置信度均超过阈值 {}，提前停止", resolved.search_nframes, threshold);
        return Some(Termination::ConfidenceReached);
      }
    }
    if state.belief.is_fully_visited() {
      return Some(Termination::AllFramesVisited);
    }
    None
  }
}

/// 不需要诊断输出时的简化入口，返回按时间排序的帧图像与时间戳
pub fn search<S, H>(
  video: &S,
  heuristic: &H,
  targets: &[String],
  cues: &[String],
  config: SearchConfig,
) -> Result<(Vec<RgbImage>, Vec<f64>), SearchError>
where
  S: FrameSource + ?Sized,
  H: Heuristic + ?Sized,
{
  let outcome = Searcher::new(targets.to_vec(), cues.to_vec(), config).search(video, heuristic, &())?;
  Ok(
    outcome
      .frames
      .into_iter()
      .map(|frame| (frame.image, frame.timestamp))
      .unzip(),
  )
}
