// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/belief.rs - 逐帧置信度与访问标记
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

use thiserror::Error;
use tracing::debug;

use crate::spline::SmoothingSpline;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BeliefError {
  #[error("帧索引越界: {index} (总帧数 {total})")]
  InvalidIndex { index: usize, total: usize },
  #[error("索引与置信度数量不一致: {indices} != {confidences}")]
  LengthMismatch { indices: usize, confidences: usize },
}

/// 每帧的置信度估计以及访问标记
///
/// 访问标记是单调的：一旦置为已访问，就不会再回到未访问。
#[derive(Debug, Clone)]
pub struct BeliefStore {
  belief: Vec<f64>,
  visited: Vec<bool>,
  visited_count: usize,
  smoothing: f64,
}

impl BeliefStore {
  pub fn new(total_frame_num: usize, smoothing: f64) -> Self {
    let uniform = uniform_value(total_frame_num);
    Self {
      belief: vec![uniform; total_frame_num],
      visited: vec![false; total_frame_num],
      visited_count: 0,
      smoothing,
    }
  }

  pub fn visited_count(&self) -> usize {
    self.visited_count
  }

  pub fn is_fully_visited(&self) -> bool {
    self.visited_count >= self.belief.len()
  }

  /// 未经外推的原始置信度
  pub fn belief(&self) -> &[f64] {
    &self.belief
  }

  pub fn visited_mask(&self) -> &[bool] {
    &self.visited
  }

  /// 写入一批观测并标记为已访问。
  ///
  /// 整批先做越界检查，任何一个索引非法时不修改任何状态。
  pub fn observe(&mut self, indices: &[usize], confidences: &[f64]) -> Result<(), BeliefError> {
    if indices.len() != confidences.len() {
      return Err(BeliefError::LengthMismatch {
        indices: indices.len(),
        confidences: confidences.len(),
      });
    }
    let total = self.belief.len();
    if let Some(&index) = indices.iter().find(|&&i| i >= total) {
      return Err(BeliefError::InvalidIndex { index, total });
    }

    for (&index, &confidence) in indices.iter().zip(confidences) {
      self.belief[index] = confidence;
      if !self.visited[index] {
        self.visited[index] = true;
        self.visited_count += 1;
      }
    }
    Ok(())
  }

  /// 已访问帧中最高的 `k` 个置信度，按降序排列
  pub fn top_visited(&self, k: usize) -> Vec<f64> {
    let mut observed: Vec<f64> = self
      .belief
      .iter()
      .zip(&self.visited)
      .filter(|(_, visited)| **visited)
      .map(|(value, _)| *value)
      .collect();
    observed.sort_by(|a, b| b.total_cmp(a));
    observed.truncate(k);
    observed
  }

  /// 对全部帧给出置信度估计。
  ///
  /// 已访问帧保持观测值，未访问帧由平滑样条外推；
  /// 已访问帧少于 2 个时返回均匀分布。
  pub fn extrapolate(&self) -> Vec<f64> {
    let total = self.belief.len();
    if self.visited_count < 2 {
      debug!("已访问帧数 {} 不足以拟合样条，使用均匀分布", self.visited_count);
      return vec![uniform_value(total); total];
    }

    // 索引归一化到 [0, 1]，使平滑参数与视频长度无关
    let scale = (total - 1) as f64;
    let points: Vec<(f64, f64)> = self
      .visited
      .iter()
      .enumerate()
      .filter(|(_, visited)| **visited)
      .map(|(index, _)| (index as f64 / scale, self.belief[index]))
      .collect();

    let Some(spline) = SmoothingSpline::fit(&points, self.smoothing) else {
      debug!("样条拟合失败，使用均匀分布");
      return vec![uniform_value(total); total];
    };

    (0..total)
      .map(|index| {
        if self.visited[index] {
          self.belief[index]
        } else {
          spline.evaluate(index as f64 / scale)
        }
      })
      .collect()
  }
}

fn uniform_value(total_frame_num: usize) -> f64 {
  if total_frame_num == 0 {
    0.0
  } else {
    1.0 / total_frame_num as f64
  }
}
