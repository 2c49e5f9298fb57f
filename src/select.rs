// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/select.rs - 关键帧选取
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

use std::cmp::Ordering;

use serde::Serialize;

/// 被选中的帧
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectedFrame {
  pub index: usize,
  pub score: f64,
  /// 时间戳（秒）
  pub timestamp: f64,
}

/// 按分数降序取前 `k` 个，分数相同时索引小者优先。
///
/// `k` 会被截断到总帧数。NaN 视为最低分。
pub fn select_top_k(final_belief: &[f64], k: usize) -> Vec<(usize, f64)> {
  let mut ranked: Vec<(usize, f64)> = final_belief
    .iter()
    .map(|&score| if score.is_nan() { f64::NEG_INFINITY } else { score })
    .enumerate()
    .collect();

  // partial_cmp 使 -0.0 与 0.0 相等
  ranked.sort_by(|a, b| {
    b.1
      .partial_cmp(&a.1)
      .unwrap_or(Ordering::Equal)
      .then(a.0.cmp(&b.0))
  });
  ranked.truncate(k.min(final_belief.len()));
  ranked
}

/// 按排名依次调用 `load` 载入帧，跳过返回 `None` 的帧，
/// 取前 `k` 个载入成功的帧并按时间升序排列
pub fn select_frames<T, F>(
  final_belief: &[f64],
  k: usize,
  sample_interval: f64,
  mut load: F,
) -> Vec<(SelectedFrame, T)>
where
  F: FnMut(usize) -> Option<T>,
{
  let k = k.min(final_belief.len());
  let mut picked = Vec::with_capacity(k);
  for (index, score) in select_top_k(final_belief, final_belief.len()) {
    if picked.len() == k {
      break;
    }
    if let Some(item) = load(index) {
      let frame = SelectedFrame {
        index,
        score,
        timestamp: index as f64 * sample_interval,
      };
      picked.push((frame, item));
    }
  }
  picked.sort_by_key(|(frame, _)| frame.index);
  picked
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_orders_by_score_then_index() {
    let belief = [0.1, 0.9, 0.5, 0.9, 0.2];
    let top = select_top_k(&belief, 3);
    assert_eq!(top, vec![(1, 0.9), (3, 0.9), (2, 0.5)]);
  }

  #[test]
  fn test_k_is_clamped() {
    let top = select_top_k(&[0.3, 0.1], 8);
    assert_eq!(top.len(), 2);
  }

  #[test]
  fn test_all_equal_breaks_ties_by_index() {
    let belief = [0.0, -0.0, 0.0, 0.0, 0.0];
    let top = select_top_k(&belief, 3);
    let indices: Vec<usize> = top.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![0, 1, 2]);
  }

  #[test]
  fn test_nan_ranks_last() {
    let top = select_top_k(&[f64::NAN, 0.1, 0.2], 2);
    assert_eq!(top.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![2, 1]);
  }

  #[test]
  fn test_frames_are_time_ordered() {
    let belief = [0.1, 0.2, 0.9, 0.3, 0.8];
    let frames = select_frames(&belief, 3, 0.5, Some);
    let indices: Vec<usize> = frames.iter().map(|(f, _)| f.index).collect();
    assert_eq!(indices, vec![2, 3, 4]);
    let timestamps: Vec<f64> = frames.iter().map(|(f, _)| f.timestamp).collect();
    assert_eq!(timestamps, vec![1.0, 1.5, 2.0]);
  }

  #[test]
  fn test_unloadable_frames_are_replaced_by_next_rank() {
    let belief = [0.0; 6];
    let frames = select_frames(&belief, 3, 1.0, |i| (i != 0 && i != 2).then_some(i * 10));
    let picked: Vec<(usize, usize)> = frames.iter().map(|(f, item)| (f.index, *item)).collect();
    assert_eq!(picked, vec![(1, 10), (3, 30), (4, 40)]);
  }

  #[test]
  fn test_fewer_loadable_than_k() {
    let frames = select_frames(&[0.5, 0.4, 0.3], 3, 1.0, |i| (i == 1).then_some(()));
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0.index, 1);
  }
}
