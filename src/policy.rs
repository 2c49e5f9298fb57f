// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/policy.rs - 采样策略
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

use rand::Rng;
use rand::seq::index;
use tracing::{debug, warn};

/// 从未访问帧中按外推置信度加权、不放回地抽取一批索引。
///
/// 返回的索引按升序排列，数量为 `batch_size` 与剩余未访问帧数中的较小者。
/// 只要存在未访问帧，就不会选中已访问帧。全部为零权重时退化为均匀采样。
pub fn select_batch<R: Rng + ?Sized>(
  belief: &[f64],
  visited: &[bool],
  batch_size: usize,
  rng: &mut R,
) -> Vec<usize> {
  let candidates: Vec<usize> = visited
    .iter()
    .enumerate()
    .filter(|(_, visited)| !**visited)
    .map(|(index, _)| index)
    .collect();

  let amount = batch_size.min(candidates.len());
  if amount == 0 {
    return Vec::new();
  }

  // 样条外推可能给出负值或非有限值，作为采样权重时截断为 0
  let weights: Vec<f64> = candidates
    .iter()
    .map(|&i| belief.get(i).copied().unwrap_or(0.0))
    .map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
    .collect();
  let total_weight: f64 = weights.iter().sum();

  let picked = if total_weight > 0.0 {
    match index::sample_weighted(rng, candidates.len(), |i| weights[i] / total_weight, amount) {
      Ok(picked) => picked.into_vec(),
      Err(e) => {
        warn!("加权采样失败，改用均匀采样: {}", e);
        index::sample(rng, candidates.len(), amount).into_vec()
      }
    }
  } else {
    debug!("未访问帧的权重全部为 0，使用均匀采样");
    index::sample(rng, candidates.len(), amount).into_vec()
  };

  let mut batch: Vec<usize> = picked.into_iter().map(|i| candidates[i]).collect();
  batch.sort_unstable();
  batch
}
