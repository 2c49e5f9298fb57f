// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/heuristic.rs - 检测启发式打分
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::Frame;

/// 检测器输出的单个目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub label: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，归一化坐标
}

/// 单帧的打分结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameScore {
  /// 目标出现的置信度 [0, 1]
  pub confidence: f64,
  /// 帧内检测框，仅用于诊断
  pub detections: Vec<Detection>,
}

impl FrameScore {
  pub fn zero() -> Self {
    Self::default()
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeuristicError {
  /// 可恢复的失败（超时、后端暂时不可用），同一批次会被重试
  #[error("检测器暂时失败: {0}")]
  Transient(String),
  /// 对该批次必然失败（如损坏的帧），该批次记为 0 分
  #[error("检测器失败: {0}")]
  Permanent(String),
}

impl HeuristicError {
  pub fn is_transient(&self) -> bool {
    matches!(self, HeuristicError::Transient(_))
  }
}

/// 检测启发式：对一批帧给出置信度
///
/// 返回结果与输入帧一一对应且保持顺序。
pub trait Heuristic {
  fn score(
    &self,
    frames: &[Frame],
    targets: &[String],
    cues: &[String],
  ) -> Result<Vec<FrameScore>, HeuristicError>;
}

impl<H: Heuristic + ?Sized> Heuristic for &H {
  fn score(
    &self,
    frames: &[Frame],
    targets: &[String],
    cues: &[String],
  ) -> Result<Vec<FrameScore>, HeuristicError> {
    (**self).score(frames, targets, cues)
  }
}

impl<H: Heuristic + ?Sized> Heuristic for Box<H> {
  fn score(
    &self,
    frames: &[Frame],
    targets: &[String],
    cues: &[String],
  ) -> Result<Vec<FrameScore>, HeuristicError> {
    (**self).score(frames, targets, cues)
  }
}

/// 由检测结果计算帧置信度：目标最高分与加权后的线索最高分取较大者
pub fn frame_confidence(
  detections: &[Detection],
  targets: &[String],
  cues: &[String],
  cue_weight: f64,
) -> f64 {
  let best = |names: &[String]| {
    detections
      .iter()
      .filter(|d| names.iter().any(|n| n.eq_ignore_ascii_case(&d.label)))
      .map(|d| d.score as f64)
      .fold(0.0, f64::max)
  };
  best(targets).max(cue_weight * best(cues)).clamp(0.0, 1.0)
}

mod grid;
pub use self::grid::{Detector, GridHeuristic};

mod recorded;
pub use self::recorded::{RecordedHeuristic, RecordedHeuristicError};
