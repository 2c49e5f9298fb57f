// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/heuristic/grid.rs - 网格拼接批量检测
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

use image::RgbImage;
use tracing::debug;

use crate::{
  frame::{Frame, stitch_grid},
  heuristic::{Detection, FrameScore, Heuristic, HeuristicError, frame_confidence},
};

const DEFAULT_CUE_WEIGHT: f64 = 0.5;

/// 开放词表的区域检测器
///
/// 返回的检测框为整张输入图像上的归一化坐标。
pub trait Detector {
  fn detect(&self, image: &RgbImage, vocabulary: &[String]) -> Result<Vec<Detection>, HeuristicError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
  fn detect(&self, image: &RgbImage, vocabulary: &[String]) -> Result<Vec<Detection>, HeuristicError> {
    (**self).detect(image, vocabulary)
  }
}

/// 把一批帧拼成 rows x cols 网格，每张网格只调用一次检测器
pub struct GridHeuristic<D> {
  detector: D,
  rows: usize,
  cols: usize,
  cue_weight: f64,
}

impl<D: Detector> GridHeuristic<D> {
  pub fn new(detector: D, rows: usize, cols: usize) -> Self {
    Self {
      detector,
      rows: rows.max(1),
      cols: cols.max(1),
      cue_weight: DEFAULT_CUE_WEIGHT,
    }
  }

  pub fn with_cue_weight(mut self, cue_weight: f64) -> Self {
    self.cue_weight = cue_weight;
    self
  }
}

impl<D: Detector> Heuristic for GridHeuristic<D> {
  fn score(
    &self,
    frames: &[Frame],
    targets: &[String],
    cues: &[String],
  ) -> Result<Vec<FrameScore>, HeuristicError> {
    let vocabulary: Vec<String> = targets.iter().chain(cues).cloned().collect();
    let cells = self.rows * self.cols;
    let mut scores = Vec::with_capacity(frames.len());

    for chunk in frames.chunks(cells) {
      let images: Vec<&RgbImage> = chunk.iter().map(|f| &f.image).collect();
      let (grid, layout) = stitch_grid(&images, self.rows, self.cols)
        .ok_or_else(|| HeuristicError::Permanent("无法拼接网格图像".to_string()))?;

      let detections = self.detector.detect(&grid, &vocabulary)?;
      debug!("网格 {}x{} 检测到 {} 个目标", self.rows, self.cols, detections.len());

      let mut per_cell: Vec<Vec<Detection>> = vec![Vec::new(); chunk.len()];
      for detection in detections {
        let cx = (detection.bbox[0] + detection.bbox[2]) / 2.0;
        let cy = (detection.bbox[1] + detection.bbox[3]) / 2.0;
        let slot = layout.slot_at(cx, cy);
        // 落在空余单元格里的检测直接丢弃
        if let Some(bucket) = per_cell.get_mut(slot) {
          bucket.push(Detection {
            bbox: layout.to_cell_bbox(slot, &detection.bbox),
            ..detection
          });
        }
      }

      scores.extend(per_cell.into_iter().map(|detections| FrameScore {
        confidence: frame_confidence(&detections, targets, cues, self.cue_weight),
        detections,
      }));
    }

    Ok(scores)
  }
}
