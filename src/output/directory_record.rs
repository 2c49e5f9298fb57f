// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::Utc;
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, stitch_grid},
  output::{Render, draw::Draw},
  search::{IterationRecord, SearchOutcome, Searcher, Termination},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct SearchSummary<'a> {
  targets: &'a [String],
  cues: &'a [String],
  indices: Vec<usize>,
  timestamps: Vec<f64>,
  scores: Vec<f64>,
  final_belief: &'a [f64],
  visited_count: usize,
  iterations: usize,
  termination: Termination,
  finished_at: String,
}

/// 将每轮搜索记录以及最终结果写入目录
///
/// ```text
/// <directory>/iterations/iter_0001.json
/// <directory>/iterations/iter_0001.png
/// <directory>/frame_sampling/frame_0_at_12.00s.jpg
/// <directory>/summary.json
/// ```
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  targets: Vec<String>,
  save_images: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        uri.scheme()
      );
      return Err(DirectoryRecordOutputError::SchemeMismatch(uri.scheme().to_string()));
    }

    let save_images = !uri
      .query_pairs()
      .any(|(k, v)| k == "images" && (v == "false" || v == "0"));

    Ok(Self::new(PathBuf::from(uri.path())).with_images(save_images))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: PathBuf) -> Self {
    Self {
      directory,
      draw: Draw::default(),
      targets: Vec::new(),
      save_images: true,
    }
  }

  /// 是否保存每轮拼接后的图像
  pub fn with_images(mut self, save_images: bool) -> Self {
    self.save_images = save_images;
    self
  }

  /// 用于区分目标框与线索框的颜色
  pub fn with_targets(mut self, targets: Vec<String>) -> Self {
    self.targets = targets;
    self
  }

  fn subdirectory(&self, name: &str) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self.directory.join(name);
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }
    Ok(directory)
  }

  /// 保存选中的帧
  pub fn save_frames(&self, frames: &[Frame]) -> Result<Vec<PathBuf>, DirectoryRecordOutputError> {
    let directory = self.subdirectory("frame_sampling")?;
    let mut paths = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
      let path = directory.join(format!("frame_{}_at_{:.2}s.jpg", i, frame.timestamp));
      frame.image.save(&path)?;
      paths.push(path);
    }
    info!("保存 {} 帧到 {}", paths.len(), directory.display());
    Ok(paths)
  }

  /// 保存搜索结果概要
  pub fn save_summary(
    &self,
    searcher: &Searcher,
    outcome: &SearchOutcome,
  ) -> Result<PathBuf, DirectoryRecordOutputError> {
    if !self.directory.exists() {
      std::fs::create_dir_all(&self.directory)?;
    }
    let summary = SearchSummary {
      targets: searcher.targets(),
      cues: searcher.cues(),
      indices: outcome.indices(),
      timestamps: outcome.timestamps(),
      scores: outcome.selected.iter().map(|s| s.score).collect(),
      final_belief: &outcome.final_belief,
      visited_count: outcome.visited_count,
      iterations: outcome.iterations,
      termination: outcome.termination,
      finished_at: Utc::now().to_rfc3339(),
    };
    let path = self.directory.join("summary.json");
    std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
    Ok(path)
  }

  /// 每帧画上本轮的检测框后按近似方形拼接
  fn iteration_image(&self, frames: &[Frame], record: &IterationRecord) -> Option<RgbImage> {
    let drawn: Vec<RgbImage> = frames
      .iter()
      .map(|frame| {
        let mut image = frame.image.clone();
        if let Some(slot) = record.batch.iter().position(|&i| i == frame.index)
          && let Some(score) = record.scores.get(slot)
        {
          self
            .draw
            .draw_detections(&mut image, &score.detections, &self.targets);
        }
        image
      })
      .collect();

    let cols = (drawn.len() as f64).sqrt().ceil().max(1.0) as usize;
    let rows = drawn.len().div_ceil(cols);
    let refs: Vec<&RgbImage> = drawn.iter().collect();
    stitch_grid(&refs, rows, cols).map(|(grid, _)| grid)
  }
}

impl Render<[Frame], IterationRecord> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frames: &[Frame], record: &IterationRecord) -> Result<(), Self::Error> {
    let directory = self.subdirectory("iterations")?;
    let stem = format!("iter_{:04}", record.iteration);

    std::fs::write(
      directory.join(format!("{}.json", stem)),
      serde_json::to_string(record)?,
    )?;

    if self.save_images
      && let Some(image) = self.iteration_image(frames, record)
    {
      image.save(directory.join(format!("{}.png", stem)))?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::heuristic::{Detection, FrameScore};
  use url::Url;

  fn frame(index: usize) -> Frame {
    Frame {
      index,
      timestamp: index as f64 * 0.5,
      image: RgbImage::new(8, 6),
    }
  }

  fn record(batch: Vec<usize>) -> IterationRecord {
    let scores = batch
      .iter()
      .map(|_| FrameScore {
        confidence: 0.7,
        detections: vec![Detection {
          label: "couch".to_string(),
          score: 0.7,
          bbox: [0.1, 0.1, 0.9, 0.9],
        }],
      })
      .collect();
    IterationRecord {
      iteration: 3,
      batch,
      scores,
      belief: vec![0.1; 10],
      visited: vec![false; 10],
      visited_count: 3,
      failure: None,
    }
  }

  #[test]
  fn test_writes_iteration_files() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("record://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    output
      .render_result(&[frame(1), frame(4), frame(7)], &record(vec![1, 4, 7]))
      .unwrap();

    let json = std::fs::read_to_string(dir.path().join("iterations/iter_0003.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["batch"], serde_json::json!([1, 4, 7]));

    // 3 帧拼成 2x2
    let image = image::open(dir.path().join("iterations/iter_0003.png")).unwrap();
    assert_eq!((image.width(), image.height()), (16, 12));
  }

  #[test]
  fn test_images_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("record://{}?images=false", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&[frame(2)], &record(vec![2])).unwrap();
    assert!(dir.path().join("iterations/iter_0003.json").exists());
    assert!(!dir.path().join("iterations/iter_0003.png").exists());
  }

  #[test]
  fn test_save_frames_names() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::new(dir.path().to_path_buf());
    let paths = output.save_frames(&[frame(3), frame(25)]).unwrap();
    assert!(paths[0].ends_with("frame_sampling/frame_0_at_1.50s.jpg"));
    assert!(paths[1].ends_with("frame_sampling/frame_1_at_12.50s.jpg"));
    assert!(paths.iter().all(|p| p.exists()));
  }

  #[test]
  fn test_rejects_other_scheme() {
    let url = Url::parse("folder:///tmp/out").unwrap();
    assert!(matches!(
      DirectoryRecordOutput::from_url(&url),
      Err(DirectoryRecordOutputError::SchemeMismatch(_))
    ));
  }
}
