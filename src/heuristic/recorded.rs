// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/heuristic/recorded.rs - 回放预先计算的检测结果
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

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  heuristic::{Detection, FrameScore, Heuristic, HeuristicError, frame_confidence},
};

#[derive(Error, Debug)]
pub enum RecordedHeuristicError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("无效的帧索引: {0}")]
  InvalidIndex(String),
  #[error("无效的参数 {0}: {1}")]
  InvalidParameter(String, String),
}

#[derive(Deserialize)]
struct RecordedFile {
  /// 帧索引（字符串形式）到检测结果的映射
  frames: HashMap<String, Vec<Detection>>,
}

/// 从 JSON 文件回放每帧的检测结果
///
/// 文件格式：`{"frames": {"12": [{"label": "couch", "score": 0.8, "bbox": [..]}]}}`，
/// 未出现的帧视为没有检测结果。
pub struct RecordedHeuristic {
  detections: HashMap<usize, Vec<Detection>>,
  cue_weight: f64,
}

impl RecordedHeuristic {
  pub fn from_json(text: &str) -> Result<Self, RecordedHeuristicError> {
    let file: RecordedFile = serde_json::from_str(text)?;
    let mut detections = HashMap::with_capacity(file.frames.len());
    for (key, items) in file.frames {
      let index = key
        .trim()
        .parse::<usize>()
        .map_err(|_| RecordedHeuristicError::InvalidIndex(key.clone()))?;
      detections.insert(index, items);
    }
    Ok(Self {
      detections,
      cue_weight: 0.5,
    })
  }

  pub fn with_cue_weight(mut self, cue_weight: f64) -> Self {
    self.cue_weight = cue_weight;
    self
  }

  pub fn len(&self) -> usize {
    self.detections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }
}

impl FromUrlWithScheme for RecordedHeuristic {
  const SCHEME: &'static str = "recorded";
}

impl FromUrl for RecordedHeuristic {
  type Error = RecordedHeuristicError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(RecordedHeuristicError::SchemeMismatch(url.scheme().to_string()));
    }

    let text = std::fs::read_to_string(url.path())?;
    let mut heuristic = Self::from_json(&text)?;
    for (k, v) in url.query_pairs() {
      if k == "cue_weight" {
        let cue_weight = v
          .parse()
          .map_err(|_| RecordedHeuristicError::InvalidParameter(k.to_string(), v.to_string()))?;
        heuristic = heuristic.with_cue_weight(cue_weight);
      }
    }
    info!("载入 {} 帧的检测记录: {}", heuristic.len(), url.path());
    Ok(heuristic)
  }
}

impl Heuristic for RecordedHeuristic {
  fn score(
    &self,
    frames: &[Frame],
    targets: &[String],
    cues: &[String],
  ) -> Result<Vec<FrameScore>, HeuristicError> {
    Ok(
      frames
        .iter()
        .map(|frame| {
          let detections = self.detections.get(&frame.index).cloned().unwrap_or_default();
          FrameScore {
            confidence: frame_confidence(&detections, targets, cues, self.cue_weight),
            detections,
          }
        })
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use std::io::Write;

  const SAMPLE: &str = r#"{
    "frames": {
      "3": [{"label": "couch", "score": 0.9, "bbox": [0.1, 0.1, 0.5, 0.5]}],
      "7": [{"label": "tv", "score": 0.8, "bbox": [0.2, 0.2, 0.4, 0.4]}]
    }
  }"#;

  fn frame(index: usize) -> Frame {
    Frame {
      index,
      timestamp: 0.0,
      image: RgbImage::new(1, 1),
    }
  }

  #[test]
  fn test_replays_by_index() {
    let heuristic = RecordedHeuristic::from_json(SAMPLE).unwrap();
    let scores = heuristic
      .score(
        &[frame(7), frame(3), frame(0)],
        &["couch".to_string()],
        &["tv".to_string()],
      )
      .unwrap();
    assert!((scores[0].confidence - 0.4).abs() < 1e-6);
    assert!((scores[1].confidence - 0.9).abs() < 1e-6);
    assert_eq!(scores[2], FrameScore::zero());
  }

  #[test]
  fn test_rejects_bad_index() {
    let err = RecordedHeuristic::from_json(r#"{"frames": {"x": []}}"#);
    assert!(matches!(err, Err(RecordedHeuristicError::InvalidIndex(_))));
  }

  #[test]
  fn test_from_url() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();
    let url = Url::parse(&format!("recorded://{}?cue_weight=1.0", file.path().display())).unwrap();
    let heuristic = RecordedHeuristic::from_url(&url).unwrap();
    assert_eq!(heuristic.len(), 2);
    assert_eq!(heuristic.cue_weight, 1.0);

    let url = Url::parse("folder:///tmp/x.json").unwrap();
    assert!(matches!(
      RecordedHeuristic::from_url(&url),
      Err(RecordedHeuristicError::SchemeMismatch(_))
    ));
  }
}
