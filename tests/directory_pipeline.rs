// 该文件是 Xunzhen （寻帧） 项目的一部分。
// tests/directory_pipeline.rs - 帧目录 + 检测记录 + 目录输出
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

#![cfg(all(feature = "image_folder", feature = "directory_record"))]

use image::{Rgb, RgbImage};
use url::Url;
use xunzhen::{
  Budget, FromUrl, SearchConfig, Searcher,
  heuristic::RecordedHeuristic,
  input::ImageFolderInput,
  output::DirectoryRecordOutput,
  task::{SearchTask, Task},
};

#[test]
fn folder_search_writes_diagnostics() {
  let frames = tempfile::tempdir().unwrap();
  for i in 0..24u8 {
    RgbImage::from_pixel(8, 8, Rgb([i * 10, 0, 0]))
      .save(frames.path().join(format!("frame_{:03}.png", i)))
      .unwrap();
  }

  // 沙发出现在 16..20，电视出现在 12..16
  let mut entries = Vec::new();
  for i in 12..16 {
    entries.push(format!(
      r#""{i}": [{{"label": "tv", "score": 0.8, "bbox": [0.1, 0.1, 0.6, 0.6]}}]"#
    ));
  }
  for i in 16..20 {
    entries.push(format!(
      r#""{i}": [{{"label": "Couch", "score": 0.9, "bbox": [0.2, 0.2, 0.9, 0.9]}}]"#
    ));
  }
  let detections = tempfile::NamedTempFile::new().unwrap();
  std::fs::write(
    detections.path(),
    format!(r#"{{"frames": {{{}}}}}"#, entries.join(",")),
  )
  .unwrap();

  let out = tempfile::tempdir().unwrap();

  let input = ImageFolderInput::from_url(
    &Url::parse(&format!("folder://{}?fps=2", frames.path().display())).unwrap(),
  )
  .unwrap();
  let heuristic = RecordedHeuristic::from_url(
    &Url::parse(&format!("recorded://{}", detections.path().display())).unwrap(),
  )
  .unwrap();
  let output = DirectoryRecordOutput::from_url(
    &Url::parse(&format!("record://{}", out.path().display())).unwrap(),
  )
  .unwrap()
  .with_targets(vec!["couch".to_string()]);

  let config = SearchConfig::default()
    .with_image_grid_shape(2, 2)
    .with_search_budget(Budget::Fraction(1.0))
    .with_search_nframes(4)
    .with_confidence_threshold(None);
  let searcher = Searcher::new(vec!["couch".to_string()], vec!["tv".to_string()], config);

  let (searcher, outcome) = SearchTask::new(searcher)
    .run_task(&input, &heuristic, &output)
    .unwrap();

  assert_eq!(outcome.visited_count, 24);
  assert_eq!(outcome.iterations, 6);
  assert_eq!(outcome.indices(), vec![16, 17, 18, 19]);
  assert_eq!(outcome.timestamps(), vec![8.0, 8.5, 9.0, 9.5]);
  assert_eq!(outcome.frames[0].image.get_pixel(0, 0)[0], 160);

  for iteration in 1..=6 {
    let stem = out.path().join(format!("iterations/iter_{:04}", iteration));
    assert!(stem.with_extension("json").exists());
    assert!(stem.with_extension("png").exists());
  }

  let paths = output.save_frames(&outcome.frames).unwrap();
  assert!(paths[0].ends_with("frame_sampling/frame_0_at_8.00s.jpg"));

  let summary = output.save_summary(&searcher, &outcome).unwrap();
  let summary: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(summary).unwrap()).unwrap();
  assert_eq!(summary["indices"], serde_json::json!([16, 17, 18, 19]));
  assert_eq!(summary["termination"], "budget_exhausted");
  assert_eq!(summary["cues"], serde_json::json!(["tv"]));
  assert!(summary["finished_at"].is_string());
}
