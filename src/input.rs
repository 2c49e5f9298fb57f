// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/input.rs - 视频帧输入
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
use thiserror::Error;

#[cfg(feature = "image_folder")]
mod image_folder;
#[cfg(feature = "image_folder")]
pub use self::image_folder::ImageFolderInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("帧索引越界: {index} (总帧数 {total})")]
  IndexOutOfRange { index: usize, total: usize },
  #[error("无效的参数 {0}: {1}")]
  InvalidParameter(String, String),
  #[error("目录中没有图像: {0}")]
  NoFrames(String),
}

/// 按索引随机访问的视频帧来源
///
/// 视频已按固定分析帧率预先抽帧，索引在一次搜索中保持稳定。
pub trait FrameSource {
  /// 可采样的帧总数
  fn total_frame_num(&self) -> usize;

  /// 相邻两个索引之间的时间间隔（秒）
  fn sample_interval(&self) -> f64;

  /// 读取指定索引的帧
  fn read_frame(&self, index: usize) -> Result<RgbImage, InputError>;

  fn timestamp(&self, index: usize) -> f64 {
    index as f64 * self.sample_interval()
  }
}

impl<S: FrameSource + ?Sized> FrameSource for &S {
  fn total_frame_num(&self) -> usize {
    (**self).total_frame_num()
  }

  fn sample_interval(&self) -> f64 {
    (**self).sample_interval()
  }

  fn read_frame(&self, index: usize) -> Result<RgbImage, InputError> {
    (**self).read_frame(index)
  }
}

/// 内存中的帧序列
pub struct MemoryInput {
  frames: Vec<RgbImage>,
  fps: f64,
}

impl MemoryInput {
  pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
    Self { frames, fps }
  }
}

impl FrameSource for MemoryInput {
  fn total_frame_num(&self) -> usize {
    self.frames.len()
  }

  fn sample_interval(&self) -> f64 {
    if self.fps > 0.0 { 1.0 / self.fps } else { 1.0 }
  }

  fn read_frame(&self, index: usize) -> Result<RgbImage, InputError> {
    self
      .frames
      .get(index)
      .cloned()
      .ok_or(InputError::IndexOutOfRange {
        index,
        total: self.frames.len(),
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_memory_input() {
    let input = MemoryInput::new(vec![RgbImage::new(2, 2); 3], 2.0);
    assert_eq!(input.total_frame_num(), 3);
    assert_eq!(input.sample_interval(), 0.5);
    assert_eq!(input.timestamp(2), 1.0);
    assert!(input.read_frame(2).is_ok());
    assert!(matches!(
      input.read_frame(3),
      Err(InputError::IndexOutOfRange { index: 3, total: 3 })
    ));
  }
}
