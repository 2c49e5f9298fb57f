// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/input/image_folder.rs - 预抽帧图像目录输入
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

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{FrameSource, InputError},
};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
const DEFAULT_FPS: f64 = 1.0;

/// 目录中按文件名排序的图像，每张图像对应一个帧索引
pub struct ImageFolderInput {
  files: Vec<PathBuf>,
  fps: f64,
}

impl ImageFolderInput {
  pub fn open(directory: &Path, fps: f64) -> Result<Self, InputError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| {
        path
          .extension()
          .and_then(|ext| ext.to_str())
          .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
          .unwrap_or(false)
      })
      .collect();
    files.sort();

    if files.is_empty() {
      return Err(InputError::NoFrames(directory.display().to_string()));
    }

    info!("帧目录 {} 中共有 {} 帧", directory.display(), files.len());
    Ok(Self { files, fps })
  }
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageFolderInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    let mut fps = DEFAULT_FPS;
    for (k, v) in url.query_pairs() {
      if k == "fps" {
        fps = v
          .parse::<f64>()
          .ok()
          .filter(|fps| fps.is_finite() && *fps > 0.0)
          .ok_or_else(|| InputError::InvalidParameter(k.to_string(), v.to_string()))?;
      }
    }

    Self::open(Path::new(url.path()), fps)
  }
}

impl FrameSource for ImageFolderInput {
  fn total_frame_num(&self) -> usize {
    self.files.len()
  }

  fn sample_interval(&self) -> f64 {
    1.0 / self.fps
  }

  fn read_frame(&self, index: usize) -> Result<RgbImage, InputError> {
    let path = self.files.get(index).ok_or(InputError::IndexOutOfRange {
      index,
      total: self.files.len(),
    })?;
    Ok(ImageReader::open(path)?.decode()?.to_rgb8())
  }
}
