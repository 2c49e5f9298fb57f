// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/frame.rs - 帧定义与网格拼接
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

use image::{RgbImage, imageops};

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// 帧索引（分析采样率下）
  pub index: usize,
  /// 时间戳（秒）
  pub timestamp: f64,
  /// RGB 图像数据
  pub image: RgbImage,
}

/// 网格拼接的单元格尺寸与布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
  pub rows: usize,
  pub cols: usize,
  pub cell_width: u32,
  pub cell_height: u32,
}

impl GridLayout {
  pub fn width(&self) -> u32 {
    self.cell_width * self.cols as u32
  }

  pub fn height(&self) -> u32 {
    self.cell_height * self.rows as u32
  }

  /// 第 `slot` 个单元格左上角的像素坐标（行优先）
  pub fn cell_origin(&self, slot: usize) -> (u32, u32) {
    let row = slot / self.cols;
    let col = slot % self.cols;
    (col as u32 * self.cell_width, row as u32 * self.cell_height)
  }

  /// 根据网格归一化坐标找到所在单元格
  pub fn slot_at(&self, x: f32, y: f32) -> usize {
    let col = ((x.clamp(0.0, 1.0) * self.cols as f32) as usize).min(self.cols - 1);
    let row = ((y.clamp(0.0, 1.0) * self.rows as f32) as usize).min(self.rows - 1);
    row * self.cols + col
  }

  /// 将网格归一化的框 [x_min, y_min, x_max, y_max] 换算为单元格归一化坐标
  pub fn to_cell_bbox(&self, slot: usize, bbox: &[f32; 4]) -> [f32; 4] {
    let row = (slot / self.cols) as f32;
    let col = (slot % self.cols) as f32;
    let (cols, rows) = (self.cols as f32, self.rows as f32);
    [
      (bbox[0] * cols - col).clamp(0.0, 1.0),
      (bbox[1] * rows - row).clamp(0.0, 1.0),
      (bbox[2] * cols - col).clamp(0.0, 1.0),
      (bbox[3] * rows - row).clamp(0.0, 1.0),
    ]
  }
}

/// 将若干帧按行优先拼接成一张 rows x cols 的网格图。
///
/// 单元格尺寸取第一帧的尺寸，其余帧缩放到该尺寸；空余单元格保持黑色。
/// 返回 `None` 表示没有帧或网格容纳不下。
pub fn stitch_grid(images: &[&RgbImage], rows: usize, cols: usize) -> Option<(RgbImage, GridLayout)> {
  let first = images.first()?;
  if rows == 0 || cols == 0 || images.len() > rows * cols {
    return None;
  }

  let layout = GridLayout {
    rows,
    cols,
    cell_width: first.width(),
    cell_height: first.height(),
  };
  let mut grid = RgbImage::new(layout.width(), layout.height());

  for (slot, image) in images.iter().enumerate() {
    let (x, y) = layout.cell_origin(slot);
    if image.dimensions() == (layout.cell_width, layout.cell_height) {
      imageops::replace(&mut grid, *image, x as i64, y as i64);
    } else {
      let resized = imageops::resize(
        *image,
        layout.cell_width,
        layout.cell_height,
        imageops::FilterType::Triangle,
      );
      imageops::replace(&mut grid, &resized, x as i64, y as i64);
    }
  }

  Some((grid, layout))
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn solid(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
  }

  #[test]
  fn test_stitch_places_cells_row_major() {
    let a = solid(4, 2, 10);
    let b = solid(4, 2, 20);
    let c = solid(4, 2, 30);
    let (grid, layout) = stitch_grid(&[&a, &b, &c], 2, 2).unwrap();
    assert_eq!(grid.dimensions(), (8, 4));
    assert_eq!(layout.cell_origin(2), (0, 2));
    assert_eq!(grid.get_pixel(0, 0)[0], 10);
    assert_eq!(grid.get_pixel(5, 1)[0], 20);
    assert_eq!(grid.get_pixel(1, 3)[0], 30);
    // 空余单元格
    assert_eq!(grid.get_pixel(6, 3)[0], 0);
  }

  #[test]
  fn test_stitch_resizes_mismatched_frames() {
    let a = solid(4, 4, 50);
    let b = solid(8, 8, 100);
    let (grid, _) = stitch_grid(&[&a, &b], 1, 2).unwrap();
    assert_eq!(grid.dimensions(), (8, 4));
    assert_eq!(grid.get_pixel(6, 2)[0], 100);
  }

  #[test]
  fn test_stitch_rejects_overflow() {
    let a = solid(2, 2, 1);
    assert!(stitch_grid(&[&a, &a, &a], 1, 2).is_none());
    assert!(stitch_grid(&[], 2, 2).is_none());
  }

  #[test]
  fn test_slot_and_cell_bbox() {
    let layout = GridLayout {
      rows: 2,
      cols: 2,
      cell_width: 10,
      cell_height: 10,
    };
    assert_eq!(layout.slot_at(0.75, 0.25), 1);
    assert_eq!(layout.slot_at(0.25, 0.75), 2);
    assert_eq!(layout.slot_at(1.0, 1.0), 3);
    let bbox = layout.to_cell_bbox(1, &[0.5, 0.0, 0.75, 0.25]);
    assert_eq!(bbox, [0.0, 0.0, 0.5, 0.5]);
  }
}
