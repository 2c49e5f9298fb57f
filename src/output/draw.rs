// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
  rect::Rect,
};

use crate::heuristic::Detection;

const TARGET_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const CUE_COLOR: [u8; 3] = [255, 160, 0]; // 橙色
const BOX_THICKNESS: i32 = 2;
const SCORE_BAR_HEIGHT: u32 = 4;

pub struct Draw {
  target_color: [u8; 3],
  cue_color: [u8; 3],
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      target_color: TARGET_COLOR,
      cue_color: CUE_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  /// 将归一化框 [x_min, y_min, x_max, y_max] 换算为像素矩形，退化的框返回 `None`
  fn pixel_rect(image: &RgbImage, bbox: &[f32; 4]) -> Option<Rect> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if w < 1.0 || h < 1.0 {
      return None;
    }

    let x_min = ((bbox[0] * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((bbox[1] * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((bbox[2] * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((bbox[3] * h).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return None;
    }
    Some(Rect::at(x_min, y_min).of_size((x_max - x_min + 1) as u32, (y_max - y_min + 1) as u32))
  }

  fn draw_box(&self, image: &mut RgbImage, bbox: &[f32; 4], score: f32, color: [u8; 3]) {
    let Some(rect) = Self::pixel_rect(image, bbox) else {
      return;
    };

    // 向内加粗
    for t in 0..self.thickness {
      let width = rect.width() as i32 - 2 * t;
      let height = rect.height() as i32 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let inner = Rect::at(rect.left() + t, rect.top() + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, inner, Rgb(color));
    }

    // 框上方的分数条，长度与分数成正比
    let bar_top = (rect.top() - SCORE_BAR_HEIGHT as i32).max(0);
    let bar_width = ((rect.width() as f32 * score.clamp(0.0, 1.0)).round() as u32).max(1);
    let bar = Rect::at(rect.left(), bar_top).of_size(bar_width, SCORE_BAR_HEIGHT);
    draw_filled_rect_mut(image, bar, Rgb(color));
  }

  /// 在帧上绘制检测框，标签属于 `targets` 的用目标色，其余用线索色
  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection], targets: &[String]) {
    for detection in detections {
      let is_target = targets
        .iter()
        .any(|t| t.eq_ignore_ascii_case(detection.label.trim()));
      let color = if is_target {
        self.target_color
      } else {
        self.cue_color
      };
      self.draw_box(image, &detection.bbox, detection.score, color);
    }
  }
}
