// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/grounding.rs - 问题定位与问答接口
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

use std::convert::Infallible;

use serde::Serialize;

use crate::{frame::Frame, input::FrameSource};

/// 从问题中提取出的物体名称
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Grounding {
  /// 需要找到的目标物体
  pub targets: Vec<String>,
  /// 常与目标同时出现的线索物体
  pub cues: Vec<String>,
}

impl Grounding {
  pub fn new<T: Into<String>, C: Into<String>>(
    targets: impl IntoIterator<Item = T>,
    cues: impl IntoIterator<Item = C>,
  ) -> Self {
    Self {
      targets: targets.into_iter().map(Into::into).collect(),
      cues: cues.into_iter().map(Into::into).collect(),
    }
  }
}

/// 搜索开始前调用一次
pub trait Grounder {
  type Error;
  fn ground(&self, video: &dyn FrameSource, question: &str) -> Result<Grounding, Self::Error>;
}

/// 搜索结束后以选中帧回答问题，调用一次
pub trait Answerer {
  type Error;
  fn answer(&self, frames: &[Frame], question: &str, options: &str) -> Result<String, Self::Error>;
}

/// 已知词表时直接返回固定的目标与线索
#[derive(Debug, Clone)]
pub struct FixedGrounder(Grounding);

impl FixedGrounder {
  pub fn new(grounding: Grounding) -> Self {
    Self(grounding)
  }
}

impl Grounder for FixedGrounder {
  type Error = Infallible;

  fn ground(&self, _video: &dyn FrameSource, _question: &str) -> Result<Grounding, Self::Error> {
    Ok(self.0.clone())
  }
}

impl<G: Grounder + ?Sized> Grounder for &G {
  type Error = G::Error;

  fn ground(&self, video: &dyn FrameSource, question: &str) -> Result<Grounding, Self::Error> {
    (**self).ground(video, question)
  }
}

impl<A: Answerer + ?Sized> Answerer for &A {
  type Error = A::Error;

  fn answer(&self, frames: &[Frame], question: &str, options: &str) -> Result<String, Self::Error> {
    (**self).answer(frames, question, options)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::MemoryInput;

  #[test]
  fn test_fixed_grounder() {
    let grounder = FixedGrounder::new(Grounding::new(["couch"], ["tv", "chair"]));
    let video = MemoryInput::new(Vec::new(), 1.0);
    let grounding = grounder.ground(&video, "沙发是什么颜色？").unwrap();
    assert_eq!(grounding.targets, vec!["couch"]);
    assert_eq!(grounding.cues, vec!["tv", "chair"]);
  }
}
