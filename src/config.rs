// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/config.rs - 搜索配置
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

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

const DEFAULT_SEARCH_NFRAMES: usize = 8;
const DEFAULT_GRID_ROWS: usize = 4;
const DEFAULT_GRID_COLS: usize = 4;
const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;
const DEFAULT_BUDGET_FRACTION: f64 = 0.5;
const DEFAULT_SMOOTHING: f64 = 1e-3;
const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_SEED: u64 = 0x5EA2_C4F7;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("视频没有可采样的帧")]
  EmptyVideo,
  #[error("搜索预算必须大于 0")]
  ZeroBudget,
  #[error("预算比例必须位于 (0, 1] 区间内: {0}")]
  InvalidFraction(f64),
  #[error("批大小必须大于 0 (网格 {rows}x{cols})")]
  ZeroBatch { rows: usize, cols: usize },
  #[error("返回帧数必须大于 0")]
  ZeroFrames,
  #[error("返回帧数 {k} 超过了搜索预算 {budget}")]
  TooManyFrames { k: usize, budget: usize },
  #[error("平滑参数必须为非负有限值: {0}")]
  InvalidSmoothing(f64),
  #[error("置信度阈值必须为有限值: {0}")]
  InvalidThreshold(f64),
  #[error("无法解析搜索预算: {0}")]
  ParseBudget(String),
}

/// 搜索预算：绝对帧数或总帧数的比例
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
  Absolute(usize),
  Fraction(f64),
}

impl Budget {
  /// 根据视频总帧数得到实际可访问的帧数上限
  pub fn resolve(&self, total_frame_num: usize) -> usize {
    match *self {
      Budget::Absolute(n) => n.min(total_frame_num),
      Budget::Fraction(f) => ((f * total_frame_num as f64).floor() as usize).min(total_frame_num),
    }
  }

  fn validate(&self) -> Result<(), ConfigError> {
    match *self {
      Budget::Absolute(0) => Err(ConfigError::ZeroBudget),
      Budget::Absolute(_) => Ok(()),
      Budget::Fraction(f) if f.is_finite() && f > 0.0 && f <= 1.0 => Ok(()),
      Budget::Fraction(f) => Err(ConfigError::InvalidFraction(f)),
    }
  }
}

impl FromStr for Budget {
  type Err = ConfigError;

  /// 整数文本视为绝对帧数，小数文本视为比例
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if let Ok(n) = s.parse::<usize>() {
      let budget = Budget::Absolute(n);
      budget.validate()?;
      return Ok(budget);
    }
    let f = s
      .parse::<f64>()
      .map_err(|_| ConfigError::ParseBudget(s.to_string()))?;
    let budget = Budget::Fraction(f);
    budget.validate()?;
    Ok(budget)
  }
}

impl std::fmt::Display for Budget {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Budget::Absolute(n) => write!(f, "{}", n),
      Budget::Fraction(x) => write!(f, "{:.3}", x),
    }
  }
}

/// 单次搜索的配置，运行期间不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchConfig {
  /// 返回的关键帧数量 K
  pub search_nframes: usize,
  /// 批量网格的行数
  pub grid_rows: usize,
  /// 批量网格的列数
  pub grid_cols: usize,
  /// 提前停止的置信度阈值
  pub confidence_threshold: Option<f64>,
  pub search_budget: Budget,
  /// 平滑样条的曲率惩罚系数（帧索引归一化到 [0, 1]）
  pub smoothing: f64,
  /// 检测器瞬时失败时的最大重试次数
  pub max_retries: usize,
  pub seed: u64,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      search_nframes: DEFAULT_SEARCH_NFRAMES,
      grid_rows: DEFAULT_GRID_ROWS,
      grid_cols: DEFAULT_GRID_COLS,
      confidence_threshold: Some(DEFAULT_CONFIDENCE_THRESHOLD),
      search_budget: Budget::Fraction(DEFAULT_BUDGET_FRACTION),
      smoothing: DEFAULT_SMOOTHING,
      max_retries: DEFAULT_MAX_RETRIES,
      seed: DEFAULT_SEED,
    }
  }
}

impl SearchConfig {
  pub fn with_search_nframes(mut self, k: usize) -> Self {
    self.search_nframes = k;
    self
  }

  pub fn with_image_grid_shape(mut self, rows: usize, cols: usize) -> Self {
    self.grid_rows = rows;
    self.grid_cols = cols;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: Option<f64>) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_search_budget(mut self, budget: Budget) -> Self {
    self.search_budget = budget;
    self
  }

  pub fn with_smoothing(mut self, smoothing: f64) -> Self {
    self.smoothing = smoothing;
    self
  }

  pub fn with_max_retries(mut self, max_retries: usize) -> Self {
    self.max_retries = max_retries;
    self
  }

  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = seed;
    self
  }

  pub fn batch_size(&self) -> usize {
    self.grid_rows * self.grid_cols
  }

  /// 与视频无关的静态检查
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.batch_size() == 0 {
      return Err(ConfigError::ZeroBatch {
        rows: self.grid_rows,
        cols: self.grid_cols,
      });
    }
    if self.search_nframes == 0 {
      return Err(ConfigError::ZeroFrames);
    }
    self.search_budget.validate()?;
    if let Budget::Absolute(budget) = self.search_budget
      && self.search_nframes > budget
    {
      return Err(ConfigError::TooManyFrames {
        k: self.search_nframes,
        budget,
      });
    }
    if !(self.smoothing.is_finite() && self.smoothing >= 0.0) {
      return Err(ConfigError::InvalidSmoothing(self.smoothing));
    }
    if let Some(threshold) = self.confidence_threshold
      && !threshold.is_finite()
    {
      return Err(ConfigError::InvalidThreshold(threshold));
    }
    Ok(())
  }

  /// 结合视频总帧数得到本次运行的实际参数
  pub fn resolve(&self, total_frame_num: usize) -> Result<ResolvedConfig, ConfigError> {
    self.validate()?;
    if total_frame_num == 0 {
      return Err(ConfigError::EmptyVideo);
    }
    let budget = self.search_budget.resolve(total_frame_num);
    if budget == 0 {
      return Err(ConfigError::ZeroBudget);
    }
    let search_nframes = self.search_nframes.min(total_frame_num);
    if search_nframes > budget {
      return Err(ConfigError::TooManyFrames {
        k: search_nframes,
        budget,
      });
    }
    Ok(ResolvedConfig {
      total_frame_num,
      budget,
      batch_size: self.batch_size(),
      search_nframes,
    })
  }
}

/// 针对具体视频求解后的运行参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedConfig {
  pub total_frame_num: usize,
  pub budget: usize,
  pub batch_size: usize,
  /// 已按总帧数截断的 K
  pub search_nframes: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_budget_parse() {
    assert_eq!("1000".parse::<Budget>(), Ok(Budget::Absolute(1000)));
    assert_eq!("0.5".parse::<Budget>(), Ok(Budget::Fraction(0.5)));
    assert_eq!("1.0".parse::<Budget>(), Ok(Budget::Fraction(1.0)));
    assert_eq!("0".parse::<Budget>(), Err(ConfigError::ZeroBudget));
    assert_eq!("1.5".parse::<Budget>(), Err(ConfigError::InvalidFraction(1.5)));
    assert!(matches!("abc".parse::<Budget>(), Err(ConfigError::ParseBudget(_))));
  }

  #[test]
  fn test_budget_resolve() {
    assert_eq!(Budget::Fraction(0.5).resolve(20), 10);
    assert_eq!(Budget::Fraction(0.5).resolve(21), 10);
    assert_eq!(Budget::Absolute(1000).resolve(300), 300);
    assert_eq!(Budget::Absolute(8).resolve(16), 8);
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let base = SearchConfig::default();
    assert!(base.validate().is_ok());
    assert!(matches!(
      base.clone().with_image_grid_shape(0, 4).validate(),
      Err(ConfigError::ZeroBatch { .. })
    ));
    assert_eq!(
      base.clone().with_search_nframes(0).validate(),
      Err(ConfigError::ZeroFrames)
    );
    assert_eq!(
      base
        .clone()
        .with_search_budget(Budget::Absolute(4))
        .with_search_nframes(8)
        .validate(),
      Err(ConfigError::TooManyFrames { k: 8, budget: 4 })
    );
    assert!(matches!(
      base.clone().with_smoothing(-1.0).validate(),
      Err(ConfigError::InvalidSmoothing(_))
    ));
  }

  #[test]
  fn test_resolve_clamps_k() {
    let config = SearchConfig::default().with_search_budget(Budget::Fraction(1.0));
    let resolved = config.resolve(5).unwrap();
    assert_eq!(resolved.search_nframes, 5);
    assert_eq!(resolved.budget, 5);
    assert_eq!(resolved.batch_size, 16);
  }

  #[test]
  fn test_resolve_rejects_empty_and_zero_budget() {
    let config = SearchConfig::default();
    assert_eq!(config.resolve(0), Err(ConfigError::EmptyVideo));
    let config = config.with_search_budget(Budget::Fraction(0.1));
    assert_eq!(config.resolve(5), Err(ConfigError::ZeroBudget));
  }

  #[test]
  fn test_resolve_rejects_k_above_fractional_budget() {
    let config = SearchConfig::default()
      .with_search_budget(Budget::Fraction(0.5))
      .with_search_nframes(8);
    assert!(config.validate().is_ok());
    assert_eq!(
      config.resolve(10),
      Err(ConfigError::TooManyFrames { k: 8, budget: 5 })
    );
    // K 先按总帧数截断
    let config = config.with_search_budget(Budget::Fraction(1.0));
    assert_eq!(config.resolve(6).map(|r| r.search_nframes), Ok(6));
  }
}
