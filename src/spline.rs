// 该文件是 Xunzhen （寻帧） 项目的一部分。
// src/spline.rs - 三次平滑样条
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

//! 带惩罚项的三次平滑样条（Reinsch 形式）。
//!
//! 最小化 `Σ (y_i - f(x_i))² + λ ∫ f''(t)² dt`，自然边界条件，
//! 节点区间之外按端点斜率线性外推。

/// 拟合后的平滑样条
#[derive(Debug, Clone)]
pub struct SmoothingSpline {
  /// 节点横坐标（严格递增）
  knots: Box<[f64]>,
  /// 节点处的平滑值
  values: Box<[f64]>,
  /// 节点处的二阶导数，两端为 0
  curvature: Box<[f64]>,
}

impl SmoothingSpline {
  /// 拟合平滑样条。
  ///
  /// `points` 须按横坐标严格递增排列，且至少包含 2 个点，
  /// 否则返回 `None`。`lambda` 为 0 时退化为自然三次插值样条。
  pub fn fit(points: &[(f64, f64)], lambda: f64) -> Option<Self> {
    let n = points.len();
    if n < 2 {
      return None;
    }
    if points.windows(2).any(|w| w[1].0 <= w[0].0) {
      return None;
    }

    let x: Vec<f64> = points.iter().map(|p| p.0).collect();
    let y: Vec<f64> = points.iter().map(|p| p.1).collect();

    if n == 2 {
      // 两点时直线的曲率惩罚为 0，残差也为 0
      return Some(Self {
        knots: x.into_boxed_slice(),
        values: y.into_boxed_slice(),
        curvature: vec![0.0; 2].into_boxed_slice(),
      });
    }

    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let m = n - 2;

    // Q 的第 j 列在第 j, j+1, j+2 行非零
    let qa: Vec<f64> = (0..m).map(|j| 1.0 / h[j]).collect();
    let qb: Vec<f64> = (0..m).map(|j| -1.0 / h[j] - 1.0 / h[j + 1]).collect();
    let qc: Vec<f64> = (0..m).map(|j| 1.0 / h[j + 1]).collect();

    // A = R + λ QᵀQ，对称五对角
    let mut diag = vec![0.0; m];
    let mut off1 = vec![0.0; m];
    let mut off2 = vec![0.0; m];
    for j in 0..m {
      diag[j] = (h[j] + h[j + 1]) / 3.0 + lambda * (qa[j] * qa[j] + qb[j] * qb[j] + qc[j] * qc[j]);
      if j + 1 < m {
        off1[j] = h[j + 1] / 6.0 + lambda * (qb[j] * qa[j + 1] + qc[j] * qb[j + 1]);
      }
      if j + 2 < m {
        off2[j] = lambda * qc[j] * qa[j + 2];
      }
    }

    let rhs: Vec<f64> = (0..m)
      .map(|j| qa[j] * y[j] + qb[j] * y[j + 1] + qc[j] * y[j + 2])
      .collect();

    let gamma = solve_pentadiagonal(&diag, &off1, &off2, &rhs)?;

    // g = y - λ Q γ
    let mut values = y.clone();
    for (k, value) in values.iter_mut().enumerate() {
      let mut q_gamma = 0.0;
      if k < m {
        q_gamma += qa[k] * gamma[k];
      }
      if k >= 1 && k - 1 < m {
        q_gamma += qb[k - 1] * gamma[k - 1];
      }
      if k >= 2 && k - 2 < m {
        q_gamma += qc[k - 2] * gamma[k - 2];
      }
      *value -= lambda * q_gamma;
    }

    let mut curvature = vec![0.0; n];
    curvature[1..n - 1].copy_from_slice(&gamma);

    Some(Self {
      knots: x.into_boxed_slice(),
      values: values.into_boxed_slice(),
      curvature: curvature.into_boxed_slice(),
    })
  }

  /// 在任意位置求值
  pub fn evaluate(&self, t: f64) -> f64 {
    let x = &self.knots;
    let g = &self.values;
    let c = &self.curvature;
    let n = x.len();

    if t <= x[0] {
      let h = x[1] - x[0];
      let slope = (g[1] - g[0]) / h - h * c[1] / 6.0;
      return g[0] + slope * (t - x[0]);
    }
    if t >= x[n - 1] {
      let h = x[n - 1] - x[n - 2];
      let slope = (g[n - 1] - g[n - 2]) / h + h * c[n - 2] / 6.0;
      return g[n - 1] + slope * (t - x[n - 1]);
    }

    // 第一个满足 x[i] > t 的位置
    let upper = x.partition_point(|&k| k <= t);
    let i = upper - 1;
    let h = x[i + 1] - x[i];
    let left = t - x[i];
    let right = x[i + 1] - t;

    (left * g[i + 1] + right * g[i]) / h
      - left * right / 6.0 * ((1.0 + left / h) * c[i + 1] + (1.0 + right / h) * c[i])
  }
}

/// 对称正定五对角方程组的带状 Cholesky 求解
fn solve_pentadiagonal(diag: &[f64], off1: &[f64], off2: &[f64], rhs: &[f64]) -> Option<Vec<f64>> {
  let m = diag.len();
  let mut d = vec![0.0; m];
  let mut e1 = vec![0.0; m];
  let mut e2 = vec![0.0; m];

  for i in 0..m {
    let mut pivot = diag[i];
    if i >= 1 {
      pivot -= e1[i - 1] * e1[i - 1];
    }
    if i >= 2 {
      pivot -= e2[i - 2] * e2[i - 2];
    }
    if !(pivot > 0.0) {
      return None;
    }
    d[i] = pivot.sqrt();

    let mut next = off1[i];
    if i >= 1 {
      next -= e2[i - 1] * e1[i - 1];
    }
    e1[i] = next / d[i];
    e2[i] = off2[i] / d[i];
  }

  let mut z = vec![0.0; m];
  for i in 0..m {
    let mut acc = rhs[i];
    if i >= 1 {
      acc -= e1[i - 1] * z[i - 1];
    }
    if i >= 2 {
      acc -= e2[i - 2] * z[i - 2];
    }
    z[i] = acc / d[i];
  }

  let mut out = vec![0.0; m];
  for i in (0..m).rev() {
    let mut acc = z[i];
    if i + 1 < m {
      acc -= e1[i] * out[i + 1];
    }
    if i + 2 < m {
      acc -= e2[i] * out[i + 2];
    }
    out[i] = acc / d[i];
  }

  Some(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPS: f64 = 1e-9;

  #[test]
  fn test_rejects_too_few_points() {
    assert!(SmoothingSpline::fit(&[], 0.1).is_none());
    assert!(SmoothingSpline::fit(&[(0.0, 1.0)], 0.1).is_none());
  }

  #[test]
  fn test_rejects_unsorted_points() {
    assert!(SmoothingSpline::fit(&[(1.0, 0.0), (0.0, 1.0), (2.0, 1.0)], 0.1).is_none());
  }

  #[test]
  fn test_two_points_is_a_line() {
    let spline = SmoothingSpline::fit(&[(0.0, 0.0), (2.0, 1.0)], 10.0).unwrap();
    assert!((spline.evaluate(1.0) - 0.5).abs() < EPS);
    assert!((spline.evaluate(4.0) - 2.0).abs() < EPS);
    assert!((spline.evaluate(-2.0) + 1.0).abs() < EPS);
  }

  #[test]
  fn test_linear_data_is_reproduced_for_any_lambda() {
    let points: Vec<(f64, f64)> = [0.0, 1.0, 3.0, 4.0, 7.0]
      .iter()
      .map(|&x| (x, 0.25 * x + 0.1))
      .collect();
    for lambda in [0.0, 0.01, 1.0, 100.0] {
      let spline = SmoothingSpline::fit(&points, lambda).unwrap();
      for t in [-1.0, 0.5, 2.0, 5.5, 9.0] {
        assert!((spline.evaluate(t) - (0.25 * t + 0.1)).abs() < 1e-7);
      }
    }
  }

  #[test]
  fn test_zero_lambda_interpolates() {
    let points = [(0.0, 0.0), (1.0, 1.0), (2.0, 0.0), (3.0, 1.0)];
    let spline = SmoothingSpline::fit(&points, 0.0).unwrap();
    for &(x, y) in points.iter() {
      assert!((spline.evaluate(x) - y).abs() < 1e-9);
    }
  }

  #[test]
  fn test_smoothing_damps_outlier() {
    let points = [(0.0, 0.0), (1.0, 0.0), (2.0, 1.0), (3.0, 0.0), (4.0, 0.0)];
    let exact = SmoothingSpline::fit(&points, 0.0).unwrap();
    let smooth = SmoothingSpline::fit(&points, 1.0).unwrap();
    assert!(smooth.evaluate(2.0) < exact.evaluate(2.0));
    assert!(smooth.evaluate(2.0) > 0.0);
  }

  #[test]
  fn test_large_lambda_approaches_regression_line() {
    let points = [(0.0, 1.0), (1.0, 0.0), (2.0, 1.0), (3.0, 0.0)];
    let spline = SmoothingSpline::fit(&points, 1e6).unwrap();
    // 最小二乘直线 y = 0.8 - 0.2x
    assert!((spline.evaluate(0.0) - 0.8).abs() < 1e-3);
    assert!((spline.evaluate(3.0) - 0.2).abs() < 1e-3);
  }
}
