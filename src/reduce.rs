use std::fmt;
use std::str::FromStr;

use hnsw_rs::prelude::*;
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 降维方法，两种方法相互独立，产物分开持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Pca,
    Umap,
}

impl Method {
    pub const ALL: [Method; 2] = [Method::Pca, Method::Umap];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Pca => "pca",
            Method::Umap => "umap",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ReduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pca" => Ok(Method::Pca),
            "umap" => Ok(Method::Umap),
            _ => Err(ReduceError::UnknownMethod(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReduceError {
    #[error("未知的降维方法: {0}")]
    UnknownMethod(String),
    #[error("输入为空，无法降维")]
    EmptyInput,
}

/// 输出维度固定为 3，用于前端三维散点展示
pub const N_COMPONENTS: usize = 3;

/// 幂迭代轮数，对可视化精度已经绰绰有余
const POWER_ITERS: usize = 100;

/// 把矩阵按列标准化为零均值、单位方差
///
/// 零方差列不做除法，直接置零，保证输出全部为有限值。
pub fn standardize(x: ArrayView2<f32>) -> Array2<f32> {
    let Some(mean) = x.mean_axis(Axis(0)) else {
        return x.to_owned();
    };
    let std = x.std_axis(Axis(0), 0.0);
    let mut out = &x - &mean;
    for (j, s) in std.iter().enumerate() {
        let mut col = out.column_mut(j);
        if *s > f32::EPSILON {
            col.mapv_inplace(|v| v / s);
        } else {
            col.fill(0.0);
        }
    }
    out
}

/// 降维器：矩阵进，3 列矩阵出，每次调用独立拟合
pub trait Reducer: Send + Sync {
    fn method(&self) -> Method;
    fn reduce(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, ReduceError>;
}

/// 精确 PCA，幂迭代 + 逐成分降阶
///
/// 嵌入维度只有几百，协方差矩阵很小，不值得引入 LAPACK。
/// 初始向量是确定性的，同一输入的输出逐位一致。
#[derive(Debug, Default)]
pub struct PcaReducer;

impl Reducer for PcaReducer {
    fn method(&self) -> Method {
        Method::Pca
    }

    fn reduce(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, ReduceError> {
        if x.nrows() == 0 {
            return Err(ReduceError::EmptyInput);
        }
        Ok(pca_project(x, N_COMPONENTS))
    }
}

/// 近邻嵌入：hnsw kNN 图 + 带负采样的随机梯度下降
///
/// 每次调用重新拟合，不复用任何训练状态；hnsw 内部的层分配带随机性，
/// 同一输入的多次输出允许有差异。
#[derive(Debug, Clone)]
pub struct UmapReducer {
    /// kNN 图的近邻数量
    pub n_neighbors: usize,
    /// 梯度下降轮数
    pub epochs: usize,
    /// 负采样随机种子
    pub seed: u64,
}

impl Default for UmapReducer {
    fn default() -> Self {
        Self { n_neighbors: 15, epochs: 200, seed: 42 }
    }
}

impl Reducer for UmapReducer {
    fn method(&self) -> Method {
        Method::Umap
    }

    fn reduce(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, ReduceError> {
        let n = x.nrows();
        if n == 0 {
            return Err(ReduceError::EmptyInput);
        }

        // PCA 初始化比随机初始化收敛快得多
        let mut y = pca_project(x, N_COMPONENTS);
        let max_abs = y.iter().fold(0f32, |m, v| m.max(v.abs()));
        if max_abs > 0.0 {
            y.mapv_inplace(|v| v / max_abs * 10.0);
        }

        let k = self.n_neighbors.min(n - 1);
        if k == 0 {
            return Ok(y);
        }

        let edges = knn_edges(x, k);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let lr0 = 0.1_f32;
        for epoch in 0..self.epochs {
            let alpha = lr0 * (1.0 - epoch as f32 / self.epochs as f32);
            for &(i, j) in &edges {
                // 吸引：沿 kNN 边把近邻拉近
                let (delta, d2) = diff3(&y, i, j);
                let coef = -2.0 * alpha / (1.0 + d2);
                for c in 0..N_COMPONENTS {
                    let step = clip(coef * delta[c]);
                    y[[i, c]] += step;
                    y[[j, c]] -= step;
                }
                // 排斥：随机负采样，把非近邻推远
                let r = rng.random_range(0..n);
                if r == i {
                    continue;
                }
                let (delta, d2) = diff3(&y, i, r);
                let coef = alpha / ((0.1 + d2) * (1.0 + d2));
                for c in 0..N_COMPONENTS {
                    y[[i, c]] += clip(coef * delta[c]);
                }
            }
        }
        Ok(y)
    }
}

fn diff3(y: &Array2<f32>, i: usize, j: usize) -> ([f32; N_COMPONENTS], f32) {
    let mut delta = [0f32; N_COMPONENTS];
    let mut d2 = 0.0;
    for c in 0..N_COMPONENTS {
        let diff = y[[i, c]] - y[[j, c]];
        delta[c] = diff;
        d2 += diff * diff;
    }
    (delta, d2)
}

fn clip(v: f32) -> f32 {
    v.clamp(-4.0, 4.0)
}

/// 用 hnsw 建立 kNN 图，返回有向边 `(i, 近邻)`
fn knn_edges(x: ArrayView2<f32>, k: usize) -> Vec<(usize, usize)> {
    let n = x.nrows();
    let rows: Vec<Vec<f32>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
    let hnsw = Hnsw::<f32, DistL2>::new(16, n, 16, 200, DistL2 {});
    for (i, row) in rows.iter().enumerate() {
        hnsw.insert((row.as_slice(), i));
    }

    let ef = (2 * (k + 1)).max(32);
    let mut edges = Vec::with_capacity(n * k);
    for (i, row) in rows.iter().enumerate() {
        for nb in hnsw.search(row.as_slice(), k + 1, ef) {
            // 查询点自身也会被搜到，跳过
            if nb.d_id != i {
                edges.push((i, nb.d_id));
            }
        }
    }
    edges
}

/// 中心化后投影到前 k 个主成分
pub(crate) fn pca_project(x: ArrayView2<f32>, k: usize) -> Array2<f32> {
    let (n, d) = (x.nrows(), x.ncols());
    if n == 0 || d == 0 {
        return Array2::zeros((n, k));
    }
    let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
    let xc = &x - &mean;
    let denom = (n - 1).max(1) as f32;
    let mut cov = xc.t().dot(&xc) / denom;

    let mut w = Array2::zeros((d, k));
    for c in 0..k {
        let v = power_component(&cov, c);
        let lambda = v.dot(&cov.dot(&v));
        w.column_mut(c).assign(&v);
        // 扣除已提取的成分，下一轮收敛到次大特征值
        let outer = v.view().insert_axis(Axis(1)).dot(&v.view().insert_axis(Axis(0)));
        cov = cov - outer * lambda;
    }
    xc.dot(&w)
}

/// 幂迭代求当前协方差矩阵的主特征向量
fn power_component(cov: &Array2<f32>, ord: usize) -> Array1<f32> {
    let d = cov.nrows();
    // 确定性初始化，错开各成分的起点
    let mut v = Array1::from_shape_fn(d, |i| ((i + ord + 1) as f32).sin() + 1e-3);
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v /= norm;
    }
    for _ in 0..POWER_ITERS {
        let next = cov.dot(&v);
        let norm = next.dot(&next).sqrt();
        if norm <= 1e-12 {
            break;
        }
        v = next / norm;
    }
    v
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn toy_matrix(n: usize, d: usize, seed: u64) -> Array2<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((n, d), |_| rng.random_range(-1.0..1.0))
    }

    #[test]
    fn method_parsing() {
        assert_eq!("pca".parse::<Method>(), Ok(Method::Pca));
        assert_eq!("umap".parse::<Method>(), Ok(Method::Umap));
        assert_eq!(
            "tsne".parse::<Method>(),
            Err(ReduceError::UnknownMethod("tsne".to_string()))
        );
    }

    #[test]
    fn standardize_centers_and_scales() {
        let x = toy_matrix(200, 4, 1);
        let z = standardize(x.view());
        for j in 0..4 {
            let col = z.column(j);
            let mean = col.mean().unwrap();
            let var = col.mapv(|v| v * v).mean().unwrap() - mean * mean;
            assert!(mean.abs() < 1e-4);
            assert!((var - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn standardize_survives_constant_column() {
        // 零方差列不允许除零，也不允许产生非有限值
        let mut x = toy_matrix(50, 3, 2);
        x.column_mut(1).fill(7.5);
        let z = standardize(x.view());
        assert!(z.iter().all(|v| v.is_finite()));
        assert!(z.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn pca_shape_and_determinism() {
        let x = standardize(toy_matrix(100, 16, 3).view());
        let a = PcaReducer.reduce(x.view()).unwrap();
        let b = PcaReducer.reduce(x.view()).unwrap();
        assert_eq!(a.shape(), &[100, 3]);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn pca_finds_dominant_direction() {
        // 数据沿一条线分布，第一主成分应当解释绝大部分方差
        let mut rng = StdRng::seed_from_u64(4);
        let x = Array2::from_shape_fn((300, 8), |(i, j)| {
            let t = i as f32 / 300.0 - 0.5;
            if j == 0 { t * 10.0 } else { rng.random_range(-0.01..0.01) }
        });
        let y = PcaReducer.reduce(x.view()).unwrap();
        let var = |col: ndarray::ArrayView1<f32>| {
            let m = col.mean().unwrap();
            col.mapv(|v| (v - m) * (v - m)).mean().unwrap()
        };
        assert!(var(y.column(0)) > 100.0 * var(y.column(1)));
    }

    #[test]
    fn pca_rejects_empty_input() {
        let x = Array2::<f32>::zeros((0, 8));
        assert_eq!(PcaReducer.reduce(x.view()), Err(ReduceError::EmptyInput));
    }

    #[test]
    fn umap_shape_and_finiteness() {
        let x = standardize(toy_matrix(60, 16, 5).view());
        let y = UmapReducer::default().reduce(x.view()).unwrap();
        assert_eq!(y.shape(), &[60, 3]);
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn umap_single_sample() {
        let x = toy_matrix(1, 16, 6);
        let y = UmapReducer::default().reduce(x.view()).unwrap();
        assert_eq!(y.shape(), &[1, 3]);
    }
}
