use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use ndarray::prelude::*;
use ndarray_npy::read_npy;

use crate::config::DataDir;
use crate::range::TileRanges;

/// 启动时加载的静态参考数据集
///
/// 特征矩阵和逐 tilemap 的预渲染图都是只读输入，进程生命周期内不变，
/// 可以无锁并发读取。
pub struct StaticCorpus {
    features: Array2<f32>,
    ranges: TileRanges,
    tilemaps_dir: PathBuf,
}

impl StaticCorpus {
    pub fn load(data_dir: &DataDir) -> Result<Self> {
        let path = data_dir.features_npy();
        let features: Array2<f32> = read_npy(&path)
            .with_context(|| format!("无法加载参考特征矩阵 {}", path.display()))?;
        let ranges = TileRanges::new(features.nrows());
        info!("参考特征矩阵已加载：{} × {}，共 {} 个 tilemap",
            features.nrows(), features.ncols(), ranges.len());
        Ok(Self { features, ranges, tilemaps_dir: data_dir.tilemaps() })
    }

    pub fn total(&self) -> usize {
        self.features.nrows()
    }

    pub fn ranges(&self) -> &TileRanges {
        &self.ranges
    }

    /// 取 `[start, end)` 的特征切片
    pub fn slice(&self, start: usize, end: usize) -> ArrayView2<'_, f32> {
        self.features.slice(s![start..end, ..])
    }

    /// 指定 tilemap 的预渲染图片路径，编号不在范围表内返回 `None`
    ///
    /// 编号先经范围表校验再拼接路径，任意字符串不会触达文件系统。
    pub fn tilemap_path(&self, id: &str) -> Option<PathBuf> {
        self.ranges.get(id)?;
        Some(self.tilemaps_dir.join(format!("tilemap-{id}.jpg")))
    }
}
