use std::collections::BTreeMap;

use thiserror::Error;

/// 每个 tilemap 对应的图片数量，与 montage 网格（10 列 × 100 行）一致
pub const TILE_CAPACITY: usize = 1000;

/// tilemap 范围查询错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("无效的 tilemap 编号: {0}")]
    InvalidTilemap(String),
    #[error("无效的范围: {0} > {1}")]
    InvalidRange(String, String),
}

/// 将参考数据集按固定大小划分为若干个 tilemap 的索引
///
/// 编号为三位零填充字符串，范围统一采用左闭右开区间 `[start, end)`。
/// 由数据集大小唯一确定，启动时计算一次，之后只读。
#[derive(Debug, Clone)]
pub struct TileRanges {
    ranges: BTreeMap<String, (usize, usize)>,
    total: usize,
}

impl TileRanges {
    pub fn new(total: usize) -> Self {
        let mut ranges = BTreeMap::new();
        let mut start = 0;
        while start < total {
            let end = (start + TILE_CAPACITY).min(total);
            ranges.insert(format!("{:03}", start / TILE_CAPACITY), (start, end));
            start = end;
        }
        Self { ranges, total }
    }

    /// 参考数据集的图片总数
    pub fn total(&self) -> usize {
        self.total
    }

    /// tilemap 数量
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// 单个 tilemap 的索引范围
    pub fn get(&self, id: &str) -> Option<(usize, usize)> {
        self.ranges.get(id).copied()
    }

    /// 编号有序的完整范围表，用于 `/dataset/info`
    pub fn as_map(&self) -> &BTreeMap<String, (usize, usize)> {
        &self.ranges
    }

    /// 将 `[start_id, end_id]` 的 tilemap 区间解析为特征集合的切片边界
    ///
    /// 各 tilemap 连续且互不重叠，因此并集即 `[ranges[start].0, ranges[end].1)`。
    pub fn resolve(&self, start_id: &str, end_id: &str) -> Result<(usize, usize), RangeError> {
        let (start, _) = self
            .get(start_id)
            .ok_or_else(|| RangeError::InvalidTilemap(start_id.to_string()))?;
        let (_, end) =
            self.get(end_id).ok_or_else(|| RangeError::InvalidTilemap(end_id.to_string()))?;
        if start >= end {
            return Err(RangeError::InvalidRange(start_id.to_string(), end_id.to_string()));
        }
        Ok((start, end))
    }

    /// 枚举 `[start_id, end_id]` 闭区间内的所有 tilemap 编号，升序排列
    pub fn ids_in_range(&self, start_id: &str, end_id: &str) -> Result<Vec<String>, RangeError> {
        let first = self.parse_id(start_id)?;
        let last = self.parse_id(end_id)?;
        if first > last {
            return Err(RangeError::InvalidRange(start_id.to_string(), end_id.to_string()));
        }
        Ok((first..=last).map(|i| format!("{i:03}")).collect())
    }

    fn parse_id(&self, id: &str) -> Result<usize, RangeError> {
        if !self.ranges.contains_key(id) {
            return Err(RangeError::InvalidTilemap(id.to_string()));
        }
        id.parse().map_err(|_| RangeError::InvalidTilemap(id.to_string()))
    }
}
