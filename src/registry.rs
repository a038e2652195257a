use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use log::info;
use ndarray::Array2;
use ndarray_npy::read_npy;
use thiserror::Error;

use crate::reduce::Method;
use crate::workspace::DatasetWorkspace;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("数据集不存在: {0}")]
    DatasetNotFound(String),
    #[error("数据集产物不存在: {0}")]
    ArtifactNotFound(String),
}

/// 可按句柄读取的数据集产物
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    PcaFeatures,
    UmapFeatures,
    Tilemap,
}

impl ArtifactKind {
    fn path_in(&self, ws: &DatasetWorkspace) -> PathBuf {
        match self {
            ArtifactKind::PcaFeatures => ws.reduced_features(Method::Pca),
            ArtifactKind::UmapFeatures => ws.reduced_features(Method::Umap),
            ArtifactKind::Tilemap => ws.tilemap(),
        }
    }
}

/// 句柄到已处理数据集工作目录的映射
///
/// 进程生命周期内只增不减，没有过期策略；重启后由磁盘上的残留目录
/// 自行回收（运维事项，不在服务职责内）。
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    inner: RwLock<HashMap<String, DatasetWorkspace>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个摄取完成的数据集
    ///
    /// 句柄来自内容哈希，同一压缩包重复上传会命中同一句柄，视为幂等。
    pub fn register(&self, handle: String, workspace: DatasetWorkspace) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.insert(handle.clone(), workspace).is_none() {
            info!("注册数据集 {handle}，当前共 {} 个", inner.len());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, handle: &str) -> Result<DatasetWorkspace, RegistryError> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(handle)
            .cloned()
            .ok_or_else(|| RegistryError::DatasetNotFound(handle.to_string()))
    }

    /// 读取产物的原始字节（tilemap 走这里）
    pub fn read_artifact(&self, handle: &str, kind: ArtifactKind) -> Result<Vec<u8>, RegistryError> {
        let ws = self.lookup(handle)?;
        let path = kind.path_in(&ws);
        fs::read(&path).map_err(|_| RegistryError::ArtifactNotFound(path.display().to_string()))
    }

    /// 读取持久化的降维矩阵
    pub fn read_features(&self, handle: &str, method: Method) -> Result<Array2<f32>, RegistryError> {
        let ws = self.lookup(handle)?;
        let path = ws.reduced_features(method);
        read_npy(&path).map_err(|_| RegistryError::ArtifactNotFound(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use ndarray_npy::write_npy;

    use super::*;

    #[test]
    fn lookup_unknown_handle() {
        let registry = DatasetRegistry::new();
        assert!(matches!(registry.lookup("deadbeef"), Err(RegistryError::DatasetNotFound(_))));
        assert!(matches!(
            registry.read_artifact("deadbeef", ArtifactKind::Tilemap),
            Err(RegistryError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn read_registered_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let ws = DatasetWorkspace::create(dir.path().join("ws")).unwrap();
        fs::write(ws.tilemap(), b"jpeg").unwrap();
        let features = Array2::<f32>::zeros((5, 3));
        write_npy(ws.reduced_features(Method::Pca), &features).unwrap();

        let registry = DatasetRegistry::new();
        registry.register("abc123".to_string(), ws);
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.read_artifact("abc123", ArtifactKind::Tilemap).unwrap(), b"jpeg");
        assert_eq!(registry.read_features("abc123", Method::Pca).unwrap().shape(), &[5, 3]);
        // umap 产物还没写入
        assert!(matches!(
            registry.read_features("abc123", Method::Umap),
            Err(RegistryError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn re_register_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = DatasetWorkspace::create(dir.path().join("ws")).unwrap();
        let registry = DatasetRegistry::new();
        registry.register("h".to_string(), ws.clone());
        registry.register("h".to_string(), ws);
        assert_eq!(registry.len(), 1);
    }
}
