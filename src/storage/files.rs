use crate::utils::error::TriageError;
use crate::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// 上传影像的存储（外部协作者）
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// 保存影像，返回之后可用于定位该影像的引用
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<String>;

    /// 按引用读回影像；不存在时返回 `TriageError::ImageNotFound`
    async fn load(&self, image_ref: &str) -> Result<Vec<u8>>;

    /// 删除影像；不存在时为空操作
    async fn remove(&self, image_ref: &str) -> Result<()>;
}

/// 本地目录影像存储
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            TriageError::StorageUnavailable(format!(
                "cannot create uploads directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 引用对应的磁盘路径；拒绝带路径分隔符或 `..` 的引用
    pub fn resolve(&self, image_ref: &str) -> Result<PathBuf> {
        if image_ref.is_empty()
            || image_ref.contains(['/', '\\'])
            || image_ref == "."
            || image_ref == ".."
        {
            return Err(TriageError::InvalidInput(format!(
                "invalid image reference: {}",
                image_ref
            )));
        }
        Ok(self.root.join(image_ref))
    }
}

/// 只保留文件名部分，非 [A-Za-z0-9._-] 字符替换为 `_`
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[async_trait::async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let image_ref = format!("{}_{}", Uuid::new_v4().simple(), sanitize_filename(filename));
        let path = self.resolve(&image_ref)?;

        tokio::fs::write(&path, bytes).await.map_err(|e| {
            TriageError::StorageUnavailable(format!("failed to store image {}: {}", path.display(), e))
        })?;

        tracing::debug!("Stored image {} ({} bytes)", image_ref, bytes.len());
        Ok(image_ref)
    }

    async fn load(&self, image_ref: &str) -> Result<Vec<u8>> {
        let path = self.resolve(image_ref)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TriageError::ImageNotFound(image_ref.to_string()))
            }
            Err(e) => Err(TriageError::StorageUnavailable(format!(
                "failed to read image {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn remove(&self, image_ref: &str) -> Result<()> {
        let path = self.resolve(image_ref)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TriageError::StorageUnavailable(format!(
                "failed to remove image {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
