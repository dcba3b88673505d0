use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use super::service::ProviderFactory;
use super::{
    Capability, DeleteResult, DeliveryProvider, DeliveryResult, UploadOptions, UploadResult,
};

/// Directory-backed provider / 基于本地目录的提供方
///
/// Blobs are plain files under `root`; the object URL is the stored
/// filename, so the URL returned by `upload` feeds straight back into
/// `download`/`exists`/`delete`.
/// 数据以普通文件形式存放在 `root` 下；对象 URL 就是存储文件名，
/// `upload` 返回的 URL 可直接用于后续操作。
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// 将对象键解析为 root 下的路径，拒绝越出 root 的键
    fn resolve_key(&self, key: &str) -> anyhow::Result<PathBuf> {
        let key = key.trim_start_matches('/').replace('\\', "/");

        let mut normalized = PathBuf::new();
        for component in Path::new(&key).components() {
            match component {
                Component::Normal(name) => normalized.push(name),
                Component::CurDir => {}
                _ => return Err(anyhow!("key escapes storage root: {}", key)),
            }
        }

        if normalized.as_os_str().is_empty() {
            return Err(anyhow!("empty object key"));
        }

        Ok(self.root.join(normalized))
    }
}

#[async_trait]
impl DeliveryProvider for LocalProvider {
    fn capabilities(&self) -> Capability {
        Capability {
            can_delete: true,
            max_file_size: None,
        }
    }

    async fn upload(&self, data: Bytes, options: UploadOptions) -> DeliveryResult<UploadResult> {
        let key = options
            .filename
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let path = self.resolve_key(&key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(anyhow::Error::from)?;
        }
        fs::write(&path, &data).await.map_err(anyhow::Error::from)?;

        let mut metadata = HashMap::new();
        metadata.insert("size".to_string(), Value::from(data.len() as u64));
        metadata.insert("uploaded_at".to_string(), Value::from(Utc::now().to_rfc3339()));
        if let Some(content_type) = options.effective_content_type() {
            metadata.insert("content_type".to_string(), Value::from(content_type));
        }

        Ok(UploadResult {
            url: key.clone(),
            id: Some(key),
            metadata: Some(metadata),
        })
    }

    async fn download(&self, url: &str) -> DeliveryResult<Bytes> {
        let path = self.resolve_key(url)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| anyhow!("read {}: {}", url, e))?;
        Ok(Bytes::from(data))
    }

    async fn exists(&self, url: &str) -> DeliveryResult<bool> {
        let path = match self.resolve_key(url) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };
        Ok(fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false))
    }

    async fn delete(&self, url: &str) -> DeliveryResult<DeleteResult> {
        let path = self.resolve_key(url)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(DeleteResult {
                success: true,
                message: None,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DeleteResult {
                success: false,
                message: Some(format!("object not found: {}", url)),
            }),
            Err(e) => Err(anyhow::Error::from(e).into()),
        }
    }
}

pub struct LocalProviderFactory;

impl ProviderFactory for LocalProviderFactory {
    fn provider_type(&self) -> &'static str {
        "local"
    }

    fn create_provider(&self, settings: Value) -> anyhow::Result<Box<dyn DeliveryProvider>> {
        let root = settings
            .get("root")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("missing root setting"))?;

        let root = PathBuf::from(root);
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }
        let canonical_root = root.canonicalize()?;

        tracing::info!("Local provider initialized, root: {:?}", canonical_root);

        Ok(Box::new(LocalProvider::new(canonical_root)))
    }
}
