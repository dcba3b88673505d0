use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Shared HTTP client for the fallback behaviors / 回退行为共享的 HTTP 客户端
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Result type for all provider operations / 所有提供方操作的结果类型
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Caller-facing error taxonomy / 面向调用方的错误分类
///
/// Backend-specific errors travel through the transparent `Backend` variant
/// so their original diagnostic detail survives unwrapped.
/// 后端自身的错误通过透明的 `Backend` 变体原样传递，不做包装。
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Requested name absent from the registry / 注册表中没有该名称
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// Name-omitting call with no active selection / 省略名称但未设置活动提供方
    #[error("no active provider selected")]
    NoActiveProvider,

    /// Provider lacks an optional capability / 提供方不具备该可选能力
    #[error("operation `{0}` is not supported by this provider")]
    UnsupportedOperation(&'static str),

    /// Fallback download got a non-success response / 回退下载收到非成功响应
    #[error("download failed: {status}")]
    DownloadFailed { status: String },

    /// No factory registered for the requested type / 没有该类型的工厂
    #[error("unknown provider type: {0}")]
    UnknownProviderType(String),

    /// Payload exceeds the provider's declared ceiling / 负载超过提供方声明的上限
    #[error("payload of {size} bytes exceeds provider limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Provider capability declaration / 提供方能力声明
///
/// Dispatch branches on these flags instead of calling an operation and
/// catching an "unsupported" failure. A provider that overrides `delete`
/// must also flip `can_delete`.
/// 调度层根据声明分支，而不是先调用再捕获"不支持"错误。
/// 覆写 `delete` 的提供方必须同时置位 `can_delete`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Supports object deletion / 支持删除对象
    pub can_delete: bool,
    /// Maximum payload size (None means no limit) / 最大负载大小（None 表示无限制）
    pub max_file_size: Option<u64>,
}

impl Default for Capability {
    fn default() -> Self {
        Self {
            can_delete: false,
            max_file_size: None,
        }
    }
}

/// Upload request options / 上传请求选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filename(mut self, val: &str) -> Self {
        self.filename = Some(val.to_string());
        self
    }

    pub fn content_type(mut self, val: &str) -> Self {
        self.content_type = Some(val.to_string());
        self
    }

    pub fn metadata_entry(mut self, key: &str, val: &str) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), val.to_string());
        self
    }

    /// Explicit MIME type, or a guess from the filename / 显式 MIME 类型，否则按文件名推断
    pub fn effective_content_type(&self) -> Option<String> {
        if self.content_type.is_some() {
            return self.content_type.clone();
        }
        self.filename
            .as_deref()
            .map(|name| mime_guess::from_path(name).first_or_octet_stream().to_string())
    }
}

/// Upload result / 上传结果
///
/// `url` identifies the stored object for subsequent operations on the
/// same provider. / `url` 标识已存储对象，供同一提供方的后续操作使用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Delete result / 删除结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Upload payload, text or raw bytes / 上传负载，文本或原始字节
///
/// Text is normalized to UTF-8 bytes before it reaches a provider.
/// 文本在转发给提供方之前统一编码为 UTF-8 字节。
#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Raw(Bytes),
}

impl Payload {
    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Text(text) => Bytes::from(text.into_bytes()),
            Payload::Raw(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Raw(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Raw(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Raw(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Raw(Bytes::copy_from_slice(bytes))
    }
}

/// Content delivery provider interface / 内容分发提供方接口
///
/// `upload` is the one mandatory operation. `download` and `exists` carry
/// network fallbacks that treat the uploaded URL as a plain fetchable
/// address; `delete` is optional and gated by the capability declaration.
/// `upload` 是唯一必须实现的操作。`download` 与 `exists` 带有网络回退实现，
/// 把上传返回的 URL 当作可直接访问的地址；`delete` 可选，由能力声明控制。
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// Provider capabilities / 提供方能力
    fn capabilities(&self) -> Capability {
        Capability::default()
    }

    /// Store a blob. The returned `url` must be usable as input to
    /// `download`/`exists`/`delete` on this same provider.
    /// 存储数据。返回的 `url` 必须可作为同一提供方后续操作的输入。
    async fn upload(&self, data: Bytes, options: UploadOptions) -> DeliveryResult<UploadResult>;

    /// Fetch a blob. Fallback: plain HTTP GET against `url`.
    /// 获取数据。回退实现：对 `url` 发起 HTTP GET。
    async fn download(&self, url: &str) -> DeliveryResult<Bytes> {
        let response = HTTP_CLIENT
            .get(url)
            .send()
            .await
            .map_err(anyhow::Error::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::DownloadFailed {
                status: status.canonical_reason().unwrap_or(status.as_str()).to_string(),
            });
        }
        Ok(response.bytes().await.map_err(anyhow::Error::from)?)
    }

    /// Probe a blob. Fallback: HTTP HEAD against `url`; every failure —
    /// non-success status and transport errors alike — maps to `false`.
    /// 探测数据是否存在。回退实现：HTTP HEAD；任何失败（非成功状态码
    /// 或网络错误）都返回 `false`，绝不抛错。
    async fn exists(&self, url: &str) -> DeliveryResult<bool> {
        match HTTP_CLIENT.head(url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Remove a blob. Optional; the default body is the backstop for direct
    /// trait users — dispatch refuses earlier via `capabilities()`.
    /// 删除数据。可选能力；默认实现仅作兜底，调度层会先按能力声明拒绝。
    async fn delete(&self, _url: &str) -> DeliveryResult<DeleteResult> {
        Err(DeliveryError::UnsupportedOperation("delete"))
    }
}

impl std::fmt::Debug for dyn DeliveryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn DeliveryProvider")
    }
}

pub mod local;
pub mod registry;
pub mod service;

pub use local::{LocalProvider, LocalProviderFactory};
pub use registry::{ProviderBox, ProviderRegistry};
pub use service::{DeliveryService, ProviderFactory};
