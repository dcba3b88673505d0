use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::DeliveryConfig;

use super::registry::{ProviderBox, ProviderRegistry};
use super::{
    DeleteResult, DeliveryError, DeliveryProvider, DeliveryResult, Payload, UploadOptions,
    UploadResult,
};

/// Provider factory trait / 提供方工厂 trait
///
/// Settings arrive as raw JSON; the core hands them over without parsing
/// or validating their shape. / 配置以原始 JSON 传入，核心不解析不校验。
pub trait ProviderFactory: Send + Sync {
    /// Provider type name / 提供方类型名称
    fn provider_type(&self) -> &'static str;

    /// 根据配置创建提供方实例
    fn create_provider(&self, settings: serde_json::Value) -> anyhow::Result<Box<dyn DeliveryProvider>>;
}

/// Dispatch facade over the provider registry / 提供方注册表之上的调度门面
///
/// Every operation takes `provider: Option<&str>` — `Some(name)` targets the
/// named entry, `None` targets the active selection. Cheap to clone; inject
/// an instance instead of reaching for global state.
/// 每个操作都带 `provider: Option<&str>` 参数——`Some(name)` 指向具名条目，
/// `None` 指向活动选择。克隆开销极小，按实例注入而不是依赖全局状态。
#[derive(Clone)]
pub struct DeliveryService {
    registry: ProviderRegistry,
    factories: Arc<RwLock<HashMap<String, Arc<Box<dyn ProviderFactory>>>>>,
}

impl DeliveryService {
    pub fn new() -> Self {
        Self::with_registry(ProviderRegistry::new())
    }

    pub fn with_registry(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            factories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Register a provider factory / 注册提供方工厂
    pub async fn register_factory(&self, factory: Box<dyn ProviderFactory>) -> anyhow::Result<()> {
        let provider_type = factory.provider_type().to_string();
        let mut factories = self.factories.write().await;
        factories.insert(provider_type.clone(), Arc::new(factory));
        drop(factories);

        tracing::info!("Provider factory registered: {}", provider_type);
        Ok(())
    }

    /// List all registered factory types / 列出所有已注册的工厂类型
    pub async fn factory_types(&self) -> Vec<String> {
        let factories = self.factories.read().await;
        factories.keys().cloned().collect()
    }

    /// Build a provider through its factory and register it under `name`
    /// 通过工厂构建提供方实例并以 `name` 注册
    pub async fn create_provider(
        &self,
        name: impl Into<String>,
        provider_type: &str,
        settings: serde_json::Value,
    ) -> DeliveryResult<()> {
        let name = name.into();
        let factories = self.factories.read().await;
        let factory = factories
            .get(provider_type)
            .cloned()
            .ok_or_else(|| DeliveryError::UnknownProviderType(provider_type.to_string()))?;
        drop(factories);

        match factory.create_provider(settings) {
            Ok(provider) => {
                self.registry.register(name.clone(), provider).await;
                tracing::info!("Provider created: {} ({})", name, provider_type);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Provider creation failed: {} ({}) - {}", name, provider_type, e);
                Err(DeliveryError::Backend(e))
            }
        }
    }

    /// Instantiate every configured provider, then apply the configured
    /// active selection. / 实例化配置中的所有提供方，再应用活动选择。
    pub async fn apply_config(&self, config: &DeliveryConfig) -> DeliveryResult<()> {
        for entry in &config.providers {
            self.create_provider(entry.name.clone(), &entry.provider_type, entry.settings.clone())
                .await?;
        }
        if let Some(active) = &config.active {
            self.registry.set_active(active).await?;
        }
        Ok(())
    }

    async fn resolve(&self, provider: Option<&str>) -> DeliveryResult<ProviderBox> {
        match provider {
            Some(name) => self.registry.get(name).await,
            None => self.registry.get_active().await,
        }
    }

    /// Upload a blob / 上传数据
    ///
    /// Text payloads are encoded as UTF-8 bytes before forwarding. Registry
    /// and backend failures both propagate as-is.
    /// 文本负载先编码为 UTF-8 字节再转发。注册表与后端的失败都原样传出。
    pub async fn upload(
        &self,
        provider: Option<&str>,
        data: impl Into<Payload>,
        options: UploadOptions,
    ) -> DeliveryResult<UploadResult> {
        let target = self.resolve(provider).await?;
        let bytes = data.into().into_bytes();

        if let Some(limit) = target.capabilities().max_file_size {
            if bytes.len() as u64 > limit {
                return Err(DeliveryError::PayloadTooLarge {
                    size: bytes.len() as u64,
                    limit,
                });
            }
        }

        target.upload(bytes, options).await
    }

    /// Download a blob via the effective `download` (override or fallback)
    /// 通过生效的 `download`（覆写或回退）获取数据
    pub async fn download(&self, provider: Option<&str>, url: &str) -> DeliveryResult<Bytes> {
        let target = self.resolve(provider).await?;
        target.download(url).await
    }

    /// Probe a blob. Resolution failures yield `false` instead of an error:
    /// existence is a probe, not a mutation.
    /// 探测数据是否存在。解析失败返回 `false` 而不是错误：存在性检查是
    /// 探针，不是变更操作。
    pub async fn exists(&self, provider: Option<&str>, url: &str) -> DeliveryResult<bool> {
        let target = match self.resolve(provider).await {
            Ok(target) => target,
            Err(DeliveryError::ProviderNotFound(_)) | Err(DeliveryError::NoActiveProvider) => {
                return Ok(false)
            }
            Err(e) => return Err(e),
        };
        target.exists(url).await
    }

    /// Delete a blob. Refused up front when the provider does not declare
    /// the capability. / 删除数据。提供方未声明该能力时直接拒绝。
    pub async fn delete(&self, provider: Option<&str>, url: &str) -> DeliveryResult<DeleteResult> {
        let target = self.resolve(provider).await?;
        if !target.capabilities().can_delete {
            return Err(DeliveryError::UnsupportedOperation("delete"));
        }
        target.delete(url).await
    }
}

impl Default for DeliveryService {
    fn default() -> Self {
        Self::new()
    }
}
