use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{DeliveryError, DeliveryProvider, DeliveryResult};

pub type ProviderBox = Arc<Box<dyn DeliveryProvider>>;

/// Name-keyed provider registry with single active selection
/// 按名称索引的提供方注册表，支持单一活动选择
///
/// Names are case-sensitive and unique; re-registering a name replaces the
/// prior entry. At most one entry is active at a time. Mutation is expected
/// at startup, but both maps sit behind locks so runtime changes stay safe.
/// 名称区分大小写且唯一；重复注册会替换旧条目。任意时刻最多一个活动条目。
/// 注册通常发生在启动阶段，但两个字段都有锁保护，运行期变更同样安全。
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<HashMap<String, ProviderBox>>>,
    active: Arc<RwLock<Option<String>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(RwLock::new(None)),
        }
    }

    /// Insert or replace the entry at `name` / 插入或替换指定名称的条目
    pub async fn register(&self, name: impl Into<String>, provider: Box<dyn DeliveryProvider>) {
        let name = name.into();
        let mut providers = self.providers.write().await;
        let replaced = providers.insert(name.clone(), Arc::new(provider)).is_some();
        drop(providers);

        if replaced {
            tracing::info!("Provider replaced: {}", name);
        } else {
            tracing::info!("Provider registered: {}", name);
        }
    }

    /// Remove the entry at `name` / 移除指定名称的条目
    ///
    /// A pure map-remove with no side effects on the backend; a matching
    /// active selection is cleared. / 纯粹的表内移除，不触碰后端；
    /// 若活动选择指向该条目则一并清除。
    pub async fn unregister(&self, name: &str) -> DeliveryResult<()> {
        let mut providers = self.providers.write().await;
        providers
            .remove(name)
            .ok_or_else(|| DeliveryError::ProviderNotFound(name.to_string()))?;
        drop(providers);

        let mut active = self.active.write().await;
        if active.as_deref() == Some(name) {
            *active = None;
        }
        drop(active);

        tracing::info!("Provider unregistered: {}", name);
        Ok(())
    }

    /// Resolve a provider by name / 按名称解析提供方
    pub async fn get(&self, name: &str) -> DeliveryResult<ProviderBox> {
        let providers = self.providers.read().await;
        providers
            .get(name)
            .cloned()
            .ok_or_else(|| DeliveryError::ProviderNotFound(name.to_string()))
    }

    /// Resolve the active provider / 解析活动提供方
    pub async fn get_active(&self) -> DeliveryResult<ProviderBox> {
        let active = self.active.read().await;
        let name = (*active).clone().ok_or(DeliveryError::NoActiveProvider)?;
        drop(active);

        self.get(&name).await
    }

    /// Mark the named entry active, replacing any previous selection
    /// 将指定条目标记为活动，替换之前的选择
    pub async fn set_active(&self, name: &str) -> DeliveryResult<()> {
        let providers = self.providers.read().await;
        if !providers.contains_key(name) {
            return Err(DeliveryError::ProviderNotFound(name.to_string()));
        }
        drop(providers);

        let mut active = self.active.write().await;
        *active = Some(name.to_string());
        drop(active);

        tracing::info!("Active provider set: {}", name);
        Ok(())
    }

    /// Clear the active selection / 清除活动选择
    pub async fn clear_active(&self) {
        let mut active = self.active.write().await;
        *active = None;
    }

    /// Name of the active entry, if any / 活动条目的名称
    pub async fn active_name(&self) -> Option<String> {
        let active = self.active.read().await;
        (*active).clone()
    }

    /// All registered names / 所有已注册的名称
    pub async fn names(&self) -> Vec<String> {
        let providers = self.providers.read().await;
        providers.keys().cloned().collect()
    }

    pub async fn contains(&self, name: &str) -> bool {
        let providers = self.providers.read().await;
        providers.contains_key(name)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{UploadOptions, UploadResult};
    use async_trait::async_trait;
    use bytes::Bytes;

    struct Labeled {
        label: &'static str,
    }

    #[async_trait]
    impl DeliveryProvider for Labeled {
        async fn upload(&self, _data: Bytes, _options: UploadOptions) -> DeliveryResult<UploadResult> {
            Ok(UploadResult {
                url: self.label.to_string(),
                id: None,
                metadata: None,
            })
        }
    }

    #[tokio::test]
    async fn test_register_and_get_same_instance() {
        let registry = ProviderRegistry::new();
        registry.register("alpha", Box::new(Labeled { label: "alpha" })).await;

        let first = registry.get("alpha").await.unwrap();
        let second = registry.get("alpha").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let err = registry.get("beta").await.unwrap_err();
        assert!(matches!(err, DeliveryError::ProviderNotFound(name) if name == "beta"));
    }

    #[tokio::test]
    async fn test_register_replaces_existing_entry() {
        let registry = ProviderRegistry::new();
        registry.register("store", Box::new(Labeled { label: "first" })).await;
        registry.register("store", Box::new(Labeled { label: "second" })).await;

        assert_eq!(registry.names().await, vec!["store".to_string()]);
        let provider = registry.get("store").await.unwrap();
        let result = provider.upload(Bytes::new(), UploadOptions::new()).await.unwrap();
        assert_eq!(result.url, "second");
    }

    #[tokio::test]
    async fn test_active_selection() {
        let registry = ProviderRegistry::new();
        let err = registry.get_active().await.unwrap_err();
        assert!(matches!(err, DeliveryError::NoActiveProvider));

        let err = registry.set_active("ghost").await.unwrap_err();
        assert!(matches!(err, DeliveryError::ProviderNotFound(name) if name == "ghost"));

        registry.register("a", Box::new(Labeled { label: "a" })).await;
        registry.register("b", Box::new(Labeled { label: "b" })).await;

        registry.set_active("a").await.unwrap();
        assert_eq!(registry.active_name().await.as_deref(), Some("a"));

        // 设置新的活动条目会隐式取消旧的
        registry.set_active("b").await.unwrap();
        assert_eq!(registry.active_name().await.as_deref(), Some("b"));

        let active = registry.get_active().await.unwrap();
        let result = active.upload(Bytes::new(), UploadOptions::new()).await.unwrap();
        assert_eq!(result.url, "b");
    }

    #[tokio::test]
    async fn test_unregister_clears_matching_selection() {
        let registry = ProviderRegistry::new();
        registry.register("only", Box::new(Labeled { label: "only" })).await;
        registry.set_active("only").await.unwrap();

        registry.unregister("only").await.unwrap();
        assert!(!registry.contains("only").await);
        assert_eq!(registry.active_name().await, None);
        assert!(matches!(registry.get_active().await.unwrap_err(), DeliveryError::NoActiveProvider));

        let err = registry.unregister("only").await.unwrap_err();
        assert!(matches!(err, DeliveryError::ProviderNotFound(_)));
    }
}
