pub mod config;
pub mod delivery;

pub use config::{DeliveryConfig, ProviderEntry};
pub use delivery::{
    Capability, DeleteResult, DeliveryError, DeliveryProvider, DeliveryResult, DeliveryService,
    LocalProvider, LocalProviderFactory, Payload, ProviderBox, ProviderFactory, ProviderRegistry,
    UploadOptions, UploadResult,
};

// Register the built-in provider factories / 注册内置提供方工厂
pub async fn register_builtin_factories(service: &DeliveryService) -> anyhow::Result<()> {
    service.register_factory(Box::new(LocalProviderFactory)).await?;
    Ok(())
}
