//! Startup configuration module / 启动配置模块
//!
//! Declares which providers to instantiate and which one starts active.
//! Provider settings are opaque JSON handed to the matching factory; the
//! core does not validate their shape. Creates a default config file on
//! first run. / 声明要实例化哪些提供方以及哪个作为初始活动提供方。
//! 提供方配置是原样交给工厂的 JSON，核心不校验其结构。首次运行时创建
//! 默认配置文件。

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration / 顶层配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Providers to instantiate at startup / 启动时实例化的提供方
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    /// Initial active selection / 初始活动选择
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
}

/// One configured provider / 单个提供方配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Registry name, unique and case-sensitive / 注册名，唯一且区分大小写
    pub name: String,
    /// Factory type that builds this provider / 构建该提供方的工厂类型
    #[serde(rename = "type")]
    pub provider_type: String,
    /// Backend-specific settings, passed through untouched / 后端自有配置，原样传递
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl DeliveryConfig {
    /// Load configuration from a JSON file / 从 JSON 文件加载配置
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save configuration as pretty-printed JSON / 以带缩进的 JSON 保存配置
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load the file, writing a default one first if it is missing
    /// 加载配置文件，不存在时先写入默认配置
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            tracing::info!("Created default config: {:?}", path);
            Ok(config)
        }
    }
}
