//! 服务配置和持久化
//!
//! 提供监听地址、端口、保存目录等设置的存储和读取，
//! 以及运行时可修改的共享根目录 [`SharedRoot`]。

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// 默认端口
pub const DEFAULT_PORT: u16 = 5000;

/// 服务设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 保存目录（服务根目录）
    pub root_dir: PathBuf,
    /// 目录下载生成的临时压缩包保留时间（秒）
    pub cleanup_delay_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            root_dir: default_root_dir(),
            cleanup_delay_secs: 30,
        }
    }
}

impl ServerSettings {
    /// 获取配置文件路径
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wormhole");
        config_dir.join("settings.toml")
    }

    /// 加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse settings: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read settings file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }

    /// 监听地址字符串，如 `0.0.0.0:5000`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 默认保存目录: 下载目录下的 `server_data`
fn default_root_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("server_data")
}

/// 运行时可修改的服务根目录
///
/// 每个请求在入口处读取一次当前值；修改只影响之后到达的请求。
#[derive(Debug, Clone)]
pub struct SharedRoot(Arc<RwLock<PathBuf>>);

impl SharedRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(Arc::new(RwLock::new(absolutize(root.into()))))
    }

    /// 当前根目录
    pub fn get(&self) -> PathBuf {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 替换根目录
    pub fn set(&self, root: impl Into<PathBuf>) {
        let root = absolutize(root.into());
        match self.0.write() {
            Ok(mut guard) => *guard = root,
            Err(poisoned) => *poisoned.into_inner() = root,
        }
    }
}

fn absolutize(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
