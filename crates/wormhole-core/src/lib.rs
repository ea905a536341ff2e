//! Wormhole Core Library
//!
//! 局域网文件互传服务的核心实现：把本机的一个目录通过 HTTP 暴露出来，
//! 供其他设备上传、下载、浏览、编辑和删除。
//!
//! # 模块
//!
//! - **sandbox**: 把客户端路径解析到根目录之内，拒绝任何越界
//! - **sanitize**: 文件名清洗
//! - **archive**: ZIP 打包（目录下载）与安全解包（文件夹上传）
//! - **transfer**: HTTP 路由与各个请求处理器
//! - **reaper**: 临时压缩包的延迟清理
//! - **config**: 服务设置与运行时根目录
//!
//! # 使用示例
//!
//! ```ignore
//! use wormhole_core::{AppState, ArtifactReaper, ServerSettings, SharedRoot};
//!
//! let settings = ServerSettings::load();
//! let state = AppState::new(
//!     SharedRoot::new(&settings.root_dir),
//!     ArtifactReaper::new(settings.cleanup_delay()),
//! );
//!
//! let listener = tokio::net::TcpListener::bind(settings.bind_addr()).await?;
//! wormhole_core::transfer::serve(listener, state, std::future::pending()).await?;
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod reaper;
pub mod sandbox;
pub mod sanitize;
pub mod transfer;

pub use config::{ServerSettings, SharedRoot};
pub use error::TransferError;
pub use reaper::ArtifactReaper;
pub use transfer::{AppState, router};
