//! 文件传输模块
//!
//! 包含:
//! - HTTP 服务器与路由
//! - 上传（文本 / 文件 / 文件夹）
//! - 下载（文件 / 目录打包）
//! - 删除、原地更新和目录列表

pub mod download;
pub mod form;
pub mod http_server;
pub mod listing;
pub mod manage;
pub mod protocol;
pub mod upload;

pub use http_server::{router, serve};
pub use protocol::{DataType, Listing, ListingEntry, SavedFile, SavedFolder, SavedText};

use crate::config::SharedRoot;
use crate::error::{Result, TransferError};
use crate::reaper::ArtifactReaper;

/// 处理器共享的状态：只有根目录和清理调度器
#[derive(Debug, Clone)]
pub struct AppState {
    pub root: SharedRoot,
    pub reaper: ArtifactReaper,
}

impl AppState {
    pub fn new(root: SharedRoot, reaper: ArtifactReaper) -> Self {
        Self { root, reaper }
    }
}

/// 缺失或为空的 `path` 参数在解析前即返回 400
pub(crate) fn require_path(path: Option<&str>) -> Result<&str> {
    match path {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(TransferError::bad_request("Missing path parameter")),
    }
}

/// 在阻塞线程池上执行文件系统操作
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
