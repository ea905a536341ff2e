//! Core Service - HTTP 服务与运行时控制

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use wormhole_core::{AppState, ArtifactReaper, ServerSettings, SharedRoot};

/// 已绑定端口、尚未开始服务的 HTTP 服务
pub struct Service {
    listener: TcpListener,
    state: AppState,
    control: Control,
}

impl Service {
    pub async fn bind(settings: &ServerSettings) -> Result<Self> {
        let root = SharedRoot::new(&settings.root_dir);
        std::fs::create_dir_all(root.get())
            .with_context(|| format!("无法创建保存目录 {}", root.get().display()))?;

        let reaper = ArtifactReaper::new(settings.cleanup_delay());
        let listener = TcpListener::bind(settings.bind_addr())
            .await
            .with_context(|| format!("无法监听 {}", settings.bind_addr()))?;
        let port = listener.local_addr()?.port();

        let state = AppState::new(root.clone(), reaper.clone());
        let control = Control {
            root,
            reaper,
            host: settings.host.clone(),
            port,
        };

        Ok(Self {
            listener,
            state,
            control,
        })
    }

    pub fn control(&self) -> Control {
        self.control.clone()
    }

    /// 提供服务直到 `shutdown` 完成，然后立即清理待删除的临时压缩包
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let reaper = self.state.reaper.clone();
        wormhole_core::transfer::serve(self.listener, self.state, shutdown).await?;

        let pending = reaper.pending();
        if pending > 0 {
            tracing::info!("正在清理 {} 个临时文件...", pending);
        }
        reaper.shutdown().await;
        Ok(())
    }
}

/// IPC 使用的控制句柄
#[derive(Debug, Clone)]
pub struct Control {
    pub root: SharedRoot,
    pub reaper: ArtifactReaper,
    pub host: String,
    pub port: u16,
}

impl Control {
    /// 切换保存目录，不存在时创建；只影响之后到达的请求
    pub fn set_root(&self, path: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("无法创建目录 {}", path.display()))?;
        if !path.is_dir() {
            anyhow::bail!("{} 不是目录", path.display());
        }
        self.root.set(path);
        let root = self.root.get();
        tracing::info!("保存目录更改为: {}", root.display());
        Ok(root)
    }
}
