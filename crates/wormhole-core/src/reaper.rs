//! 临时压缩包清理
//!
//! 目录下载会在根目录下生成临时 ZIP。响应交给传输层之后，
//! [`ArtifactReaper`] 在宽限期结束后删除它，给慢速客户端留出下载时间。
//! 删除失败只记录日志，不会影响任何请求。

use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// 默认宽限期
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(30);

/// 延迟删除调度器
///
/// 克隆后共享同一组任务；每个压缩包各有一个独立的定时任务。
#[derive(Debug, Clone)]
pub struct ArtifactReaper {
    delay: Duration,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Default for ArtifactReaper {
    fn default() -> Self {
        Self::new(DEFAULT_CLEANUP_DELAY)
    }
}

impl ArtifactReaper {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 安排在宽限期后删除 `path`，立即返回
    pub fn schedule(&self, path: PathBuf) {
        let delay = self.delay;
        let cancel = self.cancel.clone();
        debug!(
            "Scheduled removal of {} in {}s",
            path.display(),
            delay.as_secs()
        );

        self.tracker.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    debug!("Shutdown: removing {} early", path.display());
                }
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!("已删除临时文件: {}", path.display()),
                Err(e) => warn!("删除临时文件失败 {}: {}", path.display(), e),
            }
        });
    }

    /// 尚未完成的删除任务数
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// 跳过剩余等待，立即删除所有待清理文件并等待完成
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
