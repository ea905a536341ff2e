//! Wormhole Daemon
//!
//! 后台守护进程，负责：
//! - HTTP 文件传输服务（上传、下载、列表、编辑、删除）
//! - 通过 Unix Socket 接受控制命令（查看状态、切换保存目录）
//! - 退出时清理尚未删除的临时压缩包

mod ipc;
mod service;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wormhole_core::ServerSettings;

#[derive(Parser, Debug)]
#[command(name = "wormhole-daemon", version, about = "虫洞 - 局域网文件互传服务")]
struct Args {
    /// 监听地址 (默认: 配置文件中的值或 0.0.0.0)
    #[arg(long)]
    host: Option<String>,
    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,
    /// 保存目录
    #[arg(short, long)]
    root: Option<PathBuf>,
    /// 临时压缩包保留时间 (秒)
    #[arg(long)]
    cleanup_delay: Option<u64>,
    /// 将以上参数写回配置文件
    #[arg(long)]
    save: bool,
}

impl Args {
    fn apply(&self, mut settings: ServerSettings) -> ServerSettings {
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(root) = &self.root {
            settings.root_dir = root.clone();
        }
        if let Some(delay) = self.cleanup_delay {
            settings.cleanup_delay_secs = delay;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 桥接 log crate（wormhole-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    // 初始化日志
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wormhole_core=debug")),
        )
        .try_init();

    let args = Args::parse();
    let settings = args.apply(ServerSettings::load());
    if args.save {
        settings.save()?;
        tracing::info!("配置已保存: {:?}", ServerSettings::config_path());
    }

    tracing::info!("Wormhole Daemon starting...");

    let service = service::Service::bind(&settings).await?;
    let control = service.control();

    // 启动 IPC 服务器
    let ipc_handle = tokio::spawn(ipc::run_ipc_server(control));

    // 启动 HTTP 服务，Ctrl+C 时优雅退出
    let service_handle = tokio::spawn(service.run(shutdown_signal()));

    // 等待任一任务完成
    tokio::select! {
        res = ipc_handle => {
            tracing::error!("IPC server exited: {:?}", res);
        }
        res = service_handle => {
            match res {
                Ok(Ok(())) => tracing::info!("Wormhole Daemon stopped"),
                other => tracing::error!("HTTP service exited: {:?}", other),
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("无法监听 Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("收到退出信号，正在停止...");
}
