//! Wormhole CLI
//!
//! 命令行客户端，通过 Unix Socket 与守护进程通信

mod client;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "wormhole", version, about = "虫洞 - 局域网文件互传工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 查看服务状态
    Status,
    /// 切换保存目录 (不存在时自动创建)
    SetRoot {
        /// 新的保存目录
        dir: PathBuf,
    },
    /// 生成下载链接
    Link {
        /// 保存目录内的文件或文件夹 (绝对路径或相对于保存目录)
        path: PathBuf,
        /// 链接中使用的主机地址 (默认: 服务监听地址)
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let resp = client::send_request(client::IpcRequest::Status).await?;
            if let client::IpcResponse::Status {
                root,
                host,
                port,
                pending_cleanups,
            } = resp
            {
                println!("监听地址: {}:{}", host, port);
                println!("保存目录: {}", root);
                println!("待清理临时文件: {}", pending_cleanups);
            }
        }
        Commands::SetRoot { dir } => {
            // 守护进程的工作目录与当前 shell 不同，先转成绝对路径
            let dir = std::path::absolute(&dir)?;
            println!("📁 保存目录 -> {}", dir.display());
            client::send_request(client::IpcRequest::SetRoot {
                path: dir.to_string_lossy().into_owned(),
            })
            .await?;
        }
        Commands::Link { path, host } => {
            let resp = client::send_request(client::IpcRequest::Status).await?;
            let client::IpcResponse::Status {
                root,
                host: listen_host,
                port,
                ..
            } = resp
            else {
                bail!("unexpected response from daemon");
            };

            let host = host.unwrap_or_else(|| {
                if listen_host == "0.0.0.0" {
                    eprintln!("⚠️  服务监听所有地址，可用 --host 指定本机局域网 IP");
                    "localhost".to_string()
                } else {
                    listen_host
                }
            });
            let link = download_link(&host, port, Path::new(&root), &path)?;
            println!("🔗 {}", link);
        }
    }

    Ok(())
}

/// 构造 `http://host:port/download?path=...`，路径相对于保存目录
fn download_link(host: &str, port: u16, root: &Path, path: &Path) -> Result<String> {
    let relative = if path.is_absolute() {
        match path.strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => bail!("{} 不在保存目录 {} 内", path.display(), root.display()),
        }
    } else {
        path.to_path_buf()
    };

    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        bail!("路径为空");
    }

    Ok(format!(
        "http://{}:{}/download?path={}",
        host,
        port,
        urlencoding::encode(&parts.join("/"))
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_for_relative_path() {
        let link = download_link("192.168.1.8", 5000, Path::new("/srv"), Path::new("docs/a b.txt"))
            .unwrap();
        assert_eq!(
            link,
            "http://192.168.1.8:5000/download?path=docs%2Fa%20b.txt"
        );
    }

    #[test]
    fn test_link_for_absolute_path_inside_root() {
        let link = download_link("host", 5001, Path::new("/srv"), Path::new("/srv/照片")).unwrap();
        assert_eq!(link, "http://host:5001/download?path=%E7%85%A7%E7%89%87");
    }

    #[test]
    fn test_link_rejects_outside_root() {
        assert!(download_link("h", 1, Path::new("/srv"), Path::new("/etc/passwd")).is_err());
        assert!(download_link("h", 1, Path::new("/srv"), Path::new("/srv")).is_err());
    }
}
