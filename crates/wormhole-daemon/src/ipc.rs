//! IPC Server - Unix Domain Socket 通信

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::service::Control;

pub fn socket_path() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join("wormhole.sock")
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum IpcRequest {
    #[serde(rename = "status")]
    Status,
    #[serde(rename = "set_root")]
    SetRoot { path: String },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum IpcResponse {
    #[serde(rename = "ok")]
    Ok { message: String },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "status")]
    Status {
        root: String,
        host: String,
        port: u16,
        pending_cleanups: usize,
    },
}

pub async fn run_ipc_server(control: Control) -> Result<()> {
    let path = socket_path();

    // 删除旧的 socket 文件
    let _ = std::fs::remove_file(&path);

    let listener = UnixListener::bind(&path)?;
    tracing::info!("IPC 服务器已启动: {:?}", path);

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(handle_client(stream, control.clone()));
            }
            Err(e) => {
                tracing::warn!("接受连接失败: {}", e);
            }
        }
    }
}

async fn handle_client(stream: UnixStream, control: Control) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<IpcRequest>(&line) {
            Ok(request) => {
                tracing::debug!("收到请求: {:?}", request);
                handle_request(&control, request)
            }
            Err(e) => IpcResponse::Error {
                message: format!("Invalid request: {}", e),
            },
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
        line.clear();
    }

    Ok(())
}

pub fn handle_request(control: &Control, request: IpcRequest) -> IpcResponse {
    match request {
        IpcRequest::Status => IpcResponse::Status {
            root: control.root.get().to_string_lossy().into_owned(),
            host: control.host.clone(),
            port: control.port,
            pending_cleanups: control.reaper.pending(),
        },
        IpcRequest::SetRoot { path } => match control.set_root(Path::new(&path)) {
            Ok(root) => IpcResponse::Ok {
                message: format!("保存目录更改为: {}", root.display()),
            },
            Err(e) => IpcResponse::Error {
                message: format!("{:#}", e),
            },
        },
    }
}
