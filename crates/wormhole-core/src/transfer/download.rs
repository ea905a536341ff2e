//! 下载处理
//!
//! 文件直接以附件形式流式返回；目录先打包成根目录下的临时 ZIP，
//! 返回后交给 [`crate::reaper::ArtifactReaper`] 延迟删除。

use axum::{
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use log::{info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

use super::protocol::PathQuery;
use super::{AppState, blocking, require_path};
use crate::archive;
use crate::error::{Result, TransferError};
use crate::sandbox::{self, Access};

/// 解析后的下载目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    /// 沙箱内的普通文件，`name` 为请求路径的最后一段
    File { path: PathBuf, name: String },
    /// 为目录生成的临时压缩包，由调用方负责安排清理
    Archive(PathBuf),
}

pub async fn handle_download(
    State(state): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query?;
    let root = state.root.get();
    let target = blocking(move || prepare_download(&root, query.path.as_deref())).await?;

    match target {
        DownloadTarget::File { path, name } => attachment(&path, &name).await,
        DownloadTarget::Archive(path) => {
            // 先打开文件再登记清理，响应不等待删除
            let name = file_name(&path, "archive.zip");
            let response = attachment(&path, &name).await;
            state.reaper.schedule(path);
            response
        }
    }
}

/// 校验请求路径并准备下载目标；目录会被打包
pub fn prepare_download(root: &Path, requested: Option<&str>) -> Result<DownloadTarget> {
    let requested = require_path(requested)?;
    let target = sandbox::resolve(root, requested)?;

    if !target.exists() {
        return Err(TransferError::NotFound("File not found".to_string()));
    }
    if !sandbox::check_access(&target, Access::Read) {
        warn!("Permission denied: {}", target.display());
        return Err(TransferError::AccessDenied("Permission denied".to_string()));
    }

    // 经由符号链接访问时，对外名称使用链接名而不是目标名
    let name =
        sandbox::entry_name(root, requested).unwrap_or_else(|| file_name(&target, "download"));
    if target.is_dir() {
        let archive = build_archive(root, &target, &name)?;
        Ok(DownloadTarget::Archive(archive))
    } else {
        Ok(DownloadTarget::File { path: target, name })
    }
}

/// 在根目录下打包目录，压缩包名冲突时依次尝试 `name_1.zip`、`name_2.zip`…
fn build_archive(root: &Path, dir: &Path, dir_name: &str) -> Result<PathBuf> {
    let archive_path = claim_archive_path(root, dir_name)?;
    match archive::pack_to_file(dir, &archive_path) {
        Ok(summary) => {
            info!(
                "已打包目录 {} -> {} ({} 个文件)",
                dir.display(),
                archive_path.display(),
                summary.files
            );
            Ok(archive_path)
        }
        Err(e) => {
            let _ = fs::remove_file(&archive_path);
            Err(e.into())
        }
    }
}

fn claim_archive_path(root: &Path, base: &str) -> Result<PathBuf> {
    let mut counter: u32 = 0;
    loop {
        let name = if counter == 0 {
            format!("{}.zip", base)
        } else {
            format!("{}_{}.zip", base, counter)
        };
        let path = root.join(name);
        match File::options().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// 以附件形式流式返回文件
async fn attachment(path: &Path, name: &str) -> Result<Response> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let mime = mime_guess::from_path(name).first_or_octet_stream();

    let headers = [
        (CONTENT_TYPE, mime.to_string()),
        (CONTENT_LENGTH, len.to_string()),
        (CONTENT_DISPOSITION, content_disposition(name)),
    ];
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

fn file_name(path: &Path, fallback: &str) -> String {
    path.file_name()
        .map_or_else(|| fallback.to_string(), |n| n.to_string_lossy().into_owned())
}

/// `attachment; filename="..."; filename*=UTF-8''...`，非 ASCII 文件名走 RFC 5987
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(name)
    )
}
