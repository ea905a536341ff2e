//! 删除与原地更新

use axum::{Json, extract::State};
use log::{info, warn};
use serde_json::{Value, json};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::form::FormFields;
use super::protocol::success;
use super::{AppState, blocking, require_path};
use crate::error::{Result, TransferError};
use crate::sandbox::{self, Access};

pub async fn handle_delete(
    State(state): State<AppState>,
    form: FormFields,
) -> Result<Json<Value>> {
    let root = state.root.get();
    let requested = form.get("path").map(str::to_string);
    blocking(move || delete_entry(&root, requested.as_deref())).await?;
    Ok(Json(success("删除成功")))
}

pub async fn handle_update(
    State(state): State<AppState>,
    form: FormFields,
) -> Result<Json<Value>> {
    let root = state.root.get();
    let requested = form.get("path").map(str::to_string);
    let content = form.get("content").unwrap_or_default().to_string();
    let size = blocking(move || update_file(&root, requested.as_deref(), &content)).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "文件更新成功",
        "size": size,
    })))
}

/// 更新使用的解析与检查：存在、可写
fn resolve_writable(root: &Path, requested: Option<&str>) -> Result<PathBuf> {
    let requested = require_path(requested)?;
    let target = sandbox::resolve(root, requested)?;

    if !target.exists() {
        return Err(TransferError::NotFound("File not found".to_string()));
    }
    if !sandbox::check_access(&target, Access::Write) {
        warn!("Permission denied: {}", target.display());
        return Err(TransferError::AccessDenied("Permission denied".to_string()));
    }
    Ok(target)
}

/// 删除文件或递归删除目录；不允许删除根目录本身
///
/// 符号链接只删除链接本身，不影响它指向的内容。
pub fn delete_entry(root: &Path, requested: Option<&str>) -> Result<PathBuf> {
    let requested = require_path(requested)?;

    if sandbox::normalize(&root.join(requested)) == sandbox::normalize(root) {
        warn!("Refusing to delete the server root");
        return Err(TransferError::AccessDenied(
            "Cannot delete the server root".to_string(),
        ));
    }

    let entry = sandbox::resolve_entry(root, requested)?;
    let meta = match fs::symlink_metadata(&entry) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(TransferError::NotFound("File not found".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    // 删除链接需要的是所在目录的写权限
    let writable = if meta.file_type().is_symlink() {
        entry
            .parent()
            .is_some_and(|parent| sandbox::check_access(parent, Access::Write))
    } else {
        sandbox::check_access(&entry, Access::Write)
    };
    if !writable {
        warn!("Permission denied: {}", entry.display());
        return Err(TransferError::AccessDenied("Permission denied".to_string()));
    }

    if meta.is_dir() {
        fs::remove_dir_all(&entry)?;
        info!("已删除文件夹: {}", entry.display());
    } else {
        fs::remove_file(&entry)?;
        info!("已删除文件: {}", entry.display());
    }
    Ok(entry)
}

/// 用 `content` 整体覆盖文件，返回新大小（字节）
pub fn update_file(root: &Path, requested: Option<&str>, content: &str) -> Result<u64> {
    let target = resolve_writable(root, requested)?;

    if target.is_dir() {
        return Err(TransferError::bad_request("Cannot update a directory"));
    }

    fs::write(&target, content)?;
    info!("已更新文件: {}", target.display());
    Ok(content.len() as u64)
}
