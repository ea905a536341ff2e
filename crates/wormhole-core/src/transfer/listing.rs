//! 目录列表
//!
//! 只列出直接子项，不递归；目录大小恒为 0。

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use log::warn;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use super::protocol::{Listing, ListingEntry, PathQuery};
use super::{AppState, blocking};
use crate::error::{Result, TransferError};
use crate::sandbox::{self, Access};

pub async fn handle_list(
    State(state): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> Result<Json<Listing>> {
    let Query(query) = query?;
    let root = state.root.get();
    let requested = query.path.unwrap_or_default();
    let listing = blocking(move || list_dir(&root, &requested)).await?;
    Ok(Json(listing))
}

/// 列出 `requested`（空字符串表示根目录）下的直接子项
pub fn list_dir(root: &Path, requested: &str) -> Result<Listing> {
    let target = sandbox::resolve(root, requested)?;

    if !target.exists() {
        return Err(TransferError::NotFound("路径不存在".to_string()));
    }
    if !target.is_dir() {
        return Err(TransferError::bad_request("Not a directory"));
    }
    if !sandbox::check_access(&target, Access::Read) {
        warn!("Permission denied: {}", target.display());
        return Err(TransferError::AccessDenied("无权访问该路径".to_string()));
    }

    let mut items = Vec::new();
    for entry in fs::read_dir(&target)? {
        let entry = entry?;
        let path = entry.path();
        // 断开的符号链接没有目标元数据，退回到链接本身
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(_) => entry.metadata()?,
        };

        let is_dir = meta.is_dir();
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0.0, |d| d.as_secs_f64());

        items.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
            size: if is_dir { 0 } else { meta.len() },
            modified,
            path: sandbox::relative_to_root(root, &path).unwrap_or_default(),
        });
    }

    items.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    Ok(Listing {
        status: "success".to_string(),
        path: requested.to_string(),
        items,
    })
}
