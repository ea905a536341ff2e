//! 上传处理
//!
//! `POST /upload` 的 `data_type` 字段选择三种上传形态：
//!
//! - `text`: 表单中的文本内容直接写入文件（同名覆盖）
//! - `file`: 单个文件，同名时加随机前缀
//! - `folder`: 客户端打包好的 ZIP，解压为目录，同名时加随机前缀
//!
//! 文件部分在读取请求体时就流式写入根目录下的暂存文件，
//! 不会整体缓存在内存中。

use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State, multipart::Field},
};
use log::{debug, info};
use serde_json::Value;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::form::{FormFields, is_multipart};
use super::protocol::{DataType, SavedFile, SavedFolder, SavedText};
use super::{AppState, blocking};
use crate::archive;
use crate::error::{Result, TransferError};
use crate::sanitize::{collision_prefixed, sanitize};

/// 冲突改名的最大尝试次数
const MAX_CLAIM_ATTEMPTS: usize = 64;

/// 暂存的上传文件，未被认领时在 drop 中删除
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    client_name: String,
    persisted: bool,
}

impl StagedUpload {
    /// 在 `dir` 下创建一个唯一的隐藏暂存文件
    pub fn create(dir: &Path, client_name: impl Into<String>) -> io::Result<(Self, File)> {
        let path = dir.join(format!(".wormhole-{}.part", uuid::Uuid::new_v4().simple()));
        let file = File::options().write(true).create_new(true).open(&path)?;
        let staged = Self {
            path,
            client_name: client_name.into(),
            persisted: false,
        };
        Ok((staged, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// multipart 中声明的文件名
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// 移动到最终位置（覆盖 `target`）
    fn persist(mut self, target: &Path) -> io::Result<()> {
        fs::rename(&self.path, target)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if !self.persisted
            && let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            log::warn!("Failed to remove staging file {}: {}", self.path.display(), e);
        }
    }
}

/// 上传表单中的文本字段
#[derive(Debug, Default)]
struct UploadForm {
    data_type: Option<String>,
    content: Option<String>,
    filename: Option<String>,
    original_filename: Option<String>,
    original_folder_name: Option<String>,
}

impl UploadForm {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "data_type" => self.data_type = Some(value),
            "content" => self.content = Some(value),
            "filename" => self.filename = Some(value),
            "original_filename" => self.original_filename = Some(value),
            "original_folder_name" => self.original_folder_name = Some(value),
            other => debug!("Ignoring unknown upload field: {}", other),
        }
    }

    fn data_type(&self) -> DataType {
        self.data_type
            .as_deref()
            .map(DataType::parse)
            .unwrap_or_default()
    }
}

/// 浏览器发送 multipart；只上传文本的脚本客户端也可以用 urlencoded
pub async fn handle_upload(State(state): State<AppState>, req: Request) -> Result<Json<Value>> {
    let root = state.root.get();
    tokio::fs::create_dir_all(&root).await?;

    let (form, staged) = if is_multipart(&req) {
        let multipart = Multipart::from_request(req, &()).await?;
        read_multipart(&root, multipart).await?
    } else {
        let FormFields(fields) = FormFields::from_request(req, &()).await?;
        let mut form = UploadForm::default();
        for (name, value) in fields {
            form.set(&name, value);
        }
        (form, None)
    };

    let body = match form.data_type() {
        DataType::Text => {
            let filename = form.filename.filter(|f| !f.trim().is_empty());
            let content = form.content.unwrap_or_default();
            blocking(move || save_text(&root, filename.as_deref(), &content))
                .await?
                .to_json()
        }
        DataType::File => {
            let staged = require_file(staged)?;
            let original = form
                .original_filename
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| staged.client_name().to_string());
            blocking(move || save_file(&root, staged, &original))
                .await?
                .to_json()
        }
        DataType::Folder => {
            let staged = require_file(staged)?;
            let folder = form
                .original_folder_name
                .unwrap_or_else(|| "unnamed_folder".to_string());
            blocking(move || save_folder(&root, staged, &folder))
                .await?
                .to_json()
        }
    };

    Ok(Json(body))
}

/// 读取全部 multipart 字段，`file` 部分边读边写入暂存文件
async fn read_multipart(
    root: &Path,
    mut multipart: Multipart,
) -> Result<(UploadForm, Option<StagedUpload>)> {
    let mut form = UploadForm::default();
    let mut staged = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TransferError::bad_request(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            staged = Some(stage_field(root, field).await?);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| TransferError::bad_request(e.body_text()))?;
            form.set(&name, value);
        }
    }
    Ok((form, staged))
}

/// 把 multipart 文件部分流式写入暂存文件
async fn stage_field(root: &Path, mut field: Field<'_>) -> Result<StagedUpload> {
    let client_name = field.file_name().unwrap_or_default().to_string();
    let (staged, file) = StagedUpload::create(root, client_name)?;
    let mut out = tokio::fs::File::from_std(file);

    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| TransferError::bad_request(e.body_text()))?
    {
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;

    debug!(
        "Staged upload {:?} ({} bytes) at {}",
        staged.client_name(),
        written,
        staged.path().display()
    );
    Ok(staged)
}

fn require_file(staged: Option<StagedUpload>) -> Result<StagedUpload> {
    let staged = staged.ok_or_else(|| TransferError::bad_request("没有上传文件"))?;
    if staged.client_name().is_empty() {
        return Err(TransferError::bad_request("没有选择文件"));
    }
    Ok(staged)
}

/// 保存文本；同名文件直接覆盖
pub fn save_text(root: &Path, filename: Option<&str>, content: &str) -> Result<SavedText> {
    let filename = filename.map_or_else(default_text_name, str::to_string);
    let path = root.join(sanitize(&filename, false));

    fs::write(&path, content)?;
    let size = content.len() as u64;

    info!("文本保存成功: {} (大小: {}字节)", path.display(), size);
    Ok(SavedText { path, size })
}

fn default_text_name() -> String {
    format!("text_{}.txt", chrono::Local::now().format("%Y%m%d%H%M%S"))
}

/// 把暂存文件认领到根目录下，名称冲突时加随机前缀
pub fn save_file(root: &Path, staged: StagedUpload, original_filename: &str) -> Result<SavedFile> {
    let name = sanitize(original_filename, false);
    let path = claim_unique(root, &name, |p| {
        File::options().write(true).create_new(true).open(p).map(drop)
    })?;

    if let Err(e) = staged.persist(&path) {
        let _ = fs::remove_file(&path);
        return Err(e.into());
    }

    let size = fs::metadata(&path)?.len();
    let media_type = mime_guess::from_path(&path).first().map(|m| m.to_string());

    info!(
        "文件保存成功: {} (大小: {:.2}MB, 类型: {})",
        path.display(),
        size as f64 / 1024.0 / 1024.0,
        media_type.as_deref().unwrap_or("unknown")
    );
    Ok(SavedFile {
        path,
        size,
        original_filename: original_filename.to_string(),
        media_type,
    })
}

/// 解压上传的 ZIP 到新目录，名称冲突时加随机前缀
///
/// 无论成功与否，暂存的 ZIP 都会被删除。
pub fn save_folder(root: &Path, staged: StagedUpload, folder_name: &str) -> Result<SavedFolder> {
    let name = sanitize(folder_name, true);
    let path = claim_unique(root, &name, |p| fs::create_dir(p))?;

    let result = archive::unpack_file(staged.path(), &path);
    drop(staged);

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            let _ = fs::remove_dir_all(&path);
            return Err(e.into());
        }
    };

    let folder_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(name);

    info!(
        "文件夹保存成功: {} ({} 个文件, 大小: {:.2}MB)",
        path.display(),
        summary.files,
        summary.bytes as f64 / 1024.0 / 1024.0
    );
    Ok(SavedFolder {
        path,
        size: summary.bytes,
        files: summary.files,
        folder_name,
    })
}

/// 用排他创建占用 `root/name`；已存在则换一个带随机前缀的名称重试
///
/// 排他创建让"检查后再写入"的竞争不再可能：两个同时到达的同名上传
/// 只有一个能拿到原名。
fn claim_unique<F>(root: &Path, name: &str, create: F) -> Result<PathBuf>
where
    F: Fn(&Path) -> io::Result<()>,
{
    let mut candidate = name.to_string();
    for _ in 0..MAX_CLAIM_ATTEMPTS {
        let path = root.join(&candidate);
        match create(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                candidate = collision_prefixed(name);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(TransferError::Internal(format!(
        "no free name available for {}",
        name
    )))
}
