//! HTTP 接口的请求字段与 JSON 响应格式
//!
//! 所有响应都带有 `status` 字段：成功为 `"success"`，失败为 `"error"`
//! （失败响应由 [`crate::error::TransferError`] 生成）。

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;

/// 上传类型，由 `data_type` 表单字段选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    Text,
    Folder,
    #[default]
    File,
}

impl DataType {
    /// 未知取值按普通文件处理
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "text" => DataType::Text,
            "folder" => DataType::Folder,
            _ => DataType::File,
        }
    }
}

/// `?path=` 查询参数
#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

/// 文本上传结果
#[derive(Debug, Clone)]
pub struct SavedText {
    pub path: PathBuf,
    pub size: u64,
}

impl SavedText {
    pub fn to_json(&self) -> Value {
        json!({
            "status": "success",
            "message": "文本保存成功",
            "path": self.path.to_string_lossy(),
            "size": self.size,
        })
    }
}

/// 文件上传结果
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub path: PathBuf,
    pub size: u64,
    pub original_filename: String,
    pub media_type: Option<String>,
}

impl SavedFile {
    pub fn to_json(&self) -> Value {
        json!({
            "status": "success",
            "message": "文件保存成功",
            "path": self.path.to_string_lossy(),
            "size": self.size,
            "original_filename": self.original_filename,
            "type": self.media_type,
        })
    }
}

/// 文件夹上传结果
#[derive(Debug, Clone)]
pub struct SavedFolder {
    pub path: PathBuf,
    /// 所有解压文件大小之和
    pub size: u64,
    pub files: usize,
    /// 实际使用的文件夹名，冲突时与请求的名称不同
    pub folder_name: String,
}

impl SavedFolder {
    pub fn to_json(&self) -> Value {
        json!({
            "status": "success",
            "message": "文件夹保存成功",
            "path": self.path.to_string_lossy(),
            "size": self.size,
            "original_folder_name": self.folder_name,
        })
    }
}

/// 目录列表中的一项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    /// 目录恒为 0
    pub size: u64,
    /// 修改时间（Unix 秒，含小数）
    pub modified: f64,
    /// 相对于根目录的路径，可直接用于后续请求
    pub path: String,
}

/// `/list_files` 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub status: String,
    pub path: String,
    pub items: Vec<ListingEntry>,
}

pub fn success(message: &str) -> Value {
    json!({
        "status": "success",
        "message": message,
    })
}
