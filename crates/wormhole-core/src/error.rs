//! 错误分类
//!
//! 所有请求处理器都返回 [`TransferError`]，由它统一转换成
//! `{"status": "error", "message": ...}` JSON 响应。

use axum::{
    Json,
    extract::{
        multipart::MultipartRejection,
        rejection::{FormRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::sandbox::SandboxError;

pub type Result<T, E = TransferError> = std::result::Result<T, E>;

/// 传输请求的有限错误集合
#[derive(Debug, Error)]
pub enum TransferError {
    /// 缺少必填字段或字段为空
    #[error("{0}")]
    BadRequest(String),

    /// 沙箱越界或进程没有访问权限
    #[error("{0}")]
    AccessDenied(String),

    /// 解析后的路径不存在
    #[error("{0}")]
    NotFound(String),

    /// 文件系统或压缩包的意外失败
    #[error("{0}")]
    Internal(String),
}

impl TransferError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound("File not found".to_string()),
            std::io::ErrorKind::PermissionDenied => {
                Self::AccessDenied("Permission denied".to_string())
            }
            _ => Self::Internal(e.to_string()),
        }
    }
}

impl From<SandboxError> for TransferError {
    fn from(e: SandboxError) -> Self {
        match e {
            SandboxError::Escape(_) => Self::AccessDenied("Access denied".to_string()),
            SandboxError::RootUnavailable(_) => Self::NotFound(e.to_string()),
            SandboxError::Io(io) => io.into(),
        }
    }
}

impl From<ArchiveError> for TransferError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::UnsafeEntry(_) => Self::BadRequest(e.to_string()),
            ArchiveError::Io(io) => Self::Internal(io.to_string()),
            ArchiveError::Zip(_) | ArchiveError::Walk(_) => Self::Internal(e.to_string()),
        }
    }
}

// axum 提取器的拒绝同样以 JSON 错误返回
impl From<QueryRejection> for TransferError {
    fn from(e: QueryRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<FormRejection> for TransferError {
    fn from(e: FormRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<MultipartRejection> for TransferError {
    fn from(e: MultipartRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<tokio::task::JoinError> for TransferError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("worker task failed: {}", e))
    }
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }
        let body = json!({
            "status": "error",
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            TransferError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TransferError::AccessDenied("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            TransferError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TransferError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_io_error_mapping() {
        let e: TransferError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(matches!(e, TransferError::NotFound(_)));

        let e: TransferError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert!(matches!(e, TransferError::AccessDenied(_)));

        let e: TransferError = std::io::Error::other("disk on fire").into();
        assert_eq!(e.to_string(), "disk on fire");
    }
}
