//! 表单字段提取
//!
//! 浏览器的 `FormData` 发送 multipart，脚本客户端常用 urlencoded，
//! 两种编码都接受。

use axum::{
    Form,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use std::collections::HashMap;

use crate::error::TransferError;

/// 请求体是否为 `multipart/form-data`
pub(crate) fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// 请求体中的全部文本字段
#[derive(Debug, Default)]
pub struct FormFields(pub HashMap<String, String>);

impl FormFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

#[axum::async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = TransferError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state).await?;
            return Ok(Self(fields));
        }

        let mut multipart = Multipart::from_request(req, state).await?;

        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| TransferError::bad_request(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field
                .text()
                .await
                .map_err(|e| TransferError::bad_request(e.body_text()))?;
            fields.insert(name, value);
        }
        Ok(Self(fields))
    }
}
