use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::{FromRequest, Multipart};
use tracing::debug;

use super::{
    context::{RequestContext, UploadedFile},
    guard::Guard,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

/// Parses a `multipart/form-data` body, accepting at most one file and only
/// under `field`. Text parts land in the context form. Requests that are not
/// multipart pass through untouched.
pub struct SingleUpload {
    pub field: &'static str,
}

impl SingleUpload {
    pub fn new(field: &'static str) -> Self {
        Self { field }
    }
}

fn is_multipart(ctx: &RequestContext) -> bool {
    ctx.content_type()
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[async_trait]
impl Guard for SingleUpload {
    fn name(&self) -> &'static str {
        "upload"
    }

    async fn check(&self, _state: &AppState, ctx: &mut RequestContext) -> AppResult<()> {
        if !is_multipart(ctx) {
            return Ok(());
        }
        let req = ctx
            .take_request()
            .ok_or_else(|| AppError::bad_request("request body already consumed"))?;
        let mut mp = Multipart::from_request(req, &())
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;

        let mut form = HashMap::new();
        let mut upload: Option<UploadedFile> = None;
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(format!("malformed multipart payload: {}", e.body_text())))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if field.file_name().is_none() {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                form.insert(name, text);
                continue;
            }

            if name != self.field {
                return Err(AppError::bad_request(format!("unexpected file field {:?}", name)));
            }
            if upload.is_some() {
                return Err(AppError::bad_request(format!(
                    "only one file is accepted in {:?}",
                    self.field
                )));
            }
            let file_name = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            debug!(field = %name, size = bytes.len(), %content_type, "file parsed");
            upload = Some(UploadedFile {
                field: name,
                file_name,
                content_type,
                bytes,
            });
        }

        ctx.form = Some(form);
        ctx.upload = upload;
        Ok(())
    }
}
