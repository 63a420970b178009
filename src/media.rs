use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{routing::UploadedFile, storage::StorageClient};

/// Reference to an uploaded media object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub public_id: String,
    pub secure_url: String,
}

/// Stores `file` under `prefix` and returns the reference to keep on the record.
pub async fn save_upload(
    storage: &dyn StorageClient,
    prefix: &str,
    file: &UploadedFile,
) -> anyhow::Result<Asset> {
    let ext = ext_from_mime(&file.content_type)
        .or_else(|| ext_from_file_name(file.file_name.as_deref()))
        .unwrap_or("bin");
    let key = format!("{}/{}-{}.{}", prefix, file.field, Uuid::new_v4(), ext);
    storage
        .put_object(&key, file.bytes.clone(), &file.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    info!(%key, size = file.bytes.len(), "media stored");
    Ok(Asset {
        secure_url: storage.object_url(&key),
        public_id: key,
    })
}

/// Best-effort removal; failures are logged, not returned.
pub async fn remove_assets<'a>(storage: &dyn StorageClient, assets: impl IntoIterator<Item = &'a Asset>) {
    for asset in assets {
        if let Err(e) = storage.delete_object(&asset.public_id).await {
            warn!(error = %e, key = %asset.public_id, "media cleanup failed");
        }
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

fn ext_from_file_name(name: Option<&str>) -> Option<&'static str> {
    let ext = name?.rsplit_once('.')?.1.to_ascii_lowercase();
    ["jpg", "jpeg", "png", "webp", "gif", "mp4", "webm", "pdf"]
        .into_iter()
        .find(|known| *known == ext)
}
