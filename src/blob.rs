//! Blob Interface — `put/get/presign/delete` over user-scoped
//! keys. Keys are never exposed directly to clients; every client read
//! goes through a presigned URL with a bounded TTL.
//!
//! Not present anywhere in the corpus this crate was grounded on — there
//! is no object-storage example to imitate — so this reaches for
//! `aws-sdk-s3`, the standard idiomatic crate for S3-compatible blob
//! storage, behind a narrow trait so the rest of the crate never touches
//! the SDK directly (see `DESIGN.md`).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use uuid::Uuid;

use crate::db::DocumentType;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// `{userId}/{type}_{uuid}.{ext}`. No cross-user access: every key is
/// rooted at the owning user's ID, and presigned URLs are the only path
/// clients get to read through.
pub fn scoped_key(user_id: Uuid, doc_type: DocumentType, ext: &str) -> String {
    format!(
        "{}/{}_{}.{}",
        user_id,
        doc_type.as_str().to_ascii_lowercase(),
        Uuid::new_v4(),
        ext
    )
}

/// Pulls the scoped key back out of a previously-issued presigned URL, for
/// callers migrating away from storing full URLs.
pub fn extract_key_from_url(legacy_url: &str, bucket: &str) -> Option<String> {
    let marker = format!("/{bucket}/");
    let idx = legacy_url.find(&marker)?;
    let rest = &legacy_url[idx + marker.len()..];
    Some(rest.split('?').next().unwrap_or(rest).to_string())
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub async fn from_env(bucket: impl Into<String>) -> Result<Self> {
        let config = aws_config::load_from_env().await;
        Ok(Self {
            client: Client::new(&config),
            bucket: bucket.into(),
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .context("failed to upload blob")?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("failed to download blob")?;
        let bytes = output
            .body
            .collect()
            .await
            .context("failed to read blob body")?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String> {
        let presign_config =
            PresigningConfig::expires_in(ttl).context("invalid presign TTL")?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .context("failed to presign blob URL")?;
        Ok(presigned.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("failed to delete blob")?;
        Ok(())
    }
}

/// Accepted upload MIME types.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "application/pdf"];

/// Magic-number sniff, performed before `put`. Best-effort:
/// checks the handful of leading bytes that distinguish JPEG/PNG/PDF.
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else {
        None
    }
}

pub fn extension_for_content_type(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_jpeg_png_pdf() {
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(
            sniff_content_type(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            Some("image/png")
        );
        assert_eq!(sniff_content_type(b"%PDF-1.4 ..."), Some("application/pdf"));
        assert_eq!(sniff_content_type(b"not a real file"), None);
    }

    #[test]
    fn key_is_scoped_to_user_and_type() {
        let user_id = Uuid::new_v4();
        let key = scoped_key(user_id, DocumentType::Ktp, "jpg");
        assert!(key.starts_with(&format!("{user_id}/ktp_")));
        assert!(key.ends_with(".jpg"));
    }

    #[test]
    fn extracts_key_from_legacy_url() {
        let url = "https://s3.amazonaws.com/my-bucket/abc/ktp_123.jpg?X-Amz-Signature=xyz";
        let key = extract_key_from_url(url, "my-bucket").unwrap();
        assert_eq!(key, "abc/ktp_123.jpg");
    }
}
