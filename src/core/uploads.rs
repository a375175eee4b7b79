//! File uploads for product images, post covers and downloadable assets.
//!
//! Files are stored by an external upload service. [`FileStore`] is the seam;
//! [`HttpFileStore`] PUTs the bytes to the service and returns the public URL
//! it reports. [`validate_upload`] runs before any bytes leave the server.

use crate::{
    config::settings::UploadSettings,
    errors::{Error, Result},
};
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif"];

const ASSET_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/pdf",
    "application/gzip",
    "application/x-tar",
    "application/x-7z-compressed",
];

/// What an uploaded file is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    /// Product thumbnail
    ProductImage,
    /// Insights post cover
    PostCover,
    /// Downloadable digital asset
    ProductFile,
}

impl UploadKind {
    /// Folder prefix of the storage key
    #[must_use]
    pub const fn folder(self) -> &'static str {
        match self {
            Self::ProductImage => "products/images",
            Self::PostCover => "posts/covers",
            Self::ProductFile => "products/files",
        }
    }

    const fn is_image(self) -> bool {
        matches!(self, Self::ProductImage | Self::PostCover)
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ProductImage => "product image",
            Self::PostCover => "post cover",
            Self::ProductFile => "product file",
        })
    }
}

/// A file to store
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// What the file is for
    pub kind: UploadKind,
    /// Original file name
    pub file_name: String,
    /// MIME type sent by the browser
    pub content_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

/// A stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Storage key
    pub key: String,
    /// Public URL
    pub url: String,
}

/// Storage backend for uploaded files.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores a validated file and returns where it can be fetched.
    async fn upload(&self, request: UploadRequest) -> Result<UploadedFile>;
}

fn base_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Checks type and size of a file before it is uploaded.
///
/// # Errors
/// Returns a validation error if the file is empty, too large, or of a type
/// not accepted for `kind`.
pub fn validate_upload(
    kind: UploadKind,
    content_type: &str,
    size: u64,
    limits: &UploadSettings,
) -> Result<()> {
    let content_type = base_content_type(content_type);
    let (allowed, max_bytes) = if kind.is_image() {
        (IMAGE_TYPES, limits.max_image_bytes)
    } else {
        (ASSET_TYPES, limits.max_asset_bytes)
    };

    if !allowed.contains(&content_type.as_str()) {
        return Err(Error::validation(format!(
            "Files of type '{content_type}' are not accepted for a {kind}"
        )));
    }
    if size == 0 {
        return Err(Error::validation("The uploaded file is empty"));
    }
    if size > max_bytes {
        return Err(Error::validation(format!(
            "A {kind} can be at most {} MB",
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Keeps ASCII letters, digits, dots, dashes and underscores of a file name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(['-', '.']).to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Storage key `<folder>/<random>-<file name>`.
#[must_use]
pub fn storage_key(kind: UploadKind, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        kind.folder(),
        Uuid::new_v4().simple(),
        sanitize_file_name(file_name)
    )
}

/// Client for the HTTP upload service
pub struct HttpFileStore {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
    #[serde(default)]
    key: Option<String>,
}

impl HttpFileStore {
    /// Creates a client for the service at `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl FileStore for HttpFileStore {
    async fn upload(&self, request: UploadRequest) -> Result<UploadedFile> {
        let key = storage_key(request.kind, &request.file_name);
        let size = request.bytes.len();
        let response = self
            .client
            .put(format!("{}/{key}", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header(header::CONTENT_TYPE, request.content_type)
            .body(request.bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %key, body = %body, "Upload service rejected file");
            return Err(Error::Upload {
                message: format!("upload service responded with {status}"),
            });
        }

        let stored: UploadResponse = response.json().await?;
        let key = stored.key.unwrap_or(key);
        info!(%key, size, "File uploaded");
        Ok(UploadedFile {
            key,
            url: stored.url,
        })
    }
}

/// Stand-in used when no `UPLOAD_API_KEY` is configured.
pub struct UnconfiguredFileStore;

#[async_trait]
impl FileStore for UnconfiguredFileStore {
    async fn upload(&self, _request: UploadRequest) -> Result<UploadedFile> {
        Err(Error::Upload {
            message: "Uploads are not configured".to_string(),
        })
    }
}
