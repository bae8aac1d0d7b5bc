//! Durable copies of profile images.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER};
use reqwest::Client;
use snsdb_core::Platform;

use crate::DbError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Copies images into storage the pipeline controls.
pub trait ImageStore: Send + Sync {
    /// Copy `source_url` under `identity_key` and return the durable URL.
    /// Any download, verification or upload failure yields `None`.
    fn put(
        &self,
        platform: Platform,
        source_url: &str,
        identity_key: &str,
    ) -> impl Future<Output = Option<String>> + Send;

    /// True when `url` already points into this store.
    fn is_durable(&self, url: &str) -> bool;
}

/// Used when no storage backend is configured: nothing is ever durable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopImageStore;

impl ImageStore for NoopImageStore {
    async fn put(&self, _platform: Platform, _source_url: &str, _identity_key: &str) -> Option<String> {
        None
    }

    fn is_durable(&self, _url: &str) -> bool {
        false
    }
}

/// The image backend chosen at startup.
pub enum AnyImageStore {
    Supabase(SupabaseStorage),
    Noop(NoopImageStore),
}

impl ImageStore for AnyImageStore {
    async fn put(&self, platform: Platform, source_url: &str, identity_key: &str) -> Option<String> {
        match self {
            Self::Supabase(s) => s.put(platform, source_url, identity_key).await,
            Self::Noop(s) => s.put(platform, source_url, identity_key).await,
        }
    }

    fn is_durable(&self, url: &str) -> bool {
        match self {
            Self::Supabase(s) => s.is_durable(url),
            Self::Noop(s) => s.is_durable(url),
        }
    }
}

/// Supabase Storage bucket with public read access.
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    /// # Errors
    ///
    /// Returns [`DbError::Http`] if the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        service_key: &str,
        bucket: &str,
        timeout_secs: u64,
    ) -> Result<Self, DbError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}/", self.base_url, self.bucket)
    }

    async fn copy(
        &self,
        platform: Platform,
        source_url: &str,
        identity_key: &str,
    ) -> Result<String, DbError> {
        let response = self
            .client
            .get(source_url)
            .header(ACCEPT, IMAGE_ACCEPT)
            .header(ACCEPT_LANGUAGE, "ja,en-US;q=0.8,en;q=0.6")
            .header(REFERER, platform.image_referer())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DbError::Api {
                table: "image download".to_string(),
                status: status.as_u16(),
                body: String::new(),
            });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        if !content_type.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(DbError::Malformed {
                context: "image download".to_string(),
                reason: format!("content type {content_type} is not an image"),
            });
        }
        let bytes = response.bytes().await?;

        let object_path = format!(
            "{}/{}{}",
            platform.as_str(),
            object_key(identity_key),
            infer_extension(&content_type, source_url)
        );
        let upload = self
            .client
            .post(format!(
                "{}/storage/v1/object/{}/{object_path}",
                self.base_url, self.bucket
            ))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        let status = upload.status();
        if !status.is_success() {
            let body = upload.text().await.unwrap_or_default();
            return Err(DbError::Api {
                table: format!("storage bucket {}", self.bucket),
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(format!("{}{object_path}", self.public_prefix()))
    }
}

impl ImageStore for SupabaseStorage {
    async fn put(&self, platform: Platform, source_url: &str, identity_key: &str) -> Option<String> {
        if self.is_durable(source_url) {
            return Some(source_url.to_string());
        }
        match self.copy(platform, source_url, identity_key).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(%platform, identity_key, error = %e, "profile image copy failed");
                None
            }
        }
    }

    fn is_durable(&self, url: &str) -> bool {
        url.starts_with(&self.public_prefix())
    }
}

/// File extension from the content type, then the URL suffix, else `.jpg`.
pub(crate) fn infer_extension(content_type: &str, url: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => return ".png",
        "image/webp" => return ".webp",
        "image/gif" => return ".gif",
        "image/jpeg" | "image/jpg" => return ".jpg",
        _ => {}
    }
    let path = url.split(['?', '#']).next().unwrap_or_default().to_ascii_lowercase();
    match path.rsplit('.').next() {
        Some("png") => ".png",
        Some("webp") => ".webp",
        Some("gif") => ".gif",
        _ => ".jpg",
    }
}

/// Storage-safe object name for an identity key.
fn object_key(identity_key: &str) -> String {
    identity_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
