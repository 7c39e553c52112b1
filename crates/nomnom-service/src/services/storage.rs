//! Packet object storage.
//!
//! The packet views only need two things from object storage: a
//! prefix-scoped listing and a time-limited download URL. Each is its own
//! capability so callers (and tests) depend on exactly what they use.
//!
//! `S3PacketStorage` implements both against S3 or any S3-compatible store.

use crate::config::Config;
use crate::observability::metrics;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::instrument;

/// One object returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    /// Size in bytes.
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

/// Object storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("listing failed: {0}")]
    Listing(String),

    #[error("download URL signing failed: {0}")]
    Signing(String),
}

/// Prefix-scoped object listing.
///
/// Implementations return every matching object; pagination is theirs to
/// handle.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ListedObject>, StorageError>;
}

/// Time-limited direct download links.
#[async_trait]
pub trait DownloadUrlSigner: Send + Sync {
    async fn download_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;
}

/// Everything the packet routes need from storage.
pub trait PacketStorage: ObjectLister + DownloadUrlSigner {}

impl<T: ObjectLister + DownloadUrlSigner> PacketStorage for T {}

/// S3-backed packet storage.
#[derive(Clone)]
pub struct S3PacketStorage {
    client: Client,
}

impl S3PacketStorage {
    /// Build a client from the service configuration.
    ///
    /// Credentials come from the default AWS provider chain.
    pub async fn from_config(config: &Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(config.s3_region.clone()));

        if let Some(endpoint) = &config.s3_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.s3_force_path_style)
            .build();

        tracing::info!(
            target: "nomnom.services.storage",
            region = %config.s3_region,
            custom_endpoint = config.s3_endpoint_url.is_some(),
            force_path_style = config.s3_force_path_style,
            "Packet storage client configured"
        );

        Self::new(Client::from_conf(s3_config))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectLister for S3PacketStorage {
    #[instrument(skip_all, name = "nomnom.storage.list", fields(bucket = %bucket, prefix = %prefix))]
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ListedObject>, StorageError> {
        let start = Instant::now();
        let mut objects = Vec::new();

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                metrics::record_storage_request("list_objects", "error", start.elapsed());
                StorageError::Listing(DisplayErrorContext(&e).to_string())
            })?;

            objects.extend(page.contents().iter().filter_map(listed_object));
        }

        metrics::record_storage_request("list_objects", "success", start.elapsed());
        tracing::debug!(
            target: "nomnom.services.storage",
            object_count = objects.len(),
            "Listed packet objects"
        );

        Ok(objects)
    }
}

/// Converts one listed S3 object.
///
/// Objects missing a key, size or usable timestamp are skipped, so their
/// packet files end up without metadata.
fn listed_object(object: &aws_sdk_s3::types::Object) -> Option<ListedObject> {
    let (Some(key), Some(size), Some(modified)) =
        (object.key(), object.size(), object.last_modified())
    else {
        tracing::debug!(
            target: "nomnom.services.storage",
            key = ?object.key(),
            "Skipping listed object without key, size or timestamp"
        );
        return None;
    };

    let Some(last_modified) = DateTime::from_timestamp(modified.secs(), modified.subsec_nanos())
    else {
        tracing::debug!(
            target: "nomnom.services.storage",
            key = %key,
            "Skipping listed object with out-of-range timestamp"
        );
        return None;
    };

    Some(ListedObject {
        key: key.to_string(),
        size,
        last_modified,
    })
}

#[async_trait]
impl DownloadUrlSigner for S3PacketStorage {
    #[instrument(skip_all, name = "nomnom.storage.presign", fields(bucket = %bucket))]
    async fn download_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let start = Instant::now();

        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Signing(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                metrics::record_storage_request("presign_download", "error", start.elapsed());
                StorageError::Signing(DisplayErrorContext(&e).to_string())
            })?;

        metrics::record_storage_request("presign_download", "success", start.elapsed());
        Ok(request.uri().to_string())
    }
}

/// In-memory storage for tests.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock object store keyed by bucket.
    ///
    /// Records every listing call so tests can assert how many were made.
    #[derive(Default)]
    pub struct MockObjectStore {
        buckets: HashMap<String, Vec<ListedObject>>,
        list_calls: Mutex<Vec<(String, String)>>,
        sign_count: AtomicUsize,
        fail_listing: bool,
        fail_signing: bool,
    }

    impl MockObjectStore {
        /// Empty store where every call succeeds.
        pub fn new() -> Self {
            Self::default()
        }

        /// Store whose every call fails.
        pub fn failing() -> Self {
            Self {
                fail_listing: true,
                fail_signing: true,
                ..Self::default()
            }
        }

        /// Add an object to a bucket.
        pub fn with_object(
            mut self,
            bucket: &str,
            key: &str,
            size: i64,
            last_modified: DateTime<Utc>,
        ) -> Self {
            self.buckets
                .entry(bucket.to_string())
                .or_default()
                .push(ListedObject {
                    key: key.to_string(),
                    size,
                    last_modified,
                });
            self
        }

        /// Listing calls made so far, as (bucket, prefix).
        pub fn list_calls(&self) -> Vec<(String, String)> {
            match self.list_calls.lock() {
                Ok(calls) => calls.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            }
        }

        /// Number of listing calls made.
        pub fn list_call_count(&self) -> usize {
            self.list_calls().len()
        }

        /// Number of download URLs signed.
        pub fn sign_count(&self) -> usize {
            self.sign_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectLister for MockObjectStore {
        async fn list(
            &self,
            bucket: &str,
            prefix: &str,
        ) -> Result<Vec<ListedObject>, StorageError> {
            match self.list_calls.lock() {
                Ok(mut calls) => calls.push((bucket.to_string(), prefix.to_string())),
                Err(poisoned) => poisoned
                    .into_inner()
                    .push((bucket.to_string(), prefix.to_string())),
            }

            if self.fail_listing {
                return Err(StorageError::Listing("mock listing failure".to_string()));
            }

            Ok(self
                .buckets
                .get(bucket)
                .map(|objects| {
                    objects
                        .iter()
                        .filter(|o| o.key.starts_with(prefix))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    #[async_trait]
    impl DownloadUrlSigner for MockObjectStore {
        async fn download_url(
            &self,
            bucket: &str,
            key: &str,
            expires_in: Duration,
        ) -> Result<String, StorageError> {
            self.sign_count.fetch_add(1, Ordering::SeqCst);

            if self.fail_signing {
                return Err(StorageError::Signing("mock signing failure".to_string()));
            }

            Ok(format!(
                "https://{bucket}.storage.test/{key}?expires={}",
                expires_in.as_secs()
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::mock::MockObjectStore;
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_listed_object_keeps_complete_entries() {
        let object = aws_sdk_s3::types::Object::builder()
            .key("2024/novel/a.pdf")
            .size(1024)
            .last_modified(aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000))
            .build();

        assert_eq!(
            listed_object(&object),
            Some(ListedObject {
                key: "2024/novel/a.pdf".to_string(),
                size: 1024,
                last_modified: ts(1_700_000_000),
            })
        );
    }

    #[test]
    fn test_listed_object_without_size_is_skipped() {
        let object = aws_sdk_s3::types::Object::builder()
            .key("2024/novel/a.pdf")
            .last_modified(aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000))
            .build();

        assert_eq!(listed_object(&object), None);
    }

    #[test]
    fn test_listed_object_without_timestamp_is_skipped() {
        let object = aws_sdk_s3::types::Object::builder()
            .key("2024/novel/a.pdf")
            .size(1024)
            .build();

        assert_eq!(listed_object(&object), None);
    }

    #[tokio::test]
    async fn test_mock_lists_by_prefix_within_bucket() {
        let store = MockObjectStore::new()
            .with_object("packet", "hugo/novel/a.epub", 10, ts(1))
            .with_object("packet", "hugo/short/b.pdf", 20, ts(2))
            .with_object("other", "hugo/novel/c.epub", 30, ts(3));

        let objects = store.list("packet", "hugo/novel").await.unwrap();

        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["hugo/novel/a.epub"]);
        assert_eq!(
            store.list_calls(),
            vec![("packet".to_string(), "hugo/novel".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mock_failing_returns_errors() {
        let store = MockObjectStore::failing();

        assert!(matches!(
            store.list("packet", "x").await,
            Err(StorageError::Listing(_))
        ));
        assert!(matches!(
            store
                .download_url("packet", "x/y", Duration::from_secs(60))
                .await,
            Err(StorageError::Signing(_))
        ));
        assert_eq!(store.list_call_count(), 1);
        assert_eq!(store.sign_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_download_url_carries_expiry() {
        let store = MockObjectStore::new();
        let url = store
            .download_url("packet", "hugo/novel/a.epub", Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(url, "https://packet.storage.test/hugo/novel/a.epub?expires=300");
    }

    #[test]
    fn test_storage_error_display() {
        assert_eq!(
            StorageError::Listing("AccessDenied".to_string()).to_string(),
            "listing failed: AccessDenied"
        );
    }
}
