//! Packet file metadata assembly.
//!
//! Pairs each packet file with the live size and modification time of its
//! storage object. Storage is listed once per distinct key prefix rather
//! than once per file; listings are paginated and rate limited upstream.

use crate::models::{ElectionPacket, PacketFile, PacketFileDisplay, PacketFileMetadata};
use crate::services::storage::{ObjectLister, StorageError};
use std::collections::{BTreeSet, HashMap};
use tracing::instrument;

/// Attach live storage metadata to `files`, preserving their order.
///
/// Files whose key is missing from every listing get `metadata: None`.
/// Any failed listing fails the whole call.
///
/// If two listings return the same key, the later one wins.
#[instrument(skip_all, name = "nomnom.services.packet_metadata", fields(packet_id = packet.id, file_count = files.len()))]
pub async fn assemble<L>(
    packet: &ElectionPacket,
    files: Vec<PacketFile>,
    lister: &L,
) -> Result<Vec<PacketFileDisplay>, StorageError>
where
    L: ObjectLister + ?Sized,
{
    let prefixes: BTreeSet<&str> = files.iter().map(|f| f.s3_object_key.prefix()).collect();

    let mut metadata: HashMap<String, PacketFileMetadata> = HashMap::new();
    for prefix in &prefixes {
        let objects = lister
            .list(&packet.s3_bucket_name, prefix)
            .await
            .map_err(|e| {
                tracing::warn!(
                    target: "nomnom.services.packet_metadata",
                    bucket = %packet.s3_bucket_name,
                    prefix = %prefix,
                    error = %e,
                    "Packet listing failed"
                );
                e
            })?;

        for object in objects {
            metadata.insert(
                object.key,
                PacketFileMetadata {
                    size: object.size,
                    last_modified: object.last_modified,
                },
            );
        }
    }

    tracing::debug!(
        target: "nomnom.services.packet_metadata",
        listing_calls = prefixes.len(),
        objects_found = metadata.len(),
        "Assembled packet metadata"
    );

    Ok(files
        .into_iter()
        .map(|packet_file| {
            let metadata = metadata.get(packet_file.s3_object_key.as_str()).copied();
            PacketFileDisplay {
                packet_file,
                metadata,
            }
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::storage::mock::MockObjectStore;
    use crate::services::storage::ListedObject;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use common::types::StorageKey;

    const BUCKET: &str = "hugo-packet";

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn packet() -> ElectionPacket {
        ElectionPacket {
            id: 1,
            election_id: 1,
            name: "Hugo Packet 2024".to_string(),
            s3_bucket_name: BUCKET.to_string(),
            enabled: true,
        }
    }

    fn file(id: i64, key: &str) -> PacketFile {
        PacketFile {
            id,
            packet_id: 1,
            name: format!("File {id}"),
            s3_object_key: StorageKey::new(key),
            position: 0,
        }
    }

    fn keys(displays: &[PacketFileDisplay]) -> Vec<&str> {
        displays
            .iter()
            .map(|d| d.packet_file.s3_object_key.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_one_listing_per_distinct_prefix() {
        let store = MockObjectStore::new()
            .with_object(BUCKET, "novel/a.epub", 100, ts(10))
            .with_object(BUCKET, "novel/b.epub", 200, ts(20))
            .with_object(BUCKET, "novel/c.epub", 300, ts(30))
            .with_object(BUCKET, "short/d.pdf", 400, ts(40));

        let files = vec![
            file(1, "novel/a.epub"),
            file(2, "novel/b.epub"),
            file(3, "short/d.pdf"),
            file(4, "novel/c.epub"),
        ];

        let displays = assemble(&packet(), files, &store).await.unwrap();

        assert_eq!(displays.len(), 4);
        assert_eq!(store.list_call_count(), 2);

        let mut prefixes: Vec<String> = store.list_calls().into_iter().map(|(_, p)| p).collect();
        prefixes.sort();
        assert_eq!(prefixes, vec!["novel".to_string(), "short".to_string()]);
        assert!(store.list_calls().iter().all(|(b, _)| b == BUCKET));
    }

    #[tokio::test]
    async fn test_output_preserves_input_order() {
        let store = MockObjectStore::new()
            .with_object(BUCKET, "b/2.pdf", 2, ts(2))
            .with_object(BUCKET, "a/1.pdf", 1, ts(1))
            .with_object(BUCKET, "c/3.pdf", 3, ts(3));

        let files = vec![file(3, "c/3.pdf"), file(1, "a/1.pdf"), file(2, "b/2.pdf")];

        let displays = assemble(&packet(), files, &store).await.unwrap();

        assert_eq!(keys(&displays), vec!["c/3.pdf", "a/1.pdf", "b/2.pdf"]);
        let sizes: Vec<i64> = displays
            .iter()
            .map(|d| d.metadata.map(|m| m.size).unwrap_or(-1))
            .collect();
        assert_eq!(sizes, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_missing_object_has_no_metadata() {
        let store = MockObjectStore::new().with_object(BUCKET, "novel/a.epub", 100, ts(10));

        let files = vec![file(1, "novel/a.epub"), file(2, "novel/not-uploaded.epub")];

        let displays = assemble(&packet(), files, &store).await.unwrap();

        assert_eq!(
            displays.first().and_then(|d| d.metadata),
            Some(PacketFileMetadata {
                size: 100,
                last_modified: ts(10)
            })
        );
        assert_eq!(displays.get(1).map(|d| d.metadata), Some(None));
    }

    #[tokio::test]
    async fn test_lookup_uses_exact_key() {
        // Listing "novel" also returns "novel-extra/...", which must not match.
        let store = MockObjectStore::new()
            .with_object(BUCKET, "novel-extra/a.epub", 1, ts(1))
            .with_object(BUCKET, "novel/a.epub.bak", 2, ts(2));

        let displays = assemble(&packet(), vec![file(1, "novel/a.epub")], &store)
            .await
            .unwrap();

        assert_eq!(displays.first().map(|d| d.metadata), Some(None));
    }

    #[tokio::test]
    async fn test_top_level_key_is_listed_by_itself() {
        let store = MockObjectStore::new().with_object(BUCKET, "readme.txt", 12, ts(5));

        let displays = assemble(&packet(), vec![file(1, "readme.txt")], &store)
            .await
            .unwrap();

        assert_eq!(
            store.list_calls(),
            vec![(BUCKET.to_string(), "readme.txt".to_string())]
        );
        assert_eq!(displays.first().and_then(|d| d.metadata).map(|m| m.size), Some(12));
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let store = MockObjectStore::failing();

        let result = assemble(
            &packet(),
            vec![file(1, "novel/a.epub"), file(2, "short/b.pdf")],
            &store,
        )
        .await;

        assert!(matches!(result, Err(StorageError::Listing(_))));
        // Stops at the first failure
        assert_eq!(store.list_call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_packet_makes_no_calls() {
        let store = MockObjectStore::new();

        let displays = assemble(&packet(), Vec::new(), &store).await.unwrap();

        assert!(displays.is_empty());
        assert_eq!(store.list_call_count(), 0);
    }

    /// Lister that returns the same key with different sizes per prefix.
    struct CollidingLister;

    #[async_trait]
    impl ObjectLister for CollidingLister {
        async fn list(
            &self,
            _bucket: &str,
            prefix: &str,
        ) -> Result<Vec<ListedObject>, StorageError> {
            let size = if prefix == "a" { 1 } else { 2 };
            Ok(vec![ListedObject {
                key: "a/shared.pdf".to_string(),
                size,
                last_modified: DateTime::from_timestamp(0, 0).unwrap_or_default(),
            }])
        }
    }

    #[tokio::test]
    async fn test_colliding_keys_last_listing_wins() {
        // Prefixes are listed in sorted order: "a" then "b".
        let files = vec![file(1, "a/shared.pdf"), file(2, "b/other.pdf")];

        let displays = assemble(&packet(), files, &CollidingLister).await.unwrap();

        assert_eq!(displays.first().and_then(|d| d.metadata).map(|m| m.size), Some(2));
    }
}
