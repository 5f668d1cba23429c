//! Durable profile storage with content, schema, and centroid addressing.
//!
//! Layout on disk: `<root>/index.json` holds every [`StoredProfileInfo`];
//! each full profile lives in `<root>/<id>.json`. The index is the source of
//! truth: deletion removes the blob first and saves the index after, so a
//! crash can orphan a blob but never dangle an index row. Orphaned blobs are
//! garbage-collected by [`ProfileStore::prune`].

pub mod hashing;
pub mod signature;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use xxhash_rust::xxh64::xxh64;

use crate::error::{Result, TablescopeError};
use crate::profile::DataProfile;
use crate::segments::{centroid_distance, SegmentProfiler};

pub use hashing::{hash_bytes, hash_file, profile_schema_hash, query_fingerprint, schema_hash};
pub use signature::{ColumnSignature, RowCountBucket, StatisticalSignature};

const INDEX_FILE: &str = "index.json";

/// Index row describing one stored profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProfileInfo {
    /// 12 hex chars, unique within the store.
    pub id: String,
    pub source_path: String,
    pub file_name: String,
    pub stored_at: DateTime<Utc>,
    pub row_count: i64,
    pub column_count: usize,
    /// 16 hex chars for files, `db:` + 16 hex for query sources.
    pub content_hash: String,
    /// Bytes for file sources, row count for query sources.
    pub file_size: u64,
    pub schema_hash: String,
    pub statistical_signature: StatisticalSignature,
    pub centroid_vector: Vec<f64>,
    pub is_pinned_baseline: bool,
    pub exclude_from_baseline: bool,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub segment_name: Option<String>,
    pub segment_filter: Option<String>,
    pub segment_group: Option<String>,
    /// Path of the full profile JSON blob.
    pub profile_path: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileIndex {
    profiles: Vec<StoredProfileInfo>,
}

/// Segment metadata attached at store time.
#[derive(Debug, Clone, Default)]
pub struct SegmentInfo {
    pub name: Option<String>,
    pub filter: Option<String>,
    pub group: Option<String>,
}

/// File-system backed profile store.
///
/// Single-owner within a process; sharing a store directory across processes
/// is unsupported.
pub struct ProfileStore {
    root: PathBuf,
    index: Vec<StoredProfileInfo>,
}

impl ProfileStore {
    /// Opens (or creates) a store rooted at `root`. A corrupt index is
    /// logged and reloaded as empty; blobs on disk stay invisible until the
    /// next prune garbage-collects them.
    #[instrument(skip(root))]
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| TablescopeError::PathUnavailable(format!("{}: {e}", root.display())))?;

        let index_path = root.join(INDEX_FILE);
        let index = match tokio::fs::read_to_string(&index_path).await {
            Ok(text) => match serde_json::from_str::<ProfileIndex>(&text) {
                Ok(parsed) => parsed.profiles,
                Err(e) => {
                    warn!(error = %e, "profile index corrupt, reloading as empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        info!(profiles = index.len(), root = %root.display(), "profile store opened");
        Ok(Self { root, index })
    }

    /// All index rows, newest last.
    pub fn list(&self) -> &[StoredProfileInfo] {
        &self.index
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    async fn save_index(&self) -> Result<()> {
        let payload = serde_json::to_string_pretty(&ProfileIndex {
            profiles: self.index.clone(),
        })?;
        tokio::fs::write(self.root.join(INDEX_FILE), payload)
            .await
            .map_err(|e| {
                TablescopeError::PathUnavailable(format!("{}: {e}", self.root.display()))
            })?;
        Ok(())
    }

    fn next_id(&self, content_hash: &str, stored_at: &DateTime<Utc>, source_path: &str) -> String {
        let mut salt = 0u32;
        loop {
            let material = format!("{content_hash}{}{source_path}{salt}", stored_at.to_rfc3339());
            let id = format!("{:012x}", xxh64(material.as_bytes(), 0) & 0xffff_ffff_ffff);
            if !self.index.iter().any(|p| p.id == id) {
                return id;
            }
            salt += 1;
        }
    }

    /// Stores a profile of a file source: hashes the file's bytes and size.
    pub async fn store_file_profile(
        &mut self,
        profile: &DataProfile,
        file_path: impl AsRef<Path>,
    ) -> Result<StoredProfileInfo> {
        let file_path = file_path.as_ref();
        let content_hash = hash_file(file_path)?;
        let file_size = tokio::fs::metadata(file_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        self.store_profile(profile, content_hash, file_size, SegmentInfo::default())
            .await
    }

    /// Stores a profile of a query source using its structural fingerprint.
    pub async fn store_query_profile(
        &mut self,
        profile: &DataProfile,
        segment: SegmentInfo,
    ) -> Result<StoredProfileInfo> {
        let content_hash = query_fingerprint(profile);
        let file_size = profile.row_count.max(0) as u64;
        self.store_profile(profile, content_hash, file_size, segment)
            .await
    }

    /// Stores a profile with an explicit content hash.
    #[instrument(skip(self, profile, segment), fields(source = %profile.source_path))]
    pub async fn store_profile(
        &mut self,
        profile: &DataProfile,
        content_hash: String,
        file_size: u64,
        segment: SegmentInfo,
    ) -> Result<StoredProfileInfo> {
        let stored_at = Utc::now();
        let id = self.next_id(&content_hash, &stored_at, &profile.source_path);
        let blob_path = self.blob_path(&id);

        let info = StoredProfileInfo {
            id: id.clone(),
            source_path: profile.source_path.clone(),
            file_name: Path::new(&profile.source_path)
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or(&profile.source_path)
                .to_string(),
            stored_at,
            row_count: profile.row_count,
            column_count: profile.column_count,
            content_hash,
            file_size,
            schema_hash: profile_schema_hash(profile),
            statistical_signature: StatisticalSignature::from_profile(profile),
            centroid_vector: SegmentProfiler::new().centroid_vector(profile),
            is_pinned_baseline: false,
            exclude_from_baseline: false,
            tags: None,
            notes: None,
            segment_name: segment.name,
            segment_filter: segment.filter,
            segment_group: segment.group,
            profile_path: blob_path.display().to_string(),
        };

        tokio::fs::write(&blob_path, serde_json::to_string_pretty(profile)?)
            .await
            .map_err(|e| {
                TablescopeError::PathUnavailable(format!("{}: {e}", blob_path.display()))
            })?;
        self.index.push(info.clone());
        self.save_index().await?;
        debug!(id = %info.id, "profile stored");
        Ok(info)
    }

    /// Loads the full profile blob for an index row.
    pub async fn load_profile(&self, id: &str) -> Result<DataProfile> {
        let info = self
            .get(id)
            .ok_or_else(|| TablescopeError::invalid_data(format!("unknown profile id: {id}")))?;
        let text = tokio::fs::read_to_string(&info.profile_path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Looks up an index row by id.
    pub fn get(&self, id: &str) -> Option<&StoredProfileInfo> {
        self.index.iter().find(|p| p.id == id)
    }

    /// Deletes a stored profile: blob first, index saved after.
    pub async fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(pos) = self.index.iter().position(|p| p.id == id) else {
            return Ok(false);
        };
        let blob = self.blob_path(id);
        if blob.exists() {
            tokio::fs::remove_file(&blob).await?;
        }
        self.index.remove(pos);
        self.save_index().await?;
        Ok(true)
    }

    /// Exact-match lookup: hashes the file and returns the stored profile
    /// with the same content hash, if any.
    pub fn find_by_content_hash(&self, content_hash: &str) -> Option<&StoredProfileInfo> {
        self.index.iter().find(|p| p.content_hash == content_hash)
    }

    /// Cheap existence probe: filters candidates by byte size first and only
    /// hashes the file when a size matches.
    pub async fn quick_find_existing(
        &self,
        file_path: impl AsRef<Path>,
    ) -> Result<Option<&StoredProfileInfo>> {
        let file_path = file_path.as_ref();
        let size = tokio::fs::metadata(file_path)
            .await
            .map_err(|e| {
                TablescopeError::source_unreadable(file_path.display().to_string(), e.to_string())
            })?
            .len();

        if !self.index.iter().any(|p| p.file_size == size) {
            return Ok(None);
        }
        let hash = hash_file(file_path)?;
        Ok(self.find_by_content_hash(&hash))
    }

    /// All stored profiles sharing a schema hash, oldest first.
    pub fn find_by_schema_hash(&self, schema_hash: &str) -> Vec<&StoredProfileInfo> {
        let mut rows: Vec<&StoredProfileInfo> = self
            .index
            .iter()
            .filter(|p| p.schema_hash == schema_hash)
            .collect();
        rows.sort_by_key(|p| p.stored_at);
        rows
    }

    /// Stored profiles whose centroid lies within `max_distance` of the
    /// given profile's centroid, sorted by distance ascending.
    pub fn find_within_distance(
        &self,
        profile: &DataProfile,
        max_distance: f64,
    ) -> Vec<(&StoredProfileInfo, f64)> {
        let target = SegmentProfiler::new().centroid_vector(profile);
        let mut hits: Vec<(&StoredProfileInfo, f64)> = self
            .index
            .iter()
            .map(|p| (p, centroid_distance(&target, &p.centroid_vector)))
            .filter(|(_, d)| *d <= max_distance)
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    /// The baseline for a schema: the pinned profile if one exists, else the
    /// oldest profile not excluded from baseline duty.
    pub fn baseline_for(&self, schema_hash: &str) -> Option<&StoredProfileInfo> {
        let family = self.find_by_schema_hash(schema_hash);
        family
            .iter()
            .find(|p| p.is_pinned_baseline)
            .copied()
            .or_else(|| {
                family
                    .iter()
                    .find(|p| !p.exclude_from_baseline)
                    .copied()
            })
    }

    /// Pins a profile as its schema's baseline, clearing any previous pin
    /// in the same schema family.
    pub async fn pin_baseline(&mut self, id: &str) -> Result<()> {
        let schema_hash = self
            .get(id)
            .map(|p| p.schema_hash.clone())
            .ok_or_else(|| TablescopeError::invalid_data(format!("unknown profile id: {id}")))?;

        for row in &mut self.index {
            if row.schema_hash == schema_hash {
                row.is_pinned_baseline = row.id == id;
            }
        }
        self.save_index().await
    }

    /// Removes the pin from a profile without pinning another.
    pub async fn unpin_baseline(&mut self, id: &str) -> Result<()> {
        for row in &mut self.index {
            if row.id == id {
                row.is_pinned_baseline = false;
            }
        }
        self.save_index().await
    }

    /// Marks a profile as excluded from (or restored to) baseline selection.
    pub async fn set_excluded(&mut self, id: &str, excluded: bool) -> Result<()> {
        for row in &mut self.index {
            if row.id == id {
                row.exclude_from_baseline = excluded;
            }
        }
        self.save_index().await
    }

    /// Keeps the `keep_per_schema` most recent profiles per schema plus all
    /// pinned baselines; deletes the rest. Also garbage-collects blob files
    /// that no index row references. Returns the number of deletions.
    #[instrument(skip(self))]
    pub async fn prune(&mut self, keep_per_schema: usize) -> Result<usize> {
        let mut by_schema: HashMap<String, Vec<StoredProfileInfo>> = HashMap::new();
        for row in &self.index {
            by_schema
                .entry(row.schema_hash.clone())
                .or_default()
                .push(row.clone());
        }

        let mut doomed: Vec<String> = Vec::new();
        for rows in by_schema.values_mut() {
            rows.sort_by_key(|p| std::cmp::Reverse(p.stored_at));
            for (i, row) in rows.iter().enumerate() {
                if i >= keep_per_schema && !row.is_pinned_baseline {
                    doomed.push(row.id.clone());
                }
            }
        }

        let mut deleted = 0usize;
        for id in doomed {
            if self.delete(&id).await? {
                deleted += 1;
            }
        }

        // GC: blobs on disk with no index row (crash leftovers, corrupt-index
        // recovery residue).
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == INDEX_FILE || !name.ends_with(".json") {
                continue;
            }
            let id = name.trim_end_matches(".json");
            if self.get(id).is_none() {
                tokio::fs::remove_file(entry.path()).await?;
                deleted += 1;
                debug!(blob = %name, "garbage-collected orphaned profile blob");
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ColumnProfile, ColumnType};
    use std::time::Duration;

    fn sample_profile(source: &str, mean: f64) -> DataProfile {
        let mut col = ColumnProfile::minimal("amount", ColumnType::Numeric, 100);
        col.mean = Some(mean);
        col.min = Some(0.0);
        col.max = Some(100.0);
        col.std_dev = Some(10.0);
        DataProfile {
            source_path: source.to_string(),
            row_count: 100,
            column_count: 1,
            profile_time: Duration::from_millis(2),
            columns: vec![col],
            alerts: vec![],
            correlations: vec![],
            insights: vec![],
        }
    }

    #[tokio::test]
    async fn test_store_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::open(dir.path()).await.unwrap();

        let profile = sample_profile("a.csv", 50.0);
        let info = store
            .store_profile(&profile, "feedface00000000".into(), 10, SegmentInfo::default())
            .await
            .unwrap();
        assert_eq!(info.id.len(), 12);

        let loaded = store.load_profile(&info.id).await.unwrap();
        assert_eq!(loaded.columns, profile.columns);
    }

    #[tokio::test]
    async fn test_reopen_preserves_index() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let mut store = ProfileStore::open(dir.path()).await.unwrap();
            store
                .store_profile(
                    &sample_profile("a.csv", 50.0),
                    "cafe000000000001".into(),
                    10,
                    SegmentInfo::default(),
                )
                .await
                .unwrap()
                .id
        };

        let store = ProfileStore::open(dir.path()).await.unwrap();
        assert!(store.get(&id).is_some());
    }

    #[tokio::test]
    async fn test_corrupt_index_reloads_empty() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(INDEX_FILE), "{ not json")
            .await
            .unwrap();
        let store = ProfileStore::open(dir.path()).await.unwrap();
        assert!(store.list().is_empty());
    }

    #[tokio::test]
    async fn test_content_hash_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::open(dir.path()).await.unwrap();
        store
            .store_profile(
                &sample_profile("a.csv", 50.0),
                "abc0000000000001".into(),
                10,
                SegmentInfo::default(),
            )
            .await
            .unwrap();

        assert!(store.find_by_content_hash("abc0000000000001").is_some());
        assert!(store.find_by_content_hash("missing").is_none());
    }

    #[tokio::test]
    async fn test_baseline_pinning_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::open(dir.path()).await.unwrap();

        let first = store
            .store_profile(
                &sample_profile("a.csv", 50.0),
                "1111000000000000".into(),
                10,
                SegmentInfo::default(),
            )
            .await
            .unwrap();
        let second = store
            .store_profile(
                &sample_profile("a.csv", 60.0),
                "2222000000000000".into(),
                10,
                SegmentInfo::default(),
            )
            .await
            .unwrap();
        let schema = first.schema_hash.clone();
        assert_eq!(schema, second.schema_hash);

        // Default baseline: the oldest non-excluded profile.
        assert_eq!(store.baseline_for(&schema).unwrap().id, first.id);

        // Pinning the newer clears nothing else but redirects the baseline.
        store.pin_baseline(&second.id).await.unwrap();
        assert_eq!(store.baseline_for(&schema).unwrap().id, second.id);

        // Pinning the first clears the pin on the second.
        store.pin_baseline(&first.id).await.unwrap();
        assert_eq!(store.baseline_for(&schema).unwrap().id, first.id);
        assert!(!store.get(&second.id).unwrap().is_pinned_baseline);
    }

    #[tokio::test]
    async fn test_excluded_profiles_skip_baseline_duty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::open(dir.path()).await.unwrap();

        let first = store
            .store_profile(
                &sample_profile("a.csv", 50.0),
                "3333000000000000".into(),
                10,
                SegmentInfo::default(),
            )
            .await
            .unwrap();
        let second = store
            .store_profile(
                &sample_profile("a.csv", 60.0),
                "4444000000000000".into(),
                10,
                SegmentInfo::default(),
            )
            .await
            .unwrap();

        store.set_excluded(&first.id, true).await.unwrap();
        assert_eq!(
            store.baseline_for(&first.schema_hash).unwrap().id,
            second.id
        );
    }

    #[tokio::test]
    async fn test_prune_keeps_recent_and_pinned() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::open(dir.path()).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            let info = store
                .store_profile(
                    &sample_profile("a.csv", i as f64),
                    format!("{i:016x}"),
                    10,
                    SegmentInfo::default(),
                )
                .await
                .unwrap();
            ids.push(info.id);
            // Distinct stored_at ordering.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        store.pin_baseline(&ids[0]).await.unwrap();

        let deleted = store.prune(2).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.get(&ids[0]).is_some(), "pinned survives");
        assert!(store.get(&ids[4]).is_some(), "most recent survives");
        assert!(store.get(&ids[3]).is_some(), "second most recent survives");
        assert!(store.get(&ids[1]).is_none());
        assert!(store.get(&ids[2]).is_none());
    }

    #[tokio::test]
    async fn test_prune_garbage_collects_orphans() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("deadbeef0000.json"), "{}")
            .await
            .unwrap();
        let mut store = ProfileStore::open(dir.path()).await.unwrap();
        let deleted = store.prune(10).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(!dir.path().join("deadbeef0000.json").exists());
    }

    #[tokio::test]
    async fn test_find_within_distance_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::open(dir.path()).await.unwrap();

        store
            .store_profile(
                &sample_profile("near.csv", 50.0),
                "aaaa000000000000".into(),
                10,
                SegmentInfo::default(),
            )
            .await
            .unwrap();
        store
            .store_profile(
                &sample_profile("far.csv", 95.0),
                "bbbb000000000000".into(),
                10,
                SegmentInfo::default(),
            )
            .await
            .unwrap();

        let probe = sample_profile("probe.csv", 52.0);
        let hits = store.find_within_distance(&probe, 1.0);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].1 <= hits[1].1);
        assert_eq!(hits[0].0.source_path, "near.csv");
    }

    #[tokio::test]
    async fn test_delete_removes_blob_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::open(dir.path()).await.unwrap();
        let info = store
            .store_profile(
                &sample_profile("a.csv", 50.0),
                "cccc000000000000".into(),
                10,
                SegmentInfo::default(),
            )
            .await
            .unwrap();

        let blob = dir.path().join(format!("{}.json", info.id));
        assert!(blob.exists());
        assert!(store.delete(&info.id).await.unwrap());
        assert!(!blob.exists());
        assert!(store.get(&info.id).is_none());
        assert!(!store.delete(&info.id).await.unwrap());
    }
}
