//! Content and schema hashing for profile deduplication.
//!
//! File sources hash their bytes with streaming xxHash64 (1 MiB buffer);
//! query sources get a structural fingerprint prefixed with `db:`. Schema
//! hashes canonicalize `name:type` pairs so profiles of the same dataset
//! family cluster across time.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use xxhash_rust::xxh64::{xxh64, Xxh64};

use crate::error::{Result, TablescopeError};
use crate::profile::{ColumnType, DataProfile};

const HASH_BUFFER_SIZE: usize = 1024 * 1024;
const HASH_SEED: u64 = 0;

/// Hashes a file's bytes with streaming xxHash64, rendered as 16 hex chars.
/// The digest is independent of the read chunk size.
pub fn hash_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| {
        TablescopeError::source_unreadable(path.display().to_string(), e.to_string())
    })?;

    let mut hasher = Xxh64::new(HASH_SEED);
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:016x}", hasher.digest()))
}

/// Hashes a byte slice in one shot. Agrees with [`hash_file`] on identical bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:016x}", xxh64(bytes, HASH_SEED))
}

/// Structural fingerprint for non-file sources: schema plus per-column
/// min/max/mean/null/unique, prefixed `db:`.
pub fn query_fingerprint(profile: &DataProfile) -> String {
    let mut canonical = schema_string(
        &profile
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.inferred_type))
            .collect::<Vec<_>>(),
    );
    for column in &profile.columns {
        canonical.push_str(&format!(
            "{}:{}:{}:{}:{}:{}|",
            column.name.to_lowercase(),
            column.min.map(|v| v.to_string()).unwrap_or_default(),
            column.max.map(|v| v.to_string()).unwrap_or_default(),
            column.mean.map(|v| v.to_string()).unwrap_or_default(),
            column.null_count,
            column.unique_count,
        ));
    }
    format!("db:{:016x}", xxh64(canonical.as_bytes(), HASH_SEED))
}

/// Canonical schema string: `lowercase(name):type|` joined over columns
/// sorted by name case-insensitively.
fn schema_string(columns: &[(String, ColumnType)]) -> String {
    let mut sorted: Vec<&(String, ColumnType)> = columns.iter().collect();
    sorted.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));
    sorted
        .iter()
        .map(|(name, ty)| format!("{}:{}|", name.to_lowercase(), ty.as_str()))
        .collect()
}

/// xxHash64 of the canonical schema string, as 16 hex chars.
pub fn schema_hash(columns: &[(String, ColumnType)]) -> String {
    format!("{:016x}", xxh64(schema_string(columns).as_bytes(), HASH_SEED))
}

/// Schema hash of a finished profile.
pub fn profile_schema_hash(profile: &DataProfile) -> String {
    schema_hash(
        &profile
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.inferred_type))
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_hash_matches_single_shot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let payload: Vec<u8> = (0..3_000_000u32).map(|i| (i % 251) as u8).collect();
        file.write_all(&payload).unwrap();
        file.flush().unwrap();

        // Streaming over 1 MiB chunks must agree with hashing all bytes at once.
        assert_eq!(hash_file(file.path()).unwrap(), hash_bytes(&payload));
    }

    #[test]
    fn test_file_hash_deterministic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"name,age\nAda,36\n").unwrap();
        file.flush().unwrap();

        let first = hash_file(file.path()).unwrap();
        let second = hash_file(file.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
    }

    #[test]
    fn test_schema_hash_is_order_and_case_insensitive() {
        let a = schema_hash(&[
            ("UserId".to_string(), ColumnType::Id),
            ("amount".to_string(), ColumnType::Numeric),
        ]);
        let b = schema_hash(&[
            ("amount".to_string(), ColumnType::Numeric),
            ("userid".to_string(), ColumnType::Id),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_schema_hash_distinguishes_types() {
        let a = schema_hash(&[("v".to_string(), ColumnType::Numeric)]);
        let b = schema_hash(&[("v".to_string(), ColumnType::Text)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_query_fingerprint_prefix() {
        let profile = DataProfile {
            source_path: "query".into(),
            row_count: 10,
            column_count: 0,
            profile_time: std::time::Duration::from_millis(1),
            columns: vec![],
            alerts: vec![],
            correlations: vec![],
            insights: vec![],
        };
        let fingerprint = query_fingerprint(&profile);
        assert!(fingerprint.starts_with("db:"));
        assert_eq!(fingerprint.len(), 3 + 16);
    }
}
