//! Destination path rules
//!
//! The effective write root for a transfer cycle is derived here: optional
//! date partitioning, then the staging subdirectory, joined with a separator
//! appropriate to the backend family. Pure functions only.

use chrono::{Datelike, Utc};

use crate::storage_types::StorageKind;

/// Compute the fully qualified write root for the current cycle.
///
/// Rule order: (1) if `date_partition`, append `YYYY/MM/DD` computed from the
/// current UTC date at the moment of the call; (2) append `staging_dir`,
/// unless the write backend is the key-list family, which has no directory
/// concept. Local folders join with the platform separator, everything else
/// with `/`.
///
/// Callers must invoke this once per cycle rather than caching the result;
/// a cycle spanning a UTC day boundary would otherwise write into
/// yesterday's partition.
pub fn destination_root(
    base: &str,
    kind: StorageKind,
    date_partition: bool,
    staging_dir: &str,
) -> String {
    let sep = match kind {
        StorageKind::Folder => std::path::MAIN_SEPARATOR.to_string(),
        _ => "/".to_string(),
    };

    let mut root = base.trim_end_matches(&sep[..]).to_string();

    if date_partition {
        let today = Utc::now();
        for segment in [
            format!("{:04}", today.year()),
            format!("{:02}", today.month()),
            format!("{:02}", today.day()),
        ] {
            root.push_str(&sep);
            root.push_str(&segment);
        }
    }

    if kind != StorageKind::Redis {
        root.push_str(&sep);
        root.push_str(staging_dir);
    }

    root
}

/// Remove `suffix` from the end of `path`, if it is a true suffix.
///
/// Used by flat backends to drop a trailing staging segment from their
/// configured prefix: chopping `/tmp` from `a/b/tmp` yields `a/b`, while
/// chopping `/x` from `a/b/tmp` returns the path unchanged.
pub fn chop_suffix<'a>(path: &'a str, suffix: &str) -> &'a str {
    path.strip_suffix(suffix).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_date_segment() -> String {
        let today = Utc::now();
        format!("{:04}/{:02}/{:02}", today.year(), today.month(), today.day())
    }

    #[test]
    fn date_partition_then_staging() {
        let root = destination_root("/out/", StorageKind::Sftp, true, "tmp");
        assert_eq!(root, format!("/out/{}/tmp", utc_date_segment()));
    }

    #[test]
    fn staging_only_when_partitioning_disabled() {
        let root = destination_root("/out", StorageKind::Ftp, false, "tmp");
        assert_eq!(root, "/out/tmp");
    }

    #[test]
    fn key_list_backend_never_gets_staging() {
        let root = destination_root("ingest", StorageKind::Redis, false, "tmp");
        assert_eq!(root, "ingest");

        let partitioned = destination_root("ingest", StorageKind::Redis, true, "tmp");
        assert_eq!(partitioned, format!("ingest/{}", utc_date_segment()));
    }

    #[test]
    fn bucket_prefix_gets_staging_for_later_chop() {
        // Flat object storage still receives the staged path from the
        // builder; the backend strips it at construction time.
        let root = destination_root("landing", StorageKind::S3, false, "tmp");
        assert_eq!(root, "landing/tmp");
        assert_eq!(chop_suffix(&root, "/tmp"), "landing");
    }

    #[test]
    fn chop_suffix_only_removes_true_suffixes() {
        assert_eq!(chop_suffix("a/b/tmp", "/tmp"), "a/b");
        assert_eq!(chop_suffix("a/b/tmp", "/x"), "a/b/tmp");
        assert_eq!(chop_suffix("a/b", ""), "a/b");
    }
}
