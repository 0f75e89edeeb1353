use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend kinds
///
/// This enum defines the available storage backend kinds. It's defined in
/// core because it's used in configuration and by the path rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Folder,
    Ftp,
    Sftp,
    S3,
    Redis,
}

impl StorageKind {
    /// Whether this backend family models hierarchical directories.
    ///
    /// Hierarchical backends write into a staging subdirectory and expose a
    /// promote step; flat backends write directly to the final key.
    pub fn is_hierarchical(self) -> bool {
        matches!(self, StorageKind::Folder | StorageKind::Ftp | StorageKind::Sftp)
    }
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept plain kind names as well as the dotted class-path style
        // identifiers of earlier deployments (e.g. "pkg.storage.FolderStorage");
        // only the trailing segment is significant.
        let tail = s.rsplit('.').next().unwrap_or(s).to_lowercase();
        let tail = tail.strip_suffix("storage").unwrap_or(&tail);
        match tail {
            "folder" | "local" => Ok(StorageKind::Folder),
            "ftp" => Ok(StorageKind::Ftp),
            "sftp" => Ok(StorageKind::Sftp),
            "s3" => Ok(StorageKind::S3),
            "redis" => Ok(StorageKind::Redis),
            _ => Err(anyhow::anyhow!("Invalid storage kind: {}", s)),
        }
    }
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageKind::Folder => write!(f, "folder"),
            StorageKind::Ftp => write!(f, "ftp"),
            StorageKind::Sftp => write!(f, "sftp"),
            StorageKind::S3 => write!(f, "s3"),
            StorageKind::Redis => write!(f, "redis"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_kind_names() {
        assert_eq!("folder".parse::<StorageKind>().unwrap(), StorageKind::Folder);
        assert_eq!("SFTP".parse::<StorageKind>().unwrap(), StorageKind::Sftp);
        assert_eq!("s3".parse::<StorageKind>().unwrap(), StorageKind::S3);
    }

    #[test]
    fn parses_dotted_class_path_identifiers() {
        assert_eq!(
            "legacy.storage.FolderStorage".parse::<StorageKind>().unwrap(),
            StorageKind::Folder
        );
        assert_eq!(
            "legacy.storage.S3Storage".parse::<StorageKind>().unwrap(),
            StorageKind::S3
        );
        assert_eq!(
            "legacy.storage.RedisStorage".parse::<StorageKind>().unwrap(),
            StorageKind::Redis
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!("carrier-pigeon".parse::<StorageKind>().is_err());
    }

    #[test]
    fn hierarchy_split() {
        assert!(StorageKind::Folder.is_hierarchical());
        assert!(StorageKind::Ftp.is_hierarchical());
        assert!(StorageKind::Sftp.is_hierarchical());
        assert!(!StorageKind::S3.is_hierarchical());
        assert!(!StorageKind::Redis.is_hierarchical());
    }
}
