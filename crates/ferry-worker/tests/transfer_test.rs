use chrono::{Datelike, Utc};
use ferry_core::{
    Config, EndpointConfig, FtpSettings, QueueSettings, RedisSettings, S3Settings, StorageKind,
    TransferSettings,
};
use ferry_storage::{LocalStorage, Storage};
use ferry_worker::Orchestrator;
use tempfile::tempdir;

fn folder_endpoint(path: &std::path::Path) -> EndpointConfig {
    EndpointConfig {
        kind: StorageKind::Folder,
        path: path.to_str().unwrap().to_string(),
        ftp: FtpSettings {
            host: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            port: 22,
        },
        s3: S3Settings {
            bucket: String::new(),
            region: "eu-west-2".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            use_ambient_creds: false,
            server_side_encryption: false,
        },
        redis: RedisSettings {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
        },
    }
}

fn folder_config(source: &std::path::Path, dest: &std::path::Path) -> Config {
    Config {
        source: folder_endpoint(source),
        dest: folder_endpoint(dest),
        transfer: TransferSettings {
            batch_size: 5,
            poll_interval_secs: 1,
            date_partition: false,
            staging_dir: "tmp".to_string(),
            copy_source: false,
            publish_mode: false,
            consume_mode: false,
        },
        queue: QueueSettings {
            host: "localhost".to_string(),
            port: 5672,
            username: None,
            password: None,
            queue_name: "ingest".to_string(),
            max_publish_retries: 3,
            republish_queue: None,
        },
    }
}

async fn seed(dir: &std::path::Path, names: &[&str]) {
    let storage = LocalStorage::new(dir);
    for name in names {
        storage.write(name, b"THIS SHOULD STILL BE HERE").await.unwrap();
    }
}

async fn listed(dir: &std::path::Path) -> Vec<String> {
    let mut names = LocalStorage::new(dir).list().await.unwrap();
    names.sort();
    names
}

#[tokio::test]
async fn test_move_files_between_folders() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    seed(source.path(), &["test_csv.csv", "test_json.json", "test_xml.xml"]).await;

    let config = folder_config(source.path(), dest.path());
    Orchestrator::new(&config).run().await.unwrap();

    assert!(listed(source.path()).await.is_empty());
    assert_eq!(
        listed(dest.path()).await,
        vec!["test_csv.csv", "test_json.json", "test_xml.xml"]
    );

    // Nothing left behind in the staging area.
    assert!(listed(&dest.path().join("tmp")).await.is_empty());
}

#[tokio::test]
async fn test_date_partitioned_destination() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    seed(source.path(), &["dated.csv"]).await;

    let mut config = folder_config(source.path(), dest.path());
    config.transfer.date_partition = true;
    Orchestrator::new(&config).run().await.unwrap();

    let today = Utc::now();
    let partition = dest
        .path()
        .join(format!("{:04}", today.year()))
        .join(format!("{:02}", today.month()))
        .join(format!("{:02}", today.day()));

    assert_eq!(listed(&partition).await, vec!["dated.csv"]);
}

#[tokio::test]
async fn test_repeated_cycles_drain_the_source() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    seed(source.path(), &["a.csv", "b.csv", "c.csv", "d.csv", "e.csv"]).await;

    let mut config = folder_config(source.path(), dest.path());
    config.transfer.batch_size = 2;
    let orchestrator = Orchestrator::new(&config);

    orchestrator.run().await.unwrap();
    assert_eq!(listed(source.path()).await.len(), 3);
    assert_eq!(listed(dest.path()).await.len(), 2);

    orchestrator.run().await.unwrap();
    orchestrator.run().await.unwrap();
    assert!(listed(source.path()).await.is_empty());
    assert_eq!(listed(dest.path()).await.len(), 5);
}

#[tokio::test]
async fn test_failed_write_leaves_source_copy_in_place() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    seed(source.path(), &["precious.csv"]).await;

    // A plain file where the destination root should be makes every write
    // fail before any source delete can happen.
    let blocked = dest.path().join("blocked");
    std::fs::write(&blocked, b"in the way").unwrap();

    let config = folder_config(source.path(), &blocked);
    let result = Orchestrator::new(&config).run().await;

    assert!(result.is_err());
    assert_eq!(listed(source.path()).await, vec!["precious.csv"]);
}
