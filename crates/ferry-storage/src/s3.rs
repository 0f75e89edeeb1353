use async_trait::async_trait;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, ServerSideEncryption,
};
use aws_sdk_s3::Client;
use ferry_core::{chop_suffix, S3Settings, StorageKind};

use crate::traits::{validate_name, Storage, StorageError, StorageResult};

/// S3 object-bucket storage backend.
///
/// Buckets have no staging step: a single put either succeeds wholly or
/// fails, so the staging suffix the path builder appended is stripped from
/// the prefix at construction time and writes go directly to the final key.
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
    server_side_encryption: bool,
}

/// Strip a trailing staging segment and surrounding slashes from the
/// configured root, yielding the object key prefix.
fn normalize_prefix(root: &str, staging_dir: &str) -> String {
    let staged_suffix = format!("/{}", staging_dir);
    let chopped = chop_suffix(root, &staged_suffix);
    let chopped = if chopped == staging_dir { "" } else { chopped };
    chopped.trim_matches('/').to_string()
}

fn object_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

impl S3Storage {
    /// Build a client, resolve credentials, and create the bucket if it
    /// does not exist yet.
    pub async fn connect(
        settings: &S3Settings,
        root: &str,
        staging_dir: &str,
    ) -> StorageResult<Self> {
        if settings.bucket.is_empty() {
            return Err(StorageError::Config(
                "S3 bucket name not configured".to_string(),
            ));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if !settings.use_ambient_creds {
            match (&settings.access_key_id, &settings.secret_access_key) {
                (Some(key), Some(secret)) => {
                    loader = loader.credentials_provider(Credentials::new(
                        key.clone(),
                        secret.clone(),
                        None,
                        None,
                        "ferry-config",
                    ));
                }
                _ => {
                    return Err(StorageError::Config(
                        "S3 access credentials not configured and ambient credentials disabled"
                            .to_string(),
                    ));
                }
            }
        }

        let shared = loader.load().await;
        let mut builder = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        if client
            .head_bucket()
            .bucket(&settings.bucket)
            .send()
            .await
            .is_err()
        {
            let mut create = client.create_bucket().bucket(&settings.bucket);
            if settings.region != "us-east-1" {
                create = create.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(
                            settings.region.as_str(),
                        ))
                        .build(),
                );
            }
            create
                .send()
                .await
                .map_err(|e| {
                    StorageError::Config(format!(
                        "failed to create bucket {}: {}",
                        settings.bucket,
                        e.into_service_error()
                    ))
                })?;
            tracing::info!(bucket = %settings.bucket, "Created bucket");
        }

        Ok(S3Storage {
            client,
            bucket: settings.bucket.clone(),
            prefix: normalize_prefix(root, staging_dir),
            server_side_encryption: settings.server_side_encryption,
        })
    }

    fn key_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn list(&self) -> StorageResult<Vec<String>> {
        let key_prefix = self.key_prefix();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&key_prefix)
            .into_paginator()
            .send();

        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                tracing::error!(
                    backend = "s3",
                    bucket = %self.bucket,
                    prefix = %key_prefix,
                    error = %e,
                    "Failed to list bucket"
                );
                StorageError::List(format!("{}/{}: {}", self.bucket, key_prefix, e))
            })?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let Some(name) = key.strip_prefix(&key_prefix) else {
                    continue;
                };
                // Keys with a further separator are simulated subdirectories.
                if !name.is_empty() && !name.contains('/') {
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }

    async fn read(&self, name: &str) -> StorageResult<Vec<u8>> {
        validate_name(name)?;
        let key = object_key(&self.prefix, name);

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    return Err(StorageError::NotFound(name.to_string()));
                }
                tracing::error!(
                    backend = "s3",
                    bucket = %self.bucket,
                    key = %key,
                    error = %service,
                    "Failed to read object"
                );
                return Err(StorageError::Read(format!(
                    "{}/{}: {}",
                    self.bucket, key, service
                )));
            }
        };

        let data = output.body.collect().await.map_err(|e| {
            StorageError::Read(format!("{}/{}: {}", self.bucket, key, e))
        })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write(&self, name: &str, content: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        let key = object_key(&self.prefix, name);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(content.to_vec()));

        if self.server_side_encryption {
            request = request.server_side_encryption(ServerSideEncryption::Aes256);
        }

        request.send().await.map_err(|e| {
            let service = e.into_service_error();
            tracing::error!(
                backend = "s3",
                bucket = %self.bucket,
                key = %key,
                error = %service,
                "Failed to write object"
            );
            StorageError::Write(format!("{}/{}: {}", self.bucket, key, service))
        })?;

        tracing::debug!(
            backend = "s3",
            bucket = %self.bucket,
            key = %key,
            size_bytes = content.len(),
            "Wrote object"
        );

        Ok(())
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let key = object_key(&self.prefix, name);

        // DeleteObject succeeds for absent keys, which covers the idempotent
        // delete contract without an existence probe.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                tracing::error!(
                    backend = "s3",
                    bucket = %self.bucket,
                    key = %key,
                    error = %service,
                    "Failed to delete object"
                );
                StorageError::Delete(format!("{}/{}: {}", self.bucket, key, service))
            })?;

        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_suffix_is_stripped_from_prefix() {
        assert_eq!(normalize_prefix("landing/tmp", "tmp"), "landing");
        assert_eq!(normalize_prefix("landing/2026/01/31/tmp", "tmp"), "landing/2026/01/31");
    }

    #[test]
    fn non_suffix_staging_segment_is_kept() {
        assert_eq!(normalize_prefix("landing/out", "tmp"), "landing/out");
    }

    #[test]
    fn bare_staging_root_becomes_empty_prefix() {
        assert_eq!(normalize_prefix("tmp", "tmp"), "");
        assert_eq!(normalize_prefix("/tmp", "tmp"), "");
    }

    #[test]
    fn keys_join_prefix_and_name() {
        assert_eq!(object_key("landing", "a.csv"), "landing/a.csv");
        assert_eq!(object_key("", "a.csv"), "a.csv");
    }
}
