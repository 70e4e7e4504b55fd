//! Storage operator construction and object access
//!
//! One `ArtifactStore` wraps an OpenDAL operator rooted at a bucket (or a
//! local directory) together with the key prefix every relative path is
//! resolved under. The pipeline builds one for the result location and one
//! for the raw logs location and passes them by reference.

use std::time::Duration;

use bytes::Bytes;
use opendal::{ErrorKind, Operator};
use s3logs2parquet_config::{ObjectLocation, StorageBackend, StorageConfig};
use tracing::debug;

use crate::{Result, WriterError};

/// Where the store's root lives, for rendering URIs in logs and manifests.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Root {
    S3 { bucket: String },
    Local { path: String },
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    operator: Operator,
    root: Root,
    /// Key prefix, empty or ending in `/`
    prefix: String,
}

impl ArtifactStore {
    /// Build the store for the result location.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Fs => {
                let fs = config.fs.as_ref().ok_or_else(|| {
                    WriterError::storage_init("fs", "fs config required for filesystem backend")
                })?;
                Self::local(&fs.path)
            }
            StorageBackend::S3 => {
                let s3 = config.s3.as_ref().ok_or_else(|| {
                    WriterError::storage_init("s3", "s3 config required for S3 backend")
                })?;

                let mut builder = opendal::services::S3::default()
                    .bucket(&s3.bucket)
                    .region(&s3.region);
                if let Some(endpoint) = &s3.endpoint {
                    builder = builder.endpoint(endpoint);
                }

                let operator = Operator::new(builder)
                    .map_err(|e| WriterError::storage_init(format!("s3://{}", s3.bucket), e))?
                    .finish();

                debug!(bucket = %s3.bucket, prefix = ?s3.prefix, "S3 result store initialized");
                Ok(Self {
                    operator,
                    root: Root::S3 {
                        bucket: s3.bucket.clone(),
                    },
                    prefix: normalize_prefix(s3.prefix.as_deref()),
                })
            }
        }
    }

    /// Build a store for another location (the raw logs), reusing the
    /// region and endpoint of the result storage configuration.
    pub fn for_location(location: &ObjectLocation, config: &StorageConfig) -> Result<Self> {
        match location {
            ObjectLocation::Local(path) => Self::local(path),
            ObjectLocation::S3 { bucket, prefix } => {
                let s3 = config.s3.clone().unwrap_or_default();
                let mut builder = opendal::services::S3::default()
                    .bucket(bucket)
                    .region(&s3.region);
                if let Some(endpoint) = &s3.endpoint {
                    builder = builder.endpoint(endpoint);
                }

                let operator = Operator::new(builder)
                    .map_err(|e| WriterError::storage_init(location.uri(), e))?
                    .finish();

                Ok(Self {
                    operator,
                    root: Root::S3 {
                        bucket: bucket.clone(),
                    },
                    prefix: normalize_prefix(prefix.as_deref()),
                })
            }
        }
    }

    fn local(path: &str) -> Result<Self> {
        let builder = opendal::services::Fs::default().root(path);
        let operator = Operator::new(builder)
            .map_err(|e| WriterError::storage_init(path, e))?
            .finish();

        debug!(root = %path, "filesystem store initialized");
        Ok(Self {
            operator,
            root: Root::Local {
                path: path.trim_end_matches('/').to_string(),
            },
            prefix: String::new(),
        })
    }

    /// Wrap an existing operator, treating it as the root of `bucket`.
    pub fn from_operator(operator: Operator, bucket: &str, prefix: Option<&str>) -> Self {
        Self {
            operator,
            root: Root::S3 {
                bucket: bucket.to_string(),
            },
            prefix: normalize_prefix(prefix),
        }
    }

    /// Bucket name, for S3-backed stores.
    pub fn bucket(&self) -> Option<&str> {
        match &self.root {
            Root::S3 { bucket } => Some(bucket),
            Root::Local { .. } => None,
        }
    }

    /// Operator path of `relative` under the store prefix.
    pub fn path(&self, relative: &str) -> String {
        format!("{}{}", self.prefix, relative.trim_start_matches('/'))
    }

    /// Full URI of `relative`: `s3://bucket/prefix/relative` or a local path.
    pub fn uri(&self, relative: &str) -> String {
        match &self.root {
            Root::S3 { bucket } => format!("s3://{}/{}", bucket, self.path(relative)),
            Root::Local { path } => format!("{}/{}", path, self.path(relative)),
        }
    }

    /// Map an absolute `s3://bucket/key` URI inside this store's bucket to an
    /// operator path. Keys are bucket-absolute, so the store prefix does not
    /// apply.
    pub fn path_for_uri(&self, uri: &str) -> Option<String> {
        let bucket = self.bucket()?;
        let rest = uri
            .strip_prefix("s3://")
            .or_else(|| uri.strip_prefix("s3a://"))?;
        let key = rest.strip_prefix(bucket)?.strip_prefix('/')?;
        (!key.is_empty()).then(|| key.to_string())
    }

    pub async fn read(&self, relative: &str) -> Result<Bytes> {
        self.read_path(&self.path(relative)).await
    }

    /// Read an object, returning `None` when it does not exist.
    pub async fn read_optional(&self, relative: &str) -> Result<Option<Bytes>> {
        let path = self.path(relative);
        match self.operator.read(&path).await {
            Ok(buffer) => Ok(Some(buffer.to_bytes())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WriterError::read_failure(path, e)),
        }
    }

    /// Read an object addressed by an absolute URI (query engine manifests
    /// list their data files this way).
    pub async fn read_uri(&self, uri: &str) -> Result<Bytes> {
        let path = self.path_for_uri(uri).ok_or_else(|| {
            WriterError::read_failure(uri, "URI is outside the configured result bucket")
        })?;
        self.read_path(&path).await
    }

    async fn read_path(&self, path: &str) -> Result<Bytes> {
        self.operator
            .read(path)
            .await
            .map(|buffer| buffer.to_bytes())
            .map_err(|e| WriterError::read_failure(path, e))
    }

    pub async fn write(&self, relative: &str, data: Vec<u8>) -> Result<()> {
        let path = self.path(relative);
        let size = data.len();
        self.operator
            .write(&path, data)
            .await
            .map_err(|e| WriterError::write_failure(path.clone(), e))?;
        debug!(path = %path, size, "object written");
        Ok(())
    }

    /// Delete every object under the directory `relative` (the whole store
    /// prefix when empty).
    pub async fn remove_all(&self, relative: &str) -> Result<()> {
        let mut path = self.path(relative);
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }
        let target = if path.is_empty() { "/" } else { path.as_str() };
        self.operator
            .remove_all(target)
            .await
            .map_err(|e| WriterError::delete_failure(target, e))
    }

    /// Presigned GET URL for `relative`, or `None` when the backend cannot
    /// presign (filesystem, in-memory).
    pub async fn presign_read(&self, relative: &str, expiry: Duration) -> Result<Option<String>> {
        if !self.operator.info().full_capability().presign_read {
            return Ok(None);
        }

        let path = self.path(relative);
        let request = self
            .operator
            .presign_read(&path, expiry)
            .await
            .map_err(|e| WriterError::read_failure(path, e))?;
        Ok(Some(request.uri().to_string()))
    }
}

fn normalize_prefix(prefix: Option<&str>) -> String {
    match prefix.map(|p| p.trim_matches('/')) {
        Some(p) if !p.is_empty() => format!("{}/", p),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store(prefix: Option<&str>) -> ArtifactStore {
        let operator = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        ArtifactStore::from_operator(operator, "results", prefix)
    }

    #[test]
    fn paths_and_uris_include_prefix() {
        let store = memory_store(Some("/usage/"));
        assert_eq!(store.path("athena/results/combined.parquet"), "usage/athena/results/combined.parquet");
        assert_eq!(
            store.uri("athena/results/combined.parquet"),
            "s3://results/usage/athena/results/combined.parquet"
        );
    }

    #[test]
    fn manifest_uris_map_to_bucket_keys() {
        let store = memory_store(Some("usage/"));
        assert_eq!(
            store.path_for_uri("s3://results/usage/athena/results/meta/dataset/x/part-0.parquet"),
            Some("usage/athena/results/meta/dataset/x/part-0.parquet".to_string())
        );
        assert_eq!(store.path_for_uri("s3://other/key"), None);
        assert_eq!(store.path_for_uri("s3://resultsx/key"), None);
        assert_eq!(store.path_for_uri("s3://results/"), None);
    }

    #[tokio::test]
    async fn missing_object_reads_as_none() {
        let store = memory_store(None);
        assert!(store.read_optional("nope.parquet").await.unwrap().is_none());

        store.write("yes.parquet", b"PAR1".to_vec()).await.unwrap();
        let bytes = store.read_optional("yes.parquet").await.unwrap().unwrap();
        assert_eq!(&bytes[..], b"PAR1");
    }

    #[tokio::test]
    async fn remove_all_deletes_only_the_directory() {
        let store = memory_store(Some("p"));
        store.write("a/meta/1.csv", vec![1]).await.unwrap();
        store.write("a/meta/dataset/2.parquet", vec![2]).await.unwrap();
        store.write("a/combined.parquet", vec![3]).await.unwrap();

        store.remove_all("a/meta").await.unwrap();

        assert!(store.read_optional("a/meta/1.csv").await.unwrap().is_none());
        assert!(store.read_optional("a/meta/dataset/2.parquet").await.unwrap().is_none());
        assert!(store.read_optional("a/combined.parquet").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn memory_backend_cannot_presign() {
        let store = memory_store(None);
        store.write("x.csv.gz", vec![0]).await.unwrap();
        let link = store
            .presign_read("x.csv.gz", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(link.is_none());
    }

    #[tokio::test]
    async fn fs_store_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        let config = StorageConfig {
            backend: StorageBackend::Fs,
            fs: Some(s3logs2parquet_config::FsConfig { path: root.clone() }),
            s3: None,
        };
        let store = ArtifactStore::from_config(&config).unwrap();
        assert!(store.bucket().is_none());

        store.write("athena/results/x.json", b"{}".to_vec()).await.unwrap();
        assert!(dir.path().join("athena/results/x.json").exists());
        assert_eq!(store.uri("athena/results/x.json"), format!("{}/athena/results/x.json", root));
    }
}
