//! Object-storage writer and reader on top of `aws-sdk-s3`.
//!
//! The pipeline is synchronous and runs on a `spawn_blocking` thread, while
//! the SDK is async. Each handle captures the Tokio runtime [`Handle`] at
//! construction and drives requests with `block_on`, which is allowed on
//! blocking-pool threads but would panic on a worker thread. Construct
//! these only from inside `spawn_blocking` or `block_in_place`.
//!
//! Any S3-compatible endpoint works: requests use path-style addressing and
//! the endpoint from the bucket config.

use super::{parse_s3_path, DataReader, DataWriter};
use crate::config::BucketCredentials;
use crate::error::DocParseError;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::runtime::Handle;
use tracing::debug;

/// Region sent to S3-compatible endpoints that do not care about regions.
const DEFAULT_REGION: &str = "us-east-1";

fn build_client(creds: &BucketCredentials) -> Client {
    let credentials = Credentials::new(
        creds.access_key.clone(),
        creds.secret_key.clone(),
        None,
        None,
        "docparse-bucket-config",
    );
    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(DEFAULT_REGION))
        .endpoint_url(creds.endpoint.clone())
        .credentials_provider(credentials)
        .force_path_style(true)
        .build();
    Client::from_conf(config)
}

fn current_handle() -> Result<Handle, DocParseError> {
    Handle::try_current().map_err(|e| {
        DocParseError::Internal(format!("object storage needs a Tokio runtime: {e}"))
    })
}

/// Key prefix from either `s3://bucket/prefix` or a plain `prefix`.
fn key_prefix(prefix: &str) -> String {
    let key = match parse_s3_path(prefix) {
        Ok((_, key)) => key,
        Err(_) => prefix.to_string(),
    };
    key.trim_matches('/').to_string()
}

/// Resolve `path` against the bucket/prefix; full `s3://` URIs win.
fn resolve(bucket: &str, prefix: &str, path: &str) -> Result<(String, String), DocParseError> {
    if path.starts_with(super::S3_SCHEME) {
        return parse_s3_path(path);
    }
    let path = path.trim_start_matches('/');
    let key = match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{path}"),
    };
    Ok((bucket.to_string(), key))
}

/// Writes objects under `s3://<bucket>/<prefix>/`.
pub struct S3DataWriter {
    client: Client,
    bucket: String,
    prefix: String,
    handle: Handle,
}

impl S3DataWriter {
    pub fn new(
        prefix: &str,
        bucket: &str,
        creds: &BucketCredentials,
    ) -> Result<Self, DocParseError> {
        let handle = current_handle()?;
        Ok(Self {
            client: build_client(creds),
            bucket: bucket.to_string(),
            prefix: key_prefix(prefix),
            handle,
        })
    }
}

impl DataWriter for S3DataWriter {
    fn write(&self, path: &str, data: &[u8]) -> Result<(), DocParseError> {
        let (bucket, key) = resolve(&self.bucket, &self.prefix, path)?;
        let body = ByteStream::from(data.to_vec());
        self.handle
            .block_on(
                self.client
                    .put_object()
                    .bucket(&bucket)
                    .key(&key)
                    .body(body)
                    .send(),
            )
            .map_err(|e| DocParseError::Storage {
                path: format!("s3://{bucket}/{key}"),
                detail: format!("{e:?}"),
            })?;
        debug!("Uploaded {} bytes → s3://{}/{}", data.len(), bucket, key);
        Ok(())
    }
}

/// Reads objects from `s3://<bucket>/<prefix>/`.
pub struct S3DataReader {
    client: Client,
    bucket: String,
    prefix: String,
    handle: Handle,
}

impl S3DataReader {
    pub fn new(
        prefix: &str,
        bucket: &str,
        creds: &BucketCredentials,
    ) -> Result<Self, DocParseError> {
        let handle = current_handle()?;
        Ok(Self {
            client: build_client(creds),
            bucket: bucket.to_string(),
            prefix: key_prefix(prefix),
            handle,
        })
    }
}

impl DataReader for S3DataReader {
    fn read(&self, path: &str) -> Result<Vec<u8>, DocParseError> {
        let (bucket, key) = resolve(&self.bucket, &self.prefix, path)?;
        let storage_err = |detail: String| DocParseError::Storage {
            path: format!("s3://{bucket}/{key}"),
            detail,
        };

        let bytes = self.handle.block_on(async {
            let object = self
                .client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| storage_err(format!("{e:?}")))?;
            object
                .body
                .collect()
                .await
                .map(|data| data.into_bytes().to_vec())
                .map_err(|e| storage_err(e.to_string()))
        })?;

        debug!("Downloaded {} bytes from s3://{}/{}", bytes.len(), bucket, key);
        Ok(bytes)
    }
}
