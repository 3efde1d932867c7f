//! The Artifact Store Gateway (C7) — an S3-backed `ArtifactStore`.
//!
//! Grounded on `creativebastard-rcommerce`'s `aws-sdk-s3`/`aws-config`
//! dependency pair, the only repo in the pack that carries an
//! object-store SDK (`rcommerce-core::media::file_upload::S3Config`).
//! That reference only sketches configuration; the `put_object` call
//! itself follows the standard `aws-sdk-s3` builder API.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use docugen_core::ArtifactStore;

/// Uploads artifacts to S3 (or an S3-compatible service) under a
/// configured bucket, with public-read visibility and a cache directive,
/// per spec.md §4.5/§4.7.
pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
    base_url: Option<String>,
}

impl S3ArtifactStore {
    pub async fn from_env(bucket: String, base_url: Option<String>) -> Self {
        let config = aws_config::load_from_env().await;
        let client = Client::new(&config);
        Self {
            client,
            bucket,
            base_url,
        }
    }

    fn url_for(&self, key: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    fn configured(&self) -> bool {
        !self.bucket.is_empty()
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, docugen_core::Error> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .cache_control("max-age=3600")
            .acl(aws_sdk_s3::types::ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| docugen_core::Error::Internal(format!("s3 put failed: {e}")))?;

        Ok(self.url_for(key))
    }
}
