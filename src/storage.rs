use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

// Presigned links are short-lived; clients re-request on expiry.
const PRESIGN_TTL_SECS: u64 = 10 * 60;

/// Where profile pictures live. Keys are `profile/{user_id}/{uuid}.{ext}`,
/// so a replacement never collides with the object it supersedes.
#[async_trait]
pub trait PictureStore: Send + Sync {
    /// Upload a picture and return its freshly minted key.
    async fn store(&self, user_id: i64, body: Bytes, content_type: &str)
        -> anyhow::Result<String>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
    /// Short-lived GET URL for an existing key.
    async fn presign(&self, key: &str) -> anyhow::Result<String>;
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

pub(crate) fn picture_key(user_id: i64, content_type: &str) -> anyhow::Result<String> {
    let ext = ext_from_mime(content_type)
        .ok_or_else(|| anyhow::anyhow!("unsupported image type {content_type}"))?;
    Ok(format!("profile/{}/{}.{}", user_id, Uuid::new_v4(), ext))
}

/// S3/MinIO-backed picture store.
pub struct S3PictureStore {
    client: Client,
    bucket: String,
}

impl S3PictureStore {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .endpoint_url(endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl PictureStore for S3PictureStore {
    async fn store(
        &self,
        user_id: i64,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String> {
        let key = picture_key(user_id, content_type)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put {}", key))?;
        Ok(key)
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 delete {}", key))?;
        Ok(())
    }

    async fn presign(&self, key: &str) -> anyhow::Result<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(PRESIGN_TTL_SECS),
            )?)
            .await
            .with_context(|| format!("s3 presign {}", key))?;
        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("image/gif"), None);
    }

    #[test]
    fn picture_key_scopes_by_user_and_extension() {
        let key = picture_key(7, "image/png").unwrap();
        assert!(key.starts_with("profile/7/"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn picture_key_rejects_unsupported_type() {
        let err = picture_key(7, "text/html").unwrap_err();
        assert!(err.to_string().contains("unsupported image type"));
    }
}
