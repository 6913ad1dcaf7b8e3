use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::info;

use super::FileStore;

/// Mirrors output files to an S3 bucket, optionally gzip-compressed.
pub struct S3FileStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    gzip: bool,
}

impl S3FileStore {
    /// Creates a store using the ambient AWS configuration.
    pub async fn from_env(bucket: &str, prefix: &str, gzip: bool) -> Self {
        let config = aws_config::load_from_env().await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            gzip,
        }
    }

    fn object_key(&self, name: &str) -> String {
        object_key(&self.prefix, name, self.gzip)
    }
}

/// `Content-Encoding` header for uploaded objects.
fn content_encoding(gzip: bool) -> Option<String> {
    gzip.then(|| "gzip".to_string())
}

fn object_key(prefix: &str, name: &str, gzip: bool) -> String {
    let prefix = prefix.trim_matches('/');
    let name = if gzip {
        format!("{name}.gz")
    } else {
        name.to_string()
    };
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

pub fn gzip_bytes(body: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    Ok(encoder.finish()?)
}

#[async_trait]
impl FileStore for S3FileStore {
    /// Returns the `s3://` URI written.
    async fn put(&self, name: &str, body: &[u8]) -> Result<String> {
        let key = self.object_key(name);
        let body = if self.gzip {
            gzip_bytes(body)?
        } else {
            body.to_vec()
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("text/csv")
            .set_content_encoding(content_encoding(self.gzip))
            .send()
            .await
            .with_context(|| format!("S3 PutObject failed for s3://{}/{}", self.bucket, key))?;

        let uri = format!("s3://{}/{}", self.bucket, key);
        info!(uri = %uri, "Uploaded to S3");
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("", "a.csv", false), "a.csv");
        assert_eq!(object_key("/daily/", "a.csv", false), "daily/a.csv");
        assert_eq!(object_key("daily", "a.csv", true), "daily/a.csv.gz");
    }

    #[test]
    fn test_gzip_objects_declare_encoding() {
        assert_eq!(content_encoding(true).as_deref(), Some("gzip"));
        assert_eq!(content_encoding(false), None);
    }

    #[test]
    fn test_gzip_round_trip() {
        let packed = gzip_bytes(b"tanggal,tarif\n").unwrap();
        let mut out = String::new();
        GzDecoder::new(&packed[..]).read_to_string(&mut out).unwrap();
        assert_eq!(out, "tanggal,tarif\n");
    }
}
