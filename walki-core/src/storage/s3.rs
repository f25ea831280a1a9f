//! Presigned downloads from S3-compatible object storage.
//!
//! Only the query-string flavour of AWS Signature V4 is implemented, which is
//! all the bot needs: the platform fetches the object itself from the URL.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use walki_common::traits::storage_traits::BlobStore;
use crate::Error;

type HmacSha256 = Hmac<Sha256>;

/// Longest validity AWS accepts for a presigned URL.
pub const MAX_PRESIGN_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone)]
pub struct S3Config {
    /// e.g. "https://storage.yandexcloud.net"
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// `bucket.host/key` instead of `host/bucket/key`.
    pub virtual_hosted: bool,
}

pub struct S3BlobStore {
    endpoint: Url,
    config: S3Config,
}

impl S3BlobStore {
    pub fn new(config: S3Config) -> Result<Self, Error> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| Error::Config(format!("invalid S3 endpoint '{}': {}", config.endpoint, e)))?;
        if endpoint.host_str().is_none() {
            return Err(Error::Config(format!("S3 endpoint '{}' has no host", config.endpoint)));
        }
        if config.bucket.is_empty() {
            return Err(Error::Config("S3 bucket is empty".into()));
        }
        Ok(Self { endpoint, config })
    }

    /// Signs a GET for `key` as of `now`. Split out from the trait method so the
    /// signature is reproducible.
    pub fn presign_get_at(&self, key: &str, ttl: Duration, now: DateTime<Utc>) -> Result<String, Error> {
        let expires = ttl.as_secs();
        if expires == 0 || expires > MAX_PRESIGN_TTL_SECS {
            return Err(Error::Storage(format!(
                "presign ttl must be within 1..={} seconds, got {}",
                MAX_PRESIGN_TTL_SECS, expires
            )));
        }

        let host = self.host()?;
        let canonical_uri = self.canonical_uri(key);

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", date, self.config.region);
        let credential = format!("{}/{}", self.config.access_key, scope);

        // Already in canonical (byte-wise sorted) order.
        let params = [
            ("X-Amz-Algorithm", "AWS4-HMAC-SHA256".to_string()),
            ("X-Amz-Credential", credential),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", expires.to_string()),
            ("X-Amz-SignedHeaders", "host".to_string()),
        ];
        let canonical_query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            canonical_uri, canonical_query, host
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let k_date = hmac(format!("AWS4{}", self.config.secret_key).as_bytes(), date.as_bytes())?;
        let k_region = hmac(&k_date, self.config.region.as_bytes())?;
        let k_service = hmac(&k_region, b"s3")?;
        let k_signing = hmac(&k_service, b"aws4_request")?;
        let signature = hex::encode(hmac(&k_signing, string_to_sign.as_bytes())?);

        Ok(format!(
            "{}://{}{}?{}&X-Amz-Signature={}",
            self.endpoint.scheme(),
            host,
            canonical_uri,
            canonical_query,
            signature
        ))
    }

    fn host(&self) -> Result<String, Error> {
        let base = self
            .endpoint
            .host_str()
            .ok_or_else(|| Error::Config("S3 endpoint has no host".into()))?;
        let mut host = if self.config.virtual_hosted {
            format!("{}.{}", self.config.bucket, base)
        } else {
            base.to_string()
        };
        if let Some(port) = self.endpoint.port() {
            host.push_str(&format!(":{}", port));
        }
        Ok(host)
    }

    fn canonical_uri(&self, key: &str) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        let encoded_key = key
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if self.config.virtual_hosted {
            format!("{}/{}", base, encoded_key)
        } else {
            format!("{}/{}/{}", base, urlencoding::encode(&self.config.bucket), encoded_key)
        }
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Storage(format!("hmac key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn presign_download(&self, storage_key: &str, ttl: Duration) -> Result<String, Error> {
        self.presign_get_at(storage_key, ttl, Utc::now())
    }
}
