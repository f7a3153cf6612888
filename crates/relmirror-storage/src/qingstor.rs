//! QingStor object storage client with v1 request signing.
//!
//! # Design
//! - Path-style object URLs: `{scheme}://{zone}.{host}/{bucket}/{key}` on the
//!   public service, `{endpoint}/{bucket}/{key}` on a fixed endpoint.
//! - When the zone is not configured it is detected once: the zone-less bucket
//!   URL answers `301` with a `Location` of `{bucket}.{zone}.{host}`.
//! - Signature: `QS {access_key}:{base64(hmac_sha256(secret, string_to_sign))}`
//!   over `VERB\nContent-MD5\nContent-Type\nDate\n{resource}`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE, HeaderValue, LOCATION};
use reqwest::{Body, Client, Method, StatusCode, redirect};
use sha2::Sha256;
use tokio::fs::File;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectStat, ObjectStore, StorageMetadata};

type HmacSha256 = Hmac<Sha256>;

/// Public QingStor service host.
pub const DEFAULT_HOST: &str = "qingstor.com";

const USER_AGENT: &str = concat!("relmirror/", env!("CARGO_PKG_VERSION"));
const OCTET_STREAM: &str = "application/octet-stream";

/// Where requests for the bucket are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QingStorEndpoint {
    /// Public service: the zone is part of the host name.
    Zoned {
        /// URL scheme, normally `https`.
        scheme: String,
        /// Service host, normally [`DEFAULT_HOST`].
        host: String,
    },
    /// Private deployment reachable at a fixed root URL.
    Fixed(Url),
}

impl QingStorEndpoint {
    /// The public `https://qingstor.com` service.
    #[must_use]
    pub fn public() -> Self {
        Self::Zoned {
            scheme: "https".to_string(),
            host: DEFAULT_HOST.to_string(),
        }
    }

    /// Choose the endpoint style for a configured service URL.
    ///
    /// A bare URL on [`DEFAULT_HOST`] selects zoned hosts; anything else is
    /// treated as a fixed private endpoint.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        match url.host_str() {
            Some(host) if host == DEFAULT_HOST && url.port().is_none() && url.path() == "/" => {
                Self::Zoned {
                    scheme: url.scheme().to_string(),
                    host: host.to_string(),
                }
            }
            _ => Self::Fixed(url.clone()),
        }
    }
}

/// Settings for [`QingStorClient`].
#[derive(Clone)]
pub struct QingStorOptions {
    /// Access key identifier.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Bucket receiving the mirrored assets.
    pub bucket: String,
    /// Bucket zone; detected when `None`.
    pub zone: Option<String>,
    /// Request endpoint.
    pub endpoint: QingStorEndpoint,
    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl fmt::Debug for QingStorOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("QingStorOptions")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("zone", &self.zone)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Signed QingStor client for one bucket.
#[derive(Debug)]
pub struct QingStorClient {
    http: Client,
    no_redirect: Client,
    options: QingStorOptions,
    detected_zone: OnceCell<Option<String>>,
}

impl QingStorClient {
    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn new(options: QingStorOptions) -> StorageResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()
            .map_err(|source| StorageError::ClientBuild { source })?;
        let no_redirect = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|source| StorageError::ClientBuild { source })?;
        Ok(Self {
            http,
            no_redirect,
            options,
            detected_zone: OnceCell::new(),
        })
    }

    async fn zone(&self) -> StorageResult<Option<String>> {
        if let Some(zone) = self.options.zone.as_ref().filter(|zone| !zone.is_empty()) {
            return Ok(Some(zone.clone()));
        }
        self.detected_zone
            .get_or_try_init(|| self.detect_zone())
            .await
            .cloned()
    }

    async fn detect_zone(&self) -> StorageResult<Option<String>> {
        let bucket = &self.options.bucket;
        let url = match &self.options.endpoint {
            QingStorEndpoint::Zoned { scheme, host } => {
                parse_url(&format!("{scheme}://{bucket}.{host}/"))?
            }
            QingStorEndpoint::Fixed(base) => {
                let mut url = base.clone();
                push_segments(&mut url, [bucket.as_str()])?;
                url
            }
        };
        let response = self
            .no_redirect
            .head(url.clone())
            .send()
            .await
            .map_err(|source| StorageError::request("detect_zone", bucket, source))?;
        let status = response.status();
        if !status.is_redirection() {
            debug!(bucket = %bucket, status = status.as_u16(), "zone detection did not redirect");
            return Ok(None);
        }
        let zone = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| zone_from_location(bucket, location));
        debug!(bucket = %bucket, zone = ?zone, "zone detection finished");
        Ok(zone)
    }

    async fn object_url(&self, path: &str) -> StorageResult<Url> {
        let mut url = match &self.options.endpoint {
            QingStorEndpoint::Zoned { scheme, host } => {
                let zone = self.zone().await?.ok_or_else(|| StorageError::UnknownLocation {
                    bucket: self.options.bucket.clone(),
                })?;
                parse_url(&format!("{scheme}://{zone}.{host}/"))?
            }
            QingStorEndpoint::Fixed(base) => base.clone(),
        };
        push_segments(
            &mut url,
            std::iter::once(self.options.bucket.as_str()).chain(path.split('/')),
        )?;
        Ok(url)
    }

    fn authorization(
        &self,
        method: &Method,
        content_type: &str,
        date: &str,
        resource: &str,
    ) -> StorageResult<HeaderValue> {
        let string_to_sign = format!("{method}\n\n{content_type}\n{date}\n{resource}");
        let signature = signature(&self.options.secret_key, &string_to_sign)?;
        let credential = format!("QS {}:{signature}", self.options.access_key);
        let mut value =
            HeaderValue::from_str(&credential).map_err(|_| StorageError::Signing {
                reason: "invalid_access_key",
            })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[async_trait]
impl ObjectStore for QingStorClient {
    async fn metadata(&self) -> StorageResult<StorageMetadata> {
        Ok(StorageMetadata {
            name: self.options.bucket.clone(),
            location: self.zone().await?,
        })
    }

    async fn stat(&self, path: &str) -> StorageResult<ObjectStat> {
        const OPERATION: &str = "stat";
        let url = self.object_url(path).await?;
        let date = http_date();
        let authorization = self.authorization(&Method::HEAD, "", &date, url.path())?;
        let response = self
            .http
            .head(url)
            .header(DATE, &date)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|source| StorageError::request(OPERATION, path, source))?;

        let status = response.status();
        if status.is_success() {
            let size = response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok());
            return Ok(ObjectStat { size });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                path: path.to_string(),
            });
        }
        Err(StorageError::Status {
            operation: OPERATION,
            path: path.to_string(),
            status: status.as_u16(),
        })
    }

    async fn write(&self, path: &str, body: File, size: u64) -> StorageResult<()> {
        const OPERATION: &str = "write";
        let url = self.object_url(path).await?;
        let date = http_date();
        let authorization = self.authorization(&Method::PUT, OCTET_STREAM, &date, url.path())?;
        let response = self
            .http
            .put(url)
            .header(DATE, &date)
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(CONTENT_LENGTH, size)
            .header(AUTHORIZATION, authorization)
            .body(Body::from(body))
            .send()
            .await
            .map_err(|source| StorageError::request(OPERATION, path, source))?;

        let status = response.status();
        if status.is_success() {
            debug!(path, size, "object uploaded");
            Ok(())
        } else {
            Err(StorageError::Status {
                operation: OPERATION,
                path: path.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

fn parse_url(input: &str) -> StorageResult<Url> {
    Url::parse(input).map_err(|source| StorageError::InvalidUrl {
        url: input.to_string(),
        source,
    })
}

fn push_segments<'a>(
    url: &mut Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> StorageResult<()> {
    let text = url.to_string();
    url.path_segments_mut()
        .map_err(|()| StorageError::UrlNotBase { url: text })?
        .pop_if_empty()
        .extend(segments);
    Ok(())
}

fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn signature(secret: &str, string_to_sign: &str) -> StorageResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
        StorageError::Signing {
            reason: "invalid_key_length",
        }
    })?;
    mac.update(string_to_sign.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Extract the zone from a redirect `Location` such as
/// `https://{bucket}.{zone}.qingstor.com/`.
fn zone_from_location(bucket: &str, location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    let host = url.host_str()?;
    let rest = host
        .strip_prefix(bucket)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(host);
    let mut labels = rest.split('.');
    let zone = labels.next().filter(|zone| !zone.is_empty())?;
    labels.next()?;
    Some(zone.to_string())
}
