use chrono::{DateTime, Duration, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, SlipError};
use crate::models::FetchedResponse;

pub const DEFAULT_CACHE_DIR: &str = "cache";
pub const CACHE_TTL_HOURS: i64 = 12;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Receives cache write failures, which never abort a fetch.
pub trait WriteFailureSink: Send + Sync {
    fn report(&self, error: &SlipError);
}

pub struct LogWriteFailures;

impl WriteFailureSink for LogWriteFailures {
    fn report(&self, error: &SlipError) {
        warn!(error = %error, "cache write failed, continuing with fresh response");
    }
}

#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub auth: Option<BasicAuth>,
    pub body: Option<Value>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        FetchRequest { method: Method::GET, url: url.into(), auth: None, body: None }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        FetchRequest { method: Method::POST, url: url.into(), auth: None, body: Some(body) }
    }

    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.auth = Some(BasicAuth {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Hex SHA-256 of `[method, url, body]`. Object keys in `Value` are
    /// kept sorted, so equal bodies always encode the same way.
    /// Credentials are not part of the key.
    pub fn cache_key(&self) -> String {
        let identity = json!([self.method.as_str(), self.url, self.body]);
        hex::encode(Sha256::digest(identity.to_string().as_bytes()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    body: Value,
    headers: BTreeMap<String, String>,
    meta: CacheMeta,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    /// Epoch milliseconds.
    stored: i64,
}

/// HTTP client that replays responses from `<cache_dir>/<key>.json`
/// while they are younger than the TTL.
#[derive(Clone)]
pub struct CachedFetchClient {
    http: Client,
    cache_dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn WriteFailureSink>,
}

impl CachedFetchClient {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(CachedFetchClient {
            http: Client::builder().build()?,
            cache_dir: cache_dir.into(),
            ttl: Duration::hours(CACHE_TTL_HOURS),
            clock: Arc::new(SystemClock),
            sink: Arc::new(LogWriteFailures),
        })
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[cfg(test)]
    pub fn with_write_failure_sink(mut self, sink: Arc<dyn WriteFailureSink>) -> Self {
        self.sink = sink;
        self
    }

    #[cfg(test)]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn entry_path(&self, request: &FetchRequest) -> PathBuf {
        self.cache_dir.join(format!("{}.json", request.cache_key()))
    }

    pub async fn fetch_with_cache(&self, request: &FetchRequest) -> Result<FetchedResponse> {
        let path = self.entry_path(request);

        if let Some(cached) = self.read_fresh(&path).await {
            debug!(method = %request.method, url = %request.url, "cache hit");
            return Ok(cached);
        }

        debug!(method = %request.method, url = %request.url, "cache miss, fetching");
        let response = self.send(request).await?;

        if let Err(e) = self.store(&path, &response).await {
            self.sink.report(&e);
        }

        Ok(response)
    }

    /// Removes the whole cache directory. Missing directory is fine.
    pub async fn clear_cache(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.cache_dir).await {
            Ok(()) => {
                debug!(dir = %self.cache_dir.display(), "cache cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_fresh(&self, path: &Path) -> Option<FetchedResponse> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache file, ignoring");
                return None;
            }
        };

        let file: CacheFile = match serde_json::from_slice(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache file, ignoring");
                return None;
            }
        };

        let stored = DateTime::<Utc>::from_timestamp_millis(file.meta.stored)?;
        let age = self.clock.now() - stored;
        if age >= self.ttl {
            debug!(path = %path.display(), age_minutes = age.num_minutes(), "cache entry expired");
            return None;
        }

        Some(FetchedResponse { body: file.body, headers: file.headers })
    }

    async fn send(&self, request: &FetchRequest) -> Result<FetchedResponse> {
        let mut builder = self.http.request(request.method.clone(), &request.url);
        if let Some(auth) = &request.auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlipError::RemoteRequestFailed { status: status.as_u16(), body });
        }

        let headers = flatten_headers(response.headers());
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes).map_err(|e| {
            SlipError::ResponseSchemaInvalid(format!("{} returned a non-JSON body: {}", request.url, e))
        })?;

        Ok(FetchedResponse { body, headers })
    }

    async fn store(&self, path: &Path, response: &FetchedResponse) -> Result<()> {
        let write_failed = |source: std::io::Error| SlipError::CacheWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(&self.cache_dir).await.map_err(write_failed)?;

        let file = CacheFile {
            body: response.body.clone(),
            headers: response.headers.clone(),
            meta: CacheMeta { stored: self.clock.now().timestamp_millis() },
        };
        let encoded = serde_json::to_vec(&file).map_err(|e| write_failed(e.into()))?;

        tokio::fs::write(path, encoded).await.map_err(write_failed)
    }
}

fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    flat
}
