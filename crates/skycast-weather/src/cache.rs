//! Condition icon cache.
//!
//! Icons are fetched once per URL and kept in SQLite. Entries never expire
//! here; if a row exists for the exact URL it is served without a request.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, CACHE_CONTROL, CONTENT_TYPE, ETAG};
use reqwest::{Client, StatusCode};
use rusqlite::{params, Connection, OptionalExtension};
use skycast_core::{NetworkError, PersistenceError, ReqwestErrorExt, RusqliteErrorExt};
use std::path::Path;
use tracing::instrument;
use url::Url;

/// Build the icon URL for a condition code: `<base>/<code>@2x.png`.
pub fn icon_url(image_base_url: &str, icon_code: &str) -> Result<Url, NetworkError> {
    let raw = format!("{}/{}@2x.png", image_base_url.trim_end_matches('/'), icon_code);
    Url::parse(&raw).map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", raw, e)))
}

/// A stored icon response
#[derive(Debug, Clone, PartialEq)]
pub struct CachedImage {
    pub bytes: Vec<u8>,
    pub status: u16,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub stored_at: DateTime<Utc>,
}

/// SQLite table of icon responses keyed by request URL.
pub struct IconStore {
    conn: Mutex<Connection>,
}

impl IconStore {
    /// Open (or create) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(RusqliteErrorExt::into_persistence_error)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Store that lives only as long as this value.
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(RusqliteErrorExt::into_persistence_error)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), PersistenceError> {
        self.conn
            .lock()
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS images (
                    url TEXT PRIMARY KEY,
                    bytes BLOB NOT NULL,
                    status INTEGER NOT NULL,
                    content_type TEXT,
                    etag TEXT,
                    stored_at INTEGER NOT NULL
                );
                "#,
            )
            .map_err(RusqliteErrorExt::into_persistence_error)
    }

    pub fn get(&self, url: &str) -> Result<Option<CachedImage>, PersistenceError> {
        self.conn
            .lock()
            .query_row(
                "SELECT bytes, status, content_type, etag, stored_at FROM images WHERE url = ?1",
                params![url],
                |row| {
                    let stored_ms: i64 = row.get(4)?;
                    Ok(CachedImage {
                        bytes: row.get(0)?,
                        status: row.get(1)?,
                        content_type: row.get(2)?,
                        etag: row.get(3)?,
                        stored_at: DateTime::from_timestamp_millis(stored_ms).unwrap_or_default(),
                    })
                },
            )
            .optional()
            .map_err(RusqliteErrorExt::into_persistence_error)
    }

    pub fn put(&self, url: &str, image: &CachedImage) -> Result<(), PersistenceError> {
        self.conn
            .lock()
            .execute(
                r#"
                INSERT OR REPLACE INTO images (url, bytes, status, content_type, etag, stored_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    url,
                    image.bytes,
                    image.status,
                    image.content_type,
                    image.etag,
                    image.stored_at.timestamp_millis(),
                ],
            )
            .map_err(RusqliteErrorExt::into_persistence_error)?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, PersistenceError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
            .map_err(RusqliteErrorExt::into_persistence_error)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, PersistenceError> {
        Ok(self.len()? == 0)
    }
}

/// Whether a response may be written to the store.
///
/// Only full 200/203 responses qualify, and `Cache-Control: no-store`
/// always wins.
pub fn is_cacheable(status: StatusCode, headers: &HeaderMap) -> bool {
    if status != StatusCode::OK && status != StatusCode::NON_AUTHORITATIVE_INFORMATION {
        return false;
    }

    let no_store = headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-store"));

    !no_store
}

/// Loads icon bytes, going to the network only on a store miss.
pub struct ImageCache {
    client: Client,
    store: IconStore,
}

impl ImageCache {
    pub fn new(client: Client, store: IconStore) -> Self {
        Self { client, store }
    }

    pub fn store(&self) -> &IconStore {
        &self.store
    }

    /// Bytes for `url`, from the store when present.
    ///
    /// On failure the caller should keep whatever it was showing before.
    /// Store errors are logged and treated as a miss (on read) or skipped
    /// (on write); they never fail the load.
    #[instrument(skip_all, fields(url = %url), level = "debug")]
    pub async fn load_image(&self, url: &Url) -> Result<Vec<u8>, NetworkError> {
        match self.store.get(url.as_str()) {
            Ok(Some(hit)) => {
                tracing::debug!("Icon cache hit ({} bytes)", hit.bytes.len());
                return Ok(hit.bytes);
            }
            Ok(None) => tracing::debug!("Icon cache miss"),
            Err(e) => tracing::warn!("Icon cache lookup failed, fetching instead: {}", e),
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: format!("failed to fetch {}", url),
            });
        }

        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?
            .to_vec();

        if is_cacheable(status, &headers) {
            let entry = CachedImage {
                bytes: bytes.clone(),
                status: status.as_u16(),
                content_type: header_string(&headers, CONTENT_TYPE.as_str()),
                etag: header_string(&headers, ETAG.as_str()),
                stored_at: Utc::now(),
            };
            if let Err(e) = self.store.put(url.as_str(), &entry) {
                tracing::warn!("Failed to cache icon: {}", e);
            }
        } else {
            tracing::debug!("Icon response not cacheable (status {})", status);
        }

        Ok(bytes)
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
