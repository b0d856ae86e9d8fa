//! Saved drawings: the remote save/list/clear collaborator, the local
//! key/value fallback store, and the policy that ties them together.
//!
//! Every remote failure is downgraded to the local store. The caller only
//! learns which store served the request through [`StoreKind`]; both cases
//! are reported to the user as success.

use crate::codec;
use crate::error::{ApiError, ApiResult, DrawResult, StorageError, StorageResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Local store slot holding the JSON array of saved drawings.
pub const STORAGE_KEY: &str = "drawings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDrawing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub data_url: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    #[serde(deserialize_with = "deserialize_created_date")]
    pub created_date: DateTime<Utc>,
}

impl SavedDrawing {
    /// Record for `surface`, without an id. A missing name gets the dated default.
    pub fn from_surface(
        name: Option<&str>,
        surface: &RgbaImage,
        now: DateTime<Utc>,
    ) -> DrawResult<Self> {
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_name(now),
        };
        Ok(Self {
            id: None,
            name,
            data_url: codec::to_data_url(surface)?,
            format: "png".to_string(),
            width: surface.width(),
            height: surface.height(),
            created_date: now,
        })
    }

    pub fn decode(&self) -> DrawResult<RgbaImage> {
        codec::from_data_url(&self.data_url)
    }
}

pub fn default_name(now: DateTime<Utc>) -> String {
    format!("Drawing_{}", now.format("%Y-%m-%d"))
}

// Servers may echo the timestamp without a zone
fn deserialize_created_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(date) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// The remote save/list/clear collaborator.
pub trait DrawingApi {
    /// Persist `drawing`; the returned record carries the assigned id.
    fn save(&mut self, drawing: &SavedDrawing) -> ApiResult<SavedDrawing>;
    /// All records in insertion order.
    fn all(&self) -> ApiResult<Vec<SavedDrawing>>;
    fn clear(&mut self) -> ApiResult<()>;
}

/// In-process collaborator with the server's behavior: uuid ids and
/// rejection of records that are not image data URLs.
#[derive(Debug, Default)]
pub struct MemoryApi {
    drawings: Vec<SavedDrawing>,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&SavedDrawing> {
        self.drawings.iter().find(|d| d.id.as_deref() == Some(id))
    }
}

impl DrawingApi for MemoryApi {
    fn save(&mut self, drawing: &SavedDrawing) -> ApiResult<SavedDrawing> {
        if !drawing.data_url.starts_with("data:image") {
            return Err(ApiError::InvalidImage);
        }
        let mut saved = drawing.clone();
        saved.id = Some(uuid::Uuid::new_v4().to_string());
        self.drawings.push(saved.clone());
        Ok(saved)
    }

    fn all(&self) -> ApiResult<Vec<SavedDrawing>> {
        Ok(self.drawings.clone())
    }

    fn clear(&mut self) -> ApiResult<()> {
        self.drawings.clear();
        Ok(())
    }
}

/// Used when no service is configured; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineApi;

impl DrawingApi for OfflineApi {
    fn save(&mut self, _drawing: &SavedDrawing) -> ApiResult<SavedDrawing> {
        Err(ApiError::Unavailable("no drawing service configured".to_string()))
    }

    fn all(&self) -> ApiResult<Vec<SavedDrawing>> {
        Err(ApiError::Unavailable("no drawing service configured".to_string()))
    }

    fn clear(&mut self) -> ApiResult<()> {
        Err(ApiError::Unavailable("no drawing service configured".to_string()))
    }
}

#[cfg(feature = "network")]
pub use http::HttpApi;

#[cfg(feature = "network")]
mod http {
    use super::{DrawingApi, SavedDrawing};
    use crate::error::{ApiError, ApiResult};
    use reqwest::blocking::{Client, Response};
    use serde::de::DeserializeOwned;

    /// JSON-over-HTTP collaborator: `POST {base}/save`, `GET {base}/all`,
    /// `DELETE {base}/clear`.
    pub struct HttpApi {
        base: String,
        client: Client,
    }

    impl HttpApi {
        pub fn new(base: impl Into<String>) -> Self {
            Self {
                base: base.into().trim_end_matches('/').to_string(),
                client: Client::new(),
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}/{}", self.base, path)
        }
    }

    fn unavailable(err: reqwest::Error) -> ApiError {
        ApiError::Unavailable(err.to_string())
    }

    fn check(response: Response) -> ApiResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status(response.status().as_u16()))
        }
    }

    fn parse<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let body = check(response)?.text().map_err(unavailable)?;
        Ok(serde_json::from_str(&body)?)
    }

    impl DrawingApi for HttpApi {
        fn save(&mut self, drawing: &SavedDrawing) -> ApiResult<SavedDrawing> {
            let response = self
                .client
                .post(self.url("save"))
                .json(drawing)
                .send()
                .map_err(unavailable)?;
            parse(response)
        }

        fn all(&self) -> ApiResult<Vec<SavedDrawing>> {
            let response = self.client.get(self.url("all")).send().map_err(unavailable)?;
            parse(response)
        }

        fn clear(&mut self) -> ApiResult<()> {
            let response = self.client.delete(self.url("clear")).send().map_err(unavailable)?;
            check(response).map(|_| ())
        }
    }
}

/// String-keyed local persistence, the shape of browser local storage.
pub trait LocalStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()>;
    fn remove_item(&mut self, key: &str) -> StorageResult<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> StorageResult<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// One file per key under `dir`, optionally lz-string compressed.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    compress: bool,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), compress: false }
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    fn path(&self, key: &str) -> PathBuf {
        let extension = if self.compress { "lz" } else { "json" };
        self.dir.join(format!("{}.{}", key, extension))
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if !self.compress {
            return String::from_utf8(data)
                .map(Some)
                .map_err(|_| StorageError::Corrupted(key.to_string()));
        }

        let decompressed = lz_str::decompress_from_uint8_array(&data)
            .ok_or_else(|| StorageError::Corrupted(key.to_string()))?;
        String::from_utf16(&decompressed)
            .map(Some)
            .map_err(|_| StorageError::Corrupted(key.to_string()))
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        if self.compress {
            fs::write(path, lz_str::compress_to_uint8_array(value))?;
        } else {
            fs::write(path, value)?;
        }
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Remote,
    Local,
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub drawing: SavedDrawing,
    pub stored: StoreKind,
}

impl SaveOutcome {
    pub fn message(&self) -> &'static str {
        match self.stored {
            StoreKind::Remote => "Drawing saved successfully!",
            StoreKind::Local => "Drawing saved locally",
        }
    }
}

pub struct Gallery {
    api: Box<dyn DrawingApi>,
    local: Box<dyn LocalStorage>,
}

impl Gallery {
    pub fn new(api: Box<dyn DrawingApi>, local: Box<dyn LocalStorage>) -> Self {
        Self { api, local }
    }

    pub fn local(&self) -> &dyn LocalStorage {
        self.local.as_ref()
    }

    /// Save remotely, or append to the local slot when the service fails.
    ///
    /// Errors only when the local fallback itself cannot be written.
    pub fn save(&mut self, drawing: SavedDrawing) -> StorageResult<SaveOutcome> {
        match self.api.save(&drawing) {
            Ok(saved) => {
                tracing::info!(id = ?saved.id, name = %saved.name, "drawing saved remotely");
                Ok(SaveOutcome { drawing: saved, stored: StoreKind::Remote })
            }
            Err(err) => {
                tracing::warn!(error = %err, "remote save failed, saving locally");
                let mut drawings = self.read_local()?;
                let mut saved = drawing;
                saved.id = Some(Utc::now().timestamp_millis().to_string());
                drawings.push(saved.clone());
                self.write_local(&drawings)?;
                Ok(SaveOutcome { drawing: saved, stored: StoreKind::Local })
            }
        }
    }

    /// All saved drawings in insertion order.
    pub fn list(&self) -> (Vec<SavedDrawing>, StoreKind) {
        match self.api.all() {
            Ok(drawings) => (drawings, StoreKind::Remote),
            Err(err) => {
                tracing::warn!(error = %err, "remote list failed, reading local store");
                let drawings = self.read_local().unwrap_or_else(|err| {
                    tracing::error!(error = %err, "local store unreadable, showing no drawings");
                    Vec::new()
                });
                (drawings, StoreKind::Local)
            }
        }
    }

    /// Display order for the gallery: most recently saved first.
    pub fn newest_first(&self) -> Vec<SavedDrawing> {
        let (mut drawings, _) = self.list();
        drawings.reverse();
        drawings
    }

    /// Clear the service (best effort) and always drop the local mirror.
    pub fn clear(&mut self) -> StorageResult<()> {
        if let Err(err) = self.api.clear() {
            tracing::warn!(error = %err, "remote clear failed");
        }
        self.local.remove_item(STORAGE_KEY)?;
        tracing::info!("all drawings cleared");
        Ok(())
    }

    fn read_local(&self) -> StorageResult<Vec<SavedDrawing>> {
        match self.local.get_item(STORAGE_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_local(&mut self, drawings: &[SavedDrawing]) -> StorageResult<()> {
        let json = serde_json::to_string(drawings)?;
        self.local.set_item(STORAGE_KEY, &json)
    }
}
