// ABOUTME: Device registry persisted as a JSON file in the configured storage directory
// ABOUTME: Writes go to a sibling temp file and are renamed into place so a crash never truncates the registry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{DeviceRecord, DeviceStore};
use crate::errors::{AppError, AppResult};

/// File name of the registry inside the storage directory
pub const REGISTRY_FILE_NAME: &str = "devices.json";

/// JSON file backed device store
pub struct JsonFileDeviceStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileDeviceStore {
    /// Store at `<dir>/devices.json`
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::at_path(dir.as_ref().join(REGISTRY_FILE_NAME))
    }

    /// Store at an explicit path
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Registry file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeviceStore for JsonFileDeviceStore {
    async fn load_devices(&self) -> AppResult<Vec<DeviceRecord>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No device registry yet");
                return Ok(Vec::new());
            }
            Err(error) => return Err(error.into()),
        };
        let records: Vec<DeviceRecord> = serde_json::from_slice(&raw).map_err(|e| {
            AppError::storage(format!("Corrupt device registry {}: {e}", self.path.display()))
        })?;
        info!(path = %self.path.display(), devices = records.len(), "Loaded device registry");
        Ok(records)
    }

    async fn save_devices(&self, records: &[DeviceRecord]) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json).await?;
        fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), devices = records.len(), "Saved device registry");
        Ok(())
    }
}
