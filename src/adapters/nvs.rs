//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`PersistencePort`].  Each is stored
//! as one postcard blob under the `ferraris` namespace:
//!
//! | Key      | Contents                                  |
//! |----------|-------------------------------------------|
//! | `cfg`    | [`MeterConfig`]                           |
//! | `state`  | [`PersistedState`] (counters, threshold)  |
//!
//! ESP-IDF NVS commits are atomic per `nvs_commit()`, so a power loss
//! mid-save leaves the previous blob intact.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{ConfigError, ConfigPort, PersistencePort, StorageError};
use crate::config::MeterConfig;
use crate::engine::meter::PersistedState;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &[u8] = b"ferraris\0";
const CONFIG_KEY: &[u8] = b"cfg\0";
const STATE_KEY: &[u8] = b"state\0";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<&'static [u8], Vec<u8>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    // ── Blob primitives ────────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, key: &'static [u8]) -> Result<Vec<u8>, StorageError> {
        self.store.get(key).cloned().ok_or(StorageError::NotFound)
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&mut self, key: &'static [u8], data: &[u8]) -> Result<(), StorageError> {
        self.store.insert(key, data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self, key: &'static [u8]) -> Result<Vec<u8>, StorageError> {
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(bytes),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
            Err(e) => {
                warn!("NvsAdapter: read error {}", e);
                Err(StorageError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&mut self, key: &'static [u8], data: &[u8]) -> Result<(), StorageError> {
        let result = Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
            Err(e) => {
                warn!("NvsAdapter: write error {}", e);
                Err(StorageError::IoError)
            }
        }
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<MeterConfig, ConfigError> {
        match self.read_blob(CONFIG_KEY) {
            Ok(bytes) => {
                let cfg: MeterConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(MeterConfig::default())
            }
            Err(_) => Err(ConfigError::IoError),
        }
    }

    fn save(&mut self, config: &MeterConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(CONFIG_KEY, &bytes).map_err(|e| match e {
            StorageError::Full => ConfigError::StorageFull,
            _ => ConfigError::IoError,
        })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl PersistencePort for NvsAdapter {
    fn load_state(&self) -> Result<PersistedState, StorageError> {
        match self.read_blob(STATE_KEY) {
            Ok(bytes) => {
                PersistedState::from_bytes(&bytes).map_err(|_| StorageError::Corrupted)
            }
            Err(StorageError::NotFound) => Ok(PersistedState::default()),
            Err(e) => Err(e),
        }
    }

    fn save_state(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        let bytes = state.to_bytes().map_err(|_| StorageError::IoError)?;
        self.write_blob(STATE_KEY, &bytes)
    }

    fn erase_all(&mut self) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        self.store.clear();

        #[cfg(target_os = "espidf")]
        Self::with_nvs_handle(true, |handle| {
            let ret = unsafe { nvs_erase_all(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|_| StorageError::IoError)?;

        info!("NvsAdapter: namespace erased");
        Ok(())
    }
}
