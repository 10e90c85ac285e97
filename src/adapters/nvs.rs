//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the water meter.
//! Everything lives in the `watermeter` namespace: the config as one
//! postcard blob under `meter_cfg`, the counters as native NVS `u64`s.
//!
//! - Config validation: [`MeterConfig::validate`] runs before every save.
//! - Atomic writes: ESP-IDF NVS commits are atomic per key; multi-key
//!   atomicity for the counter record is handled by
//!   [`PersistenceGateway`](crate::persistence::PersistenceGateway).
//! - The simulation backend keeps everything in a `HashMap`.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::MeterConfig;
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "watermeter";
const CONFIG_KEY: &str = "meter_cfg";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;

#[cfg(not(target_os = "espidf"))]
#[derive(Clone, PartialEq, Eq)]
enum SimValue {
    Blob(Vec<u8>),
    U64(u64),
}

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, SimValue>>,
}

impl NvsAdapter {
    /// Bring up the default NVS partition.
    ///
    /// A partition with no free pages or from a newer IDF is erased and
    /// formatted once; any other failure is `ConfigError::IoError`, and
    /// the caller runs without persistence.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NVS: partition ready, namespace {}", NAMESPACE);
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NVS: in-memory backend (host build)");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(key: &str) -> String {
        format!("{}::{}", NAMESPACE, key)
    }

    /// NVS keys are ≤ 15 bytes; copy into a NUL-terminated buffer.
    #[cfg(target_os = "espidf")]
    fn c_key(key: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let kb = key.as_bytes();
        let kl = kb.len().min(15);
        buf[..kl].copy_from_slice(&kb[..kl]);
        buf
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_key(NAMESPACE);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
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
        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(CONFIG_KEY);
            match self.store.borrow().get(&key) {
                Some(SimValue::Blob(bytes)) => {
                    let cfg: MeterConfig =
                        postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                    info!("NVS: meter_cfg restored");
                    Ok(cfg)
                }
                Some(SimValue::U64(_)) => Err(ConfigError::Corrupted),
                None => {
                    info!("NVS: meter_cfg absent, first boot defaults");
                    Ok(MeterConfig::default())
                }
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(false, |handle| {
                let key = Self::c_key(CONFIG_KEY);
                let mut size: usize = 0;

                // First call: get size
                let ret = unsafe {
                    nvs_get_blob(handle, key.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
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
                Ok(bytes) => {
                    let cfg: MeterConfig =
                        postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                    info!("NVS: meter_cfg restored ({} B)", bytes.len());
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NVS: meter_cfg absent, first boot defaults");
                    Ok(MeterConfig::default())
                }
                Err(e) => {
                    warn!("NVS: meter_cfg read failed ({}), defaults", e);
                    Ok(MeterConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &MeterConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(CONFIG_KEY);
            self.store.borrow_mut().insert(key, SimValue::Blob(bytes));
            info!("NVS: meter_cfg written");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let key = Self::c_key(CONFIG_KEY);
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
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
                Ok(()) => {
                    info!("NVS: meter_cfg written ({} B)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(ConfigError::StorageFull),
                Err(e) => {
                    warn!("NVS: meter_cfg write failed ({})", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

impl StoragePort for NvsAdapter {
    fn is_available(&self) -> bool {
        true
    }

    fn get_u64(&self, key: &str, default: u64) -> Result<u64, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.borrow().get(&Self::composite_key(key)) {
                Some(SimValue::U64(v)) => Ok(*v),
                Some(SimValue::Blob(_)) => Err(StorageError::IoError),
                None => Ok(default),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(false, |handle| {
                let k = Self::c_key(key);
                let mut value: u64 = 0;
                let ret = unsafe { nvs_get_u64(handle, k.as_ptr() as *const _, &mut value) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(value)
            });
            match result {
                Ok(v) => Ok(v),
                // A namespace that was never written cannot be opened
                // read-only; both cases mean first boot.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(default),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn put_u64(&mut self, key: &str, value: u64) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(key), SimValue::U64(value));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let k = Self::c_key(key);
                let ret = unsafe { nvs_set_u64(handle, k.as_ptr() as *const _, value) };
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
                Err(_) => Err(StorageError::IoError),
            }
        }
    }
}
