//! Transient key/value storage that survives an off-site payment redirect.
//!
//! The only message carried across that boundary is the pending order
//! payload, written under a single fixed key. Two checkouts running in
//! parallel against the same store overwrite each other's payload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::errors::CheckoutError;
use crate::models::PendingOrderPayload;

/// Fixed key for the pending order payload.
pub const PENDING_ORDER_KEY: &str = "pendingOrder";

/// Session-scoped string storage, the equivalent of browser session storage.
pub trait TransientStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CheckoutError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CheckoutError>;
    fn remove(&self, key: &str) -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
pub struct MemoryTransientStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTransientStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TransientStore for MemoryTransientStore {
    fn get(&self, key: &str) -> Result<Option<String>, CheckoutError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CheckoutError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CheckoutError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileTransientStore {
    dir: PathBuf,
}

impl FileTransientStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CheckoutError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CheckoutError::Storage(format!("invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl TransientStore for FileTransientStore {
    fn get(&self, key: &str) -> Result<Option<String>, CheckoutError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).map_err(|e| {
            CheckoutError::Storage(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(Some(data))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CheckoutError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            CheckoutError::Storage(format!("failed to create {}: {}", self.dir.display(), e))
        })?;
        // Write-then-rename so a crash never leaves half a payload behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| {
            CheckoutError::Storage(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            CheckoutError::Storage(format!("failed to move {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CheckoutError> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                CheckoutError::Storage(format!("failed to remove {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}

/// Typed access to the pending order payload.
#[derive(Clone)]
pub struct PendingOrderStore {
    store: Arc<dyn TransientStore>,
}

impl PendingOrderStore {
    pub fn new(store: Arc<dyn TransientStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, payload: &PendingOrderPayload) -> Result<(), CheckoutError> {
        let json = serde_json::to_string(payload)?;
        self.store.set(PENDING_ORDER_KEY, &json)?;
        debug!(
            customer_email = %payload.form.customer_email,
            lines = payload.items.len(),
            "Saved pending order payload"
        );
        Ok(())
    }

    /// Reads the payload without consuming it. A payload that no longer
    /// parses is treated as absent.
    pub fn load(&self) -> Result<Option<PendingOrderPayload>, CheckoutError> {
        let Some(raw) = self.store.get(PENDING_ORDER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(payload) => Ok(Some(payload)),
            Err(err) => {
                warn!(error = %err, "Discarding unreadable pending order payload");
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<(), CheckoutError> {
        self.store.remove(PENDING_ORDER_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CartItem, CartSnapshot, CheckoutFormData, PaymentMethod};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn payload() -> PendingOrderPayload {
        let form = CheckoutFormData {
            customer_name: "Jane Doe".into(),
            customer_email: "jane@x.com".into(),
            customer_phone: "91234567".into(),
            delivery_address: "10 Long Street, HK".into(),
            delivery_date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            delivery_notes: Some("Ring twice".into()),
            payment_method: PaymentMethod::AliPay,
        };
        let cart = CartSnapshot::new(vec![CartItem {
            product_id: 1,
            quantity: 2,
            unit_price: dec!(100),
            name: "Rose Bouquet".into(),
            image: None,
        }]);
        PendingOrderPayload::new(form, &cart)
    }

    #[test]
    fn memory_store_round_trip() {
        let pending = PendingOrderStore::new(Arc::new(MemoryTransientStore::new()));
        let written = payload();
        pending.save(&written).unwrap();
        assert_eq!(pending.load().unwrap(), Some(written));
        pending.clear().unwrap();
        assert_eq!(pending.load().unwrap(), None);
    }

    #[test]
    fn file_store_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        let written = payload();
        PendingOrderStore::new(Arc::new(FileTransientStore::new(dir.path())))
            .save(&written)
            .unwrap();

        // A fresh store over the same directory stands in for the page
        // being rebuilt after the redirect.
        let reopened = PendingOrderStore::new(Arc::new(FileTransientStore::new(dir.path())));
        assert_eq!(reopened.load().unwrap(), Some(written));
        reopened.clear().unwrap();
        assert!(!dir.path().join("pendingOrder.json").exists());
        reopened.clear().unwrap();
    }

    #[test]
    fn second_save_overwrites_first() {
        let pending = PendingOrderStore::new(Arc::new(MemoryTransientStore::new()));
        let first = payload();
        let mut second = payload();
        second.form.customer_email = "other@x.com".into();
        pending.save(&first).unwrap();
        pending.save(&second).unwrap();
        assert_eq!(pending.load().unwrap(), Some(second));
    }

    #[test]
    fn corrupt_payload_reads_as_absent() {
        let store = Arc::new(MemoryTransientStore::new());
        store.set(PENDING_ORDER_KEY, "{not json").unwrap();
        let pending = PendingOrderStore::new(store);
        assert_eq!(pending.load().unwrap(), None);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileTransientStore::new(dir.path());
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
    }
}
