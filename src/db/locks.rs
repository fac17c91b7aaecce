//! Per-device single-writer registry.
//!
//! Every mutation of a device's live state (power status, production records)
//! happens while holding that device's mutex. Pools that share one registry
//! through `Arc` serialize their writers per device while different devices
//! proceed in parallel.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct DeviceLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `device_id`, created on first use.
    pub fn for_device(&self, device_id: i64) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock();
        map.entry(device_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
