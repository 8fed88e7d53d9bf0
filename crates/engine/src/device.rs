// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable per-install device identity

use crate::persist;
use chrono::{DateTime, Utc};
use ms_core::{Clock, IdGen};
use ms_storage::{KeyValueStore, Store, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Store key holding the serialized identity
pub const DEVICE_IDENTITY_KEY: &str = "device_identity";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DeviceIdentity {
    /// Load the persisted identity, creating it on first run
    ///
    /// The id never changes once written. A configured `device_name` that
    /// differs from the stored one replaces it. An unreadable record is
    /// replaced with a fresh identity.
    pub fn load_or_create(
        store: &Mutex<Store>,
        id_gen: &impl IdGen,
        clock: &impl Clock,
        device_name: Option<&str>,
    ) -> Result<Self, StoreError> {
        let mut store = persist::lock(store);

        let existing = store.get(DEVICE_IDENTITY_KEY).and_then(|text| {
            serde_json::from_str::<DeviceIdentity>(text)
                .map_err(|e| tracing::warn!(error = %e, "unreadable device identity, regenerating"))
                .ok()
        });

        let identity = match existing {
            Some(identity)
                if device_name.is_none() || identity.device_name.as_deref() == device_name =>
            {
                return Ok(identity);
            }
            Some(identity) => DeviceIdentity {
                device_name: device_name.map(str::to_string),
                ..identity
            },
            None => {
                let identity = DeviceIdentity {
                    device_id: id_gen.next(),
                    device_name: device_name.map(str::to_string),
                    created_at: clock.utc_now(),
                };
                tracing::info!(device_id = %identity.device_id, "created device identity");
                identity
            }
        };

        store.set(DEVICE_IDENTITY_KEY, serde_json::to_string(&identity)?)?;
        Ok(identity)
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
