// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store access shared by the engine components

use ms_core::Operation;
use ms_storage::{Store, StoreError};
use std::sync::{Arc, Mutex, MutexGuard};

pub type SharedStore = Arc<Mutex<Store>>;

pub(crate) fn lock(store: &Mutex<Store>) -> MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}

/// Commit `op`; when the log write fails the change is kept in memory
///
/// The error is returned so the caller can report it.
pub(crate) fn commit_or_keep(store: &Mutex<Store>, op: Operation) -> Result<(), StoreError> {
    let mut store = lock(store);
    match store.commit(op.clone()) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "store write failed, keeping change in memory");
            store.apply_in_memory(op);
            Err(e)
        }
    }
}
