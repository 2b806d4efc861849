//! Ground truth shared by the mock chain and the mock relayer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vault_dashboard::CiphertextHandle;

/// Plaintext behind every handle the mock chain produced.
#[derive(Clone, Debug, Default)]
pub struct PlaintextBook {
    entries: Arc<Mutex<HashMap<CiphertextHandle, u128>>>,
}

impl PlaintextBook {
    pub fn insert(&self, handle: CiphertextHandle, value: u128) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(handle, value);
    }

    pub fn get(&self, handle: &CiphertextHandle) -> Option<u128> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(handle)
            .copied()
    }
}
