//! In-memory storage for tests and doc examples.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::MaintenanceStorage;
use crate::errors::StorageError;

pub const OP_HAS_FLAG: &str = "has_flag";
pub const OP_SET_FLAG: &str = "set_flag";
pub const OP_GET_ADDRESSES: &str = "get_addresses";
pub const OP_SET_ADDRESSES: &str = "set_addresses";

#[derive(Default)]
struct MockState {
    flag: bool,
    addresses: String,
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
}

/// Shared-store stand-in with per-operation failure injection and call counting.
pub struct MockStorage {
    name: &'static str,
    state: Mutex<MockState>,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::named("mock")
    }
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: &'static str) -> Self {
        Self { name, state: Mutex::new(MockState::default()) }
    }

    /// Start with the given flag and raw address list.
    pub fn with_state(flag: bool, addresses: &str) -> Self {
        Self {
            name: "mock",
            state: Mutex::new(MockState { flag, addresses: addresses.to_string(), ..Default::default() }),
        }
    }

    /// Make `operation` fail with a connection error until [`MockStorage::heal`].
    pub async fn fail(&self, operation: &'static str) {
        self.state.lock().await.failing.insert(operation);
    }

    pub async fn fail_all(&self) {
        let mut state = self.state.lock().await;
        for op in [OP_HAS_FLAG, OP_SET_FLAG, OP_GET_ADDRESSES, OP_SET_ADDRESSES] {
            state.failing.insert(op);
        }
    }

    pub async fn heal(&self) {
        self.state.lock().await.failing.clear();
    }

    /// Number of times `operation` was invoked, failed calls included.
    pub async fn calls(&self, operation: &'static str) -> usize {
        self.state.lock().await.calls.get(operation).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }

    async fn enter(&self, operation: &'static str) -> Result<tokio::sync::MutexGuard<'_, MockState>, StorageError> {
        let mut state = self.state.lock().await;
        *state.calls.entry(operation).or_insert(0) += 1;
        if state.failing.contains(operation) {
            return Err(StorageError::Connection(format!("{} unavailable", self.name)));
        }
        Ok(state)
    }
}

#[async_trait]
impl MaintenanceStorage for MockStorage {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn has_flag(&self) -> Result<bool, StorageError> {
        Ok(self.enter(OP_HAS_FLAG).await?.flag)
    }

    async fn set_flag(&self, enabled: bool) -> Result<(), StorageError> {
        self.enter(OP_SET_FLAG).await?.flag = enabled;
        Ok(())
    }

    async fn get_addresses(&self) -> Result<String, StorageError> {
        Ok(self.enter(OP_GET_ADDRESSES).await?.addresses.trim().to_string())
    }

    async fn set_addresses(&self, addresses: &str) -> Result<(), StorageError> {
        self.enter(OP_SET_ADDRESSES).await?.addresses = addresses.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_failures_count_calls_and_heal() {
        let storage = MockStorage::with_state(true, "1.2.3.4");
        storage.fail(OP_GET_ADDRESSES).await;

        assert_eq!(storage.has_flag().await.ok(), Some(true));
        assert!(storage.get_addresses().await.is_err());
        assert_eq!(storage.calls(OP_GET_ADDRESSES).await, 1);

        storage.heal().await;
        assert_eq!(storage.get_addresses().await.ok().as_deref(), Some("1.2.3.4"));
        assert_eq!(storage.total_calls().await, 3);
    }
}
