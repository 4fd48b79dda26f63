//! Node-local maintenance state used while shared storage is unavailable.
//!
//! Implementations never fail from the gate's point of view; there is no
//! further fallback beneath them.

pub mod file_fallback;
pub mod mock;

use async_trait::async_trait;

pub use file_fallback::FileFallback;

#[async_trait]
pub trait LocalFallback: Send + Sync {
    /// Evaluate maintenance for `remote_addr` against local state.
    async fn is_on(&self, remote_addr: &str) -> bool;

    /// Persist the local flag; emits its own state-changed notification.
    async fn set(&self, enabled: bool) -> bool;

    async fn set_addresses(&self, addresses: &str) -> bool;

    async fn get_address_info(&self) -> Vec<String>;
}
