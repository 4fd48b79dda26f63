//! Recording fallback for tests and doc examples.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::LocalFallback;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCall {
    IsOn(String),
    Set(bool),
    SetAddresses(String),
    GetAddressInfo,
}

/// Returns canned answers and records every call in order.
pub struct MockFallback {
    is_on: bool,
    set_result: bool,
    set_addresses_result: bool,
    addresses: Vec<String>,
    calls: Mutex<Vec<FallbackCall>>,
}

impl Default for MockFallback {
    fn default() -> Self {
        Self {
            is_on: false,
            set_result: true,
            set_addresses_result: true,
            addresses: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockFallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering_is_on(mut self, is_on: bool) -> Self {
        self.is_on = is_on;
        self
    }

    pub fn answering_set(mut self, ok: bool) -> Self {
        self.set_result = ok;
        self
    }

    pub fn answering_set_addresses(mut self, ok: bool) -> Self {
        self.set_addresses_result = ok;
        self
    }

    pub fn answering_addresses(mut self, addresses: &[&str]) -> Self {
        self.addresses = addresses.iter().map(|a| a.to_string()).collect();
        self
    }

    pub async fn calls(&self) -> Vec<FallbackCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: FallbackCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl LocalFallback for MockFallback {
    async fn is_on(&self, remote_addr: &str) -> bool {
        self.record(FallbackCall::IsOn(remote_addr.to_string())).await;
        self.is_on
    }

    async fn set(&self, enabled: bool) -> bool {
        self.record(FallbackCall::Set(enabled)).await;
        self.set_result
    }

    async fn set_addresses(&self, addresses: &str) -> bool {
        self.record(FallbackCall::SetAddresses(addresses.to_string())).await;
        self.set_addresses_result
    }

    async fn get_address_info(&self) -> Vec<String> {
        self.record(FallbackCall::GetAddressInfo).await;
        self.addresses.clone()
    }
}
