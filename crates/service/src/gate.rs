//! Cluster-wide maintenance gate.
//!
//! Every operation tries the shared store first. Any [`StorageError`] is
//! logged, counted, and answered by the [`LocalFallback`] instead, so a store
//! outage degrades the cluster to independent nodes rather than breaking
//! request handling. Concurrent writers are not coordinated: the store's last
//! write wins.

use std::sync::Arc;

use configs::AppConfig;
use tracing::{debug, instrument, warn};

use crate::allow_list::{is_allowed, parse_address_list, validate_address_list, IpNetMatcher, RangeMatcher};
use crate::errors::{MaintenanceError, StorageError};
use crate::events::MaintenanceEvents;
use crate::fallback::{FileFallback, LocalFallback};
use crate::observability::FALLBACK_TOTAL;
use crate::storage::{MaintenanceStorage, StorageResolver};

pub struct MaintenanceGate {
    storage: Arc<dyn MaintenanceStorage>,
    fallback: Arc<dyn LocalFallback>,
    events: MaintenanceEvents,
    matcher: Arc<dyn RangeMatcher>,
}

impl MaintenanceGate {
    pub fn new(
        storage: Arc<dyn MaintenanceStorage>,
        fallback: Arc<dyn LocalFallback>,
        events: MaintenanceEvents,
    ) -> Self {
        Self { storage, fallback, events, matcher: Arc::new(IpNetMatcher) }
    }

    /// Resolver-backed gate with a file fallback under `maintenance.fallback_dir`.
    /// Performs no I/O; storage connects on first use.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let events = MaintenanceEvents::default();
        let fallback = FileFallback::new(&cfg.maintenance.fallback_dir, events.clone());
        Self::new(Arc::new(StorageResolver::from_config(cfg)), Arc::new(fallback), events)
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn RangeMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn events(&self) -> &MaintenanceEvents {
        &self.events
    }

    /// Whether maintenance blocks `remote_addr`. An empty address yields the flag itself.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use service::{MaintenanceEvents, MaintenanceGate};
    /// use service::fallback::mock::MockFallback;
    /// use service::storage::mock::MockStorage;
    /// let storage = Arc::new(MockStorage::with_state(true, "10.0.0.0/8"));
    /// let gate = MaintenanceGate::new(storage, Arc::new(MockFallback::new()), MaintenanceEvents::default());
    /// assert!(tokio_test::block_on(gate.is_on("192.168.1.1")));
    /// assert!(!tokio_test::block_on(gate.is_on("10.1.2.3")));
    /// ```
    pub async fn is_on(&self, remote_addr: &str) -> bool {
        match self.evaluate(remote_addr).await {
            Ok(on) => on,
            Err(e) => {
                self.record_fallback("is_on", &e);
                self.fallback.is_on(remote_addr).await
            }
        }
    }

    async fn evaluate(&self, remote_addr: &str) -> Result<bool, StorageError> {
        if !self.storage.has_flag().await? {
            return Ok(false);
        }
        if remote_addr.is_empty() {
            return Ok(true);
        }
        let allowed = parse_address_list(&self.storage.get_addresses().await?);
        Ok(!is_allowed(&allowed, remote_addr, self.matcher.as_ref()))
    }

    /// Turn maintenance on or off cluster-wide.
    #[instrument(skip(self))]
    pub async fn set(&self, enabled: bool) -> bool {
        match self.storage.set_flag(enabled).await {
            Ok(()) => {
                debug!(enabled, backend = self.storage.name(), "maintenance flag stored");
                self.events.state_changed(enabled);
                true
            }
            Err(e) => {
                self.record_fallback("set", &e);
                self.fallback.set(enabled).await
            }
        }
    }

    /// Replace the allow-list wholesale. Malformed input is rejected before
    /// any storage is touched.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use service::{MaintenanceError, MaintenanceEvents, MaintenanceGate};
    /// use service::fallback::mock::MockFallback;
    /// use service::storage::mock::MockStorage;
    /// let gate = MaintenanceGate::new(Arc::new(MockStorage::new()), Arc::new(MockFallback::new()), MaintenanceEvents::default());
    /// assert_eq!(tokio_test::block_on(gate.set_addresses("1.2.3.4,10.0.0.0/8")), Ok(true));
    /// assert!(matches!(
    ///     tokio_test::block_on(gate.set_addresses("1.2.3.4, 5.6.7.8")),
    ///     Err(MaintenanceError::InvalidInput(_))
    /// ));
    /// ```
    #[instrument(skip(self))]
    pub async fn set_addresses(&self, addresses: &str) -> Result<bool, MaintenanceError> {
        validate_address_list(addresses)?;
        match self.storage.set_addresses(addresses).await {
            Ok(()) => Ok(true),
            Err(e) => {
                self.record_fallback("set_addresses", &e);
                Ok(self.fallback.set_addresses(addresses).await)
            }
        }
    }

    pub async fn get_address_info(&self) -> Vec<String> {
        match self.storage.get_addresses().await {
            Ok(raw) => parse_address_list(&raw),
            Err(e) => {
                self.record_fallback("get_address_info", &e);
                self.fallback.get_address_info().await
            }
        }
    }

    fn record_fallback(&self, operation: &'static str, err: &StorageError) {
        FALLBACK_TOTAL.with_label_values(&[operation]).inc();
        warn!(
            event = "maintenance_storage_fallback",
            operation,
            error = %err,
            "shared maintenance storage unavailable; using local fallback"
        );
    }
}
