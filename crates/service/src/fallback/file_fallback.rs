use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::LocalFallback;
use crate::allow_list::{is_allowed, parse_address_list, IpNetMatcher, RangeMatcher};
use crate::events::MaintenanceEvents;

/// Existence of this file means maintenance is on for this node.
pub const FLAG_FILE: &str = ".maintenance.flag";
/// Comma-joined allow-list for this node.
pub const IP_FILE: &str = ".maintenance.ip";

/// File-backed single-node maintenance state.
///
/// I/O errors are logged and degrade to "off" / empty / `false`.
pub struct FileFallback {
    dir: PathBuf,
    events: MaintenanceEvents,
    matcher: Arc<dyn RangeMatcher>,
}

impl FileFallback {
    pub fn new<P: Into<PathBuf>>(dir: P, events: MaintenanceEvents) -> Self {
        Self { dir: dir.into(), events, matcher: Arc::new(IpNetMatcher) }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn RangeMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn flag_path(&self) -> PathBuf {
        self.dir.join(FLAG_FILE)
    }

    fn ip_path(&self) -> PathBuf {
        self.dir.join(IP_FILE)
    }

    async fn flag_exists(&self) -> bool {
        match fs::try_exists(self.flag_path()).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(path = %self.flag_path().display(), error = %e, "cannot stat local maintenance flag");
                false
            }
        }
    }

    async fn write(&self, path: PathBuf, contents: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(path, contents).await
    }
}

async fn remove_if_exists(path: PathBuf) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[async_trait]
impl LocalFallback for FileFallback {
    async fn is_on(&self, remote_addr: &str) -> bool {
        if !self.flag_exists().await {
            return false;
        }
        if remote_addr.is_empty() {
            return true;
        }
        let allowed = self.get_address_info().await;
        !is_allowed(&allowed, remote_addr, self.matcher.as_ref())
    }

    async fn set(&self, enabled: bool) -> bool {
        let res = if enabled {
            self.write(self.flag_path(), "").await
        } else {
            remove_if_exists(self.flag_path()).await
        };
        match res {
            Ok(()) => {
                debug!(enabled, dir = %self.dir.display(), "local maintenance flag written");
                self.events.state_changed(enabled);
                true
            }
            Err(e) => {
                warn!(enabled, path = %self.flag_path().display(), error = %e, "cannot write local maintenance flag");
                false
            }
        }
    }

    async fn set_addresses(&self, addresses: &str) -> bool {
        let res = if addresses.is_empty() {
            remove_if_exists(self.ip_path()).await
        } else {
            self.write(self.ip_path(), addresses).await
        };
        if let Err(e) = &res {
            warn!(path = %self.ip_path().display(), error = %e, "cannot write local maintenance allow-list");
        }
        res.is_ok()
    }

    async fn get_address_info(&self) -> Vec<String> {
        match fs::read_to_string(self.ip_path()).await {
            Ok(contents) => parse_address_list(contents.trim()),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %self.ip_path().display(), error = %e, "cannot read local maintenance allow-list");
                Vec::new()
            }
        }
    }
}
