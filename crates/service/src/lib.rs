//! Cluster-wide maintenance gate.
//! - `storage`: shared backends (Redis, SQL) behind one trait, picked by the resolver.
//! - `fallback`: node-local state used whenever shared storage fails.
//! - `gate`: the public surface; never returns a storage error.

pub mod allow_list;
pub mod errors;
pub mod events;
pub mod fallback;
pub mod gate;
pub mod observability;
pub mod storage;

pub use errors::{MaintenanceError, StorageError};
pub use events::{MaintenanceEvent, MaintenanceEvents};
pub use gate::MaintenanceGate;
