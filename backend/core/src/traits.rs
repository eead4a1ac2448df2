use anyhow::Result;
use async_trait::async_trait;

use crate::error::{BackendError, FetchError};
use crate::resource::{Filter, Record, Resource};
use crate::status::{OpenItem, StatusSnapshot};

/// Read-only source of server-side status rows, queried by key.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_snapshot(&self, entity_id: &str) -> Result<StatusSnapshot, FetchError>;
}

/// Caller-supplied work run by the refresh scheduler.
///
/// The scheduler only decides when this runs; errors are logged, not propagated.
#[async_trait]
pub trait RefreshAction: Send + Sync {
    async fn refresh(&self) -> Result<()>;
}

/// Locally known open orders, consulted on every reconciliation.
pub trait LocalOpenItems: Send + Sync {
    fn open_items_for(&self, entity_id: &str) -> Vec<OpenItem>;
}

impl LocalOpenItems for Vec<OpenItem> {
    fn open_items_for(&self, entity_id: &str) -> Vec<OpenItem> {
        self.iter()
            .filter(|item| item.table_id == entity_id)
            .cloned()
            .collect()
    }
}

/// The hosted relational service that owns all persistent state.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name for logs (e.g., "memory", "rest").
    fn name(&self) -> &str;

    async fn list(&self, resource: Resource, filter: &Filter) -> Result<Vec<Record>, BackendError>;

    async fn get(&self, resource: Resource, id: &str) -> Result<Record, BackendError>;

    /// Insert a record; the returned row carries the stored representation.
    async fn insert(&self, resource: Resource, record: Record) -> Result<Record, BackendError>;

    /// Merge `patch` into an existing row.
    async fn update(&self, resource: Resource, id: &str, patch: Record) -> Result<Record, BackendError>;

    async fn delete(&self, resource: Resource, id: &str) -> Result<(), BackendError>;
}
