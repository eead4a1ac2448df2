//! In-process backend for development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use cafepos_core::{matches_filter, record_id, Backend, BackendError, Filter, Record, Resource};

/// Rows per resource, kept in insertion order.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    rows: Arc<RwLock<HashMap<Resource, Vec<Record>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored for `resource`.
    pub async fn count(&self, resource: Resource) -> usize {
        self.rows.read().await.get(&resource).map_or(0, Vec::len)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, resource: Resource, filter: &Filter) -> Result<Vec<Record>, BackendError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&resource)
            .map(|table| {
                table
                    .iter()
                    .filter(|r| matches_filter(r, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, resource: Resource, id: &str) -> Result<Record, BackendError> {
        let rows = self.rows.read().await;
        rows.get(&resource)
            .and_then(|table| table.iter().find(|r| record_id(r) == Some(id)))
            .cloned()
            .ok_or_else(|| BackendError::not_found(resource, id))
    }

    async fn insert(&self, resource: Resource, mut record: Record) -> Result<Record, BackendError> {
        let id = match record.get("id") {
            None | Some(Value::Null) => Uuid::new_v4().to_string(),
            Some(Value::String(id)) => id.clone(),
            Some(_) => return Err(BackendError::Validation("id must be a string".into())),
        };
        record.insert("id".into(), Value::String(id.clone()));
        record
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

        let mut rows = self.rows.write().await;
        let table = rows.entry(resource).or_default();
        if table.iter().any(|r| record_id(r) == Some(id.as_str())) {
            return Err(BackendError::Conflict(format!("{resource} '{id}' already exists")));
        }
        table.push(record.clone());
        Ok(record)
    }

    async fn update(&self, resource: Resource, id: &str, patch: Record) -> Result<Record, BackendError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&resource)
            .and_then(|table| table.iter_mut().find(|r| record_id(r) == Some(id)))
            .ok_or_else(|| BackendError::not_found(resource, id))?;
        for (key, value) in patch {
            if key != "id" {
                row.insert(key, value);
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, resource: Resource, id: &str) -> Result<(), BackendError> {
        let mut rows = self.rows.write().await;
        let table = rows
            .get_mut(&resource)
            .ok_or_else(|| BackendError::not_found(resource, id))?;
        let before = table.len();
        table.retain(|r| record_id(r) != Some(id));
        if table.len() == before {
            return Err(BackendError::not_found(resource, id));
        }
        Ok(())
    }
}
