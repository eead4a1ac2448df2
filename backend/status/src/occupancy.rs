//! Table occupancy derived from open orders.
//!
//! Every write that opens, closes, moves or removes an order must re-derive
//! the affected tables so the status row the reconciler polls stays current.

use serde_json::{json, Value};
use tracing::debug;

use cafepos_core::{Backend, BackendError, Record, Resource, ORDER_OPEN};

/// Recompute a table's `is_available`, `status` and `current_total` from its
/// open orders.
pub async fn sync_table_occupancy(backend: &dyn Backend, table_id: &str) -> Result<Record, BackendError> {
    let filter = vec![
        ("status".to_string(), ORDER_OPEN.to_string()),
        ("table_id".to_string(), table_id.to_string()),
    ];
    let open = backend.list(Resource::Orders, &filter).await?;

    let mut patch = Record::new();
    if open.is_empty() {
        patch.insert("is_available".into(), Value::Bool(true));
        patch.insert("status".into(), json!("available"));
        patch.insert("current_total".into(), Value::Null);
    } else {
        let total: f64 = open
            .iter()
            .filter_map(|o| o.get("total").and_then(Value::as_f64))
            .sum();
        patch.insert("is_available".into(), Value::Bool(false));
        patch.insert("status".into(), json!("occupied"));
        patch.insert("current_total".into(), json!(total));
    }
    backend.update(Resource::Tables, table_id, patch).await
}

/// Re-sync each distinct table. Tables that no longer exist are skipped.
pub async fn resync_tables<'a>(
    backend: &dyn Backend,
    table_ids: impl IntoIterator<Item = &'a str>,
) -> Result<(), BackendError> {
    let mut seen: Vec<&str> = Vec::new();
    for table_id in table_ids {
        if seen.contains(&table_id) {
            continue;
        }
        seen.push(table_id);
        match sync_table_occupancy(backend, table_id).await {
            Ok(_) => {}
            Err(BackendError::NotFound { .. }) => {
                debug!(table_id, "table gone; occupancy not synced");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// The `table_id` of an order row, if it has one.
pub fn order_table_id(order: &Record) -> Option<&str> {
    order.get("table_id").and_then(Value::as_str)
}
