//! Route handlers.
//!
//! Each handler is a plain async function over [`AppState`] so it can be
//! called directly; the router wraps them with extractors.

use std::collections::HashMap;

use axum::{http::StatusCode, response::Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use cafepos_core::{
    record_id, BackendError, Filter, Record, Resource, StatusSnapshot, ORDER_CLOSED, ORDER_OPEN,
};
use cafepos_status::{order_table_id, resync_tables, snapshot_from_table, sync_table_occupancy};

use crate::auth::AuthenticatedStaff;
use crate::error::ApiError;
use crate::server::AppState;
use crate::validation::{validate_create, validate_patch};

pub type ApiResult<T> = Result<T, ApiError>;

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

fn into_record(body: Value) -> ApiResult<Record> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::BadRequest("request body must be a JSON object".into())),
    }
}

/// Query-string equality filters, sorted by column for stable backend queries.
pub fn filter_from_query(query: HashMap<String, String>) -> Filter {
    let mut filter: Filter = query.into_iter().collect();
    filter.sort();
    filter
}

pub async fn health(state: &AppState) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "backend": state.backend.name(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn list_records(state: &AppState, resource: Resource, filter: Filter) -> ApiResult<Json<Vec<Record>>> {
    Ok(Json(state.backend.list(resource, &filter).await?))
}

pub async fn get_record(state: &AppState, resource: Resource, id: &str) -> ApiResult<Json<Record>> {
    Ok(Json(state.backend.get(resource, id).await?))
}

#[instrument(skip(state, staff, body), fields(staff_id = %staff.staff_id))]
pub async fn create_record(
    state: &AppState,
    staff: &AuthenticatedStaff,
    resource: Resource,
    body: Value,
) -> ApiResult<(StatusCode, Json<Record>)> {
    staff.ensure_can_write(resource)?;
    let mut record = into_record(body)?;
    validate_create(resource, &record)?;

    record.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    record.insert("created_at".into(), now());

    let row = match resource {
        Resource::Orders => create_order(state, record).await?,
        Resource::CheckIns => {
            record.entry("checked_in_at").or_insert_with(now);
            record.insert("checked_out_at".into(), Value::Null);
            state.backend.insert(resource, record).await?
        }
        Resource::Tables => {
            record.entry("is_available").or_insert(Value::Bool(true));
            record.entry("status").or_insert_with(|| json!("available"));
            state.backend.insert(resource, record).await?
        }
        _ => state.backend.insert(resource, record).await?,
    };
    info!(id = record_id(&row).unwrap_or_default(), "Created {resource}");
    Ok((StatusCode::CREATED, Json(row)))
}

#[instrument(skip(state, staff, body), fields(staff_id = %staff.staff_id))]
pub async fn update_record(
    state: &AppState,
    staff: &AuthenticatedStaff,
    resource: Resource,
    id: &str,
    body: Value,
) -> ApiResult<Json<Record>> {
    staff.ensure_can_write(resource)?;
    let mut patch = into_record(body)?;
    validate_patch(resource, id, &patch)?;
    patch.remove("id");

    if resource != Resource::Orders || !(patch.contains_key("status") || patch.contains_key("table_id")) {
        return Ok(Json(state.backend.update(resource, id, patch).await?));
    }

    // Status or table moves change occupancy on both the old and new table.
    let previous = state.backend.get(resource, id).await?;
    if let Some(table_id) = patch.get("table_id") {
        let table_id = table_id
            .as_str()
            .ok_or_else(|| BackendError::Validation("table_id must be a string".into()))?;
        ensure_table_exists(state, table_id).await?;
    }
    let updated = state.backend.update(resource, id, patch).await?;
    let table_ids: Vec<&str> = order_table_id(&previous).into_iter().chain(order_table_id(&updated)).collect();
    resync_tables(state.backend.as_ref(), table_ids).await?;
    Ok(Json(updated))
}

#[instrument(skip(state, staff), fields(staff_id = %staff.staff_id))]
pub async fn delete_record(
    state: &AppState,
    staff: &AuthenticatedStaff,
    resource: Resource,
    id: &str,
) -> ApiResult<StatusCode> {
    staff.ensure_can_write(resource)?;
    let table_id = match resource {
        Resource::Orders => order_table_id(&state.backend.get(resource, id).await?).map(str::to_string),
        _ => None,
    };
    state.backend.delete(resource, id).await?;
    resync_tables(state.backend.as_ref(), table_id.as_deref()).await?;
    info!("Deleted {resource} '{id}'");
    Ok(StatusCode::NO_CONTENT)
}

/// The status row the client reconciler polls.
pub async fn table_status(state: &AppState, table_id: &str) -> ApiResult<Json<StatusSnapshot>> {
    let table = state.backend.get(Resource::Tables, table_id).await?;
    let snapshot = snapshot_from_table(table_id, &table)
        .map_err(|e| ApiError::Backend(BackendError::Malformed(e.to_string())))?;
    Ok(Json(snapshot))
}

/// Sum of `quantity * unit_price` over order items.
fn items_total(items: &[Value]) -> f64 {
    items
        .iter()
        .map(|item| {
            let quantity = item.get("quantity").and_then(Value::as_f64).unwrap_or(1.0);
            let price = item.get("unit_price").and_then(Value::as_f64).unwrap_or(0.0);
            quantity * price
        })
        .sum()
}

async fn create_order(state: &AppState, mut record: Record) -> ApiResult<Record> {
    let table_id = record
        .get("table_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BackendError::Validation("table_id must be a string".into()))?;

    ensure_table_exists(state, &table_id).await?;

    record.insert("status".into(), json!(ORDER_OPEN));
    if !record.get("total").is_some_and(Value::is_number) {
        let total = record
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items_total(items))
            .unwrap_or_default();
        record.insert("total".into(), json!(total));
    }

    let order = state.backend.insert(Resource::Orders, record).await?;
    sync_table_occupancy(state.backend.as_ref(), &table_id).await?;
    Ok(order)
}

/// Orders may only reference existing tables.
async fn ensure_table_exists(state: &AppState, table_id: &str) -> ApiResult<()> {
    match state.backend.get(Resource::Tables, table_id).await {
        Ok(_) => Ok(()),
        Err(BackendError::NotFound { .. }) => {
            Err(BackendError::Validation(format!("unknown table '{table_id}'")).into())
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state, staff), fields(staff_id = %staff.staff_id))]
pub async fn close_order(state: &AppState, staff: &AuthenticatedStaff, order_id: &str) -> ApiResult<Json<Record>> {
    let order = state.backend.get(Resource::Orders, order_id).await?;
    if order.get("status").and_then(Value::as_str) == Some(ORDER_CLOSED) {
        return Err(BackendError::Conflict(format!("order '{order_id}' is already closed")).into());
    }

    let mut patch = Record::new();
    patch.insert("status".into(), json!(ORDER_CLOSED));
    patch.insert("closed_at".into(), now());
    let closed = state.backend.update(Resource::Orders, order_id, patch).await?;

    resync_tables(state.backend.as_ref(), order_table_id(&closed)).await?;
    info!(order_id, "Order closed");
    Ok(Json(closed))
}

#[instrument(skip(state, staff), fields(staff_id = %staff.staff_id))]
pub async fn check_out(state: &AppState, staff: &AuthenticatedStaff, check_in_id: &str) -> ApiResult<Json<Record>> {
    let check_in = state.backend.get(Resource::CheckIns, check_in_id).await?;
    if !matches!(check_in.get("checked_out_at"), None | Some(Value::Null)) {
        return Err(BackendError::Conflict(format!("check-in '{check_in_id}' is already checked out")).into());
    }
    let mut patch = Record::new();
    patch.insert("checked_out_at".into(), now());
    Ok(Json(state.backend.update(Resource::CheckIns, check_in_id, patch).await?))
}
