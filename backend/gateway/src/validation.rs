//! Create/update checks applied before rows reach the backend.

use serde_json::Value;

use cafepos_core::{BackendError, Record, Resource};

/// Fields every new row of `resource` must carry.
pub fn required_fields(resource: Resource) -> &'static [&'static str] {
    match resource {
        Resource::Categories => &["name"],
        Resource::CheckIns => &["staff_id"],
        Resource::Orders => &["table_id", "items"],
        Resource::Products => &["name", "price", "category_id"],
        Resource::Staff => &["name", "role"],
        Resource::Settings => &["key", "value"],
        Resource::MenuPromos => &["title"],
        Resource::Tables => &["name"],
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

pub fn validate_create(resource: Resource, record: &Record) -> Result<(), BackendError> {
    let missing: Vec<&str> = required_fields(resource)
        .iter()
        .copied()
        .filter(|field| is_blank(record.get(*field)))
        .collect();
    if !missing.is_empty() {
        return Err(BackendError::Validation(format!(
            "{resource} requires: {}",
            missing.join(", ")
        )));
    }
    validate_fields(resource, record)
}

/// Checks a PATCH body. `id` may only repeat the path id.
pub fn validate_patch(resource: Resource, id: &str, patch: &Record) -> Result<(), BackendError> {
    match patch.get("id") {
        None => {}
        Some(Value::String(s)) if s == id => {}
        Some(_) => return Err(BackendError::Validation("id is immutable".into())),
    }
    for field in required_fields(resource) {
        if patch.contains_key(*field) && is_blank(patch.get(*field)) {
            return Err(BackendError::Validation(format!("{field} cannot be blank")));
        }
    }
    validate_fields(resource, patch)
}

fn validate_fields(resource: Resource, record: &Record) -> Result<(), BackendError> {
    match resource {
        Resource::Products => {
            if let Some(price) = record.get("price") {
                match price.as_f64() {
                    Some(p) if p >= 0.0 => {}
                    Some(_) => return Err(BackendError::Validation("price must be >= 0".into())),
                    None => return Err(BackendError::Validation("price must be a number".into())),
                }
            }
        }
        Resource::Orders => {
            if let Some(items) = record.get("items") {
                match items.as_array() {
                    Some(items) if !items.is_empty() => {}
                    _ => return Err(BackendError::Validation("items must be a non-empty array".into())),
                }
            }
        }
        _ => {}
    }
    Ok(())
}
