//! Resources proxied to the hosted relational backend.
//!
//! Records travel as loose JSON objects; the backend owns their schema and
//! the gateway applies only light validation on top.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single row as exchanged with the backend.
pub type Record = Map<String, Value>;

/// Equality filters (`column = value`) applied to list queries, in order.
pub type Filter = Vec<(String, String)>;

/// Order lifecycle values stored in `orders.status`.
pub const ORDER_OPEN: &str = "open";
pub const ORDER_CLOSED: &str = "closed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Categories,
    CheckIns,
    Orders,
    Products,
    Staff,
    Settings,
    MenuPromos,
    Tables,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::Categories,
        Resource::CheckIns,
        Resource::Orders,
        Resource::Products,
        Resource::Staff,
        Resource::Settings,
        Resource::MenuPromos,
        Resource::Tables,
    ];

    /// Table name in the hosted backend.
    pub fn table(&self) -> &'static str {
        match self {
            Resource::Categories => "categories",
            Resource::CheckIns => "check_ins",
            Resource::Orders => "orders",
            Resource::Products => "products",
            Resource::Staff => "staff",
            Resource::Settings => "settings",
            Resource::MenuPromos => "menu_promos",
            Resource::Tables => "tables",
        }
    }

    /// Path segment under `/api`.
    pub fn route(&self) -> &'static str {
        match self {
            Resource::Categories => "categories",
            Resource::CheckIns => "check-ins",
            Resource::Orders => "orders",
            Resource::Products => "products",
            Resource::Staff => "staff",
            Resource::Settings => "settings",
            Resource::MenuPromos => "menu-promos",
            Resource::Tables => "tables",
        }
    }

    /// Whether writes to this resource are restricted to admins.
    pub fn admin_only(&self) -> bool {
        matches!(self, Resource::Staff | Resource::Settings)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// The string `id` of a record, if present.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// True when every filter pair matches the record.
///
/// Non-string columns are compared through their JSON rendering, so
/// `is_available=true` matches a boolean column.
pub fn matches_filter(record: &Record, filter: &Filter) -> bool {
    filter.iter().all(|(column, expected)| match record.get(column) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn routes_and_tables_are_unique() {
        let mut routes: Vec<_> = Resource::ALL.iter().map(Resource::route).collect();
        let mut tables: Vec<_> = Resource::ALL.iter().map(Resource::table).collect();
        routes.sort();
        routes.dedup();
        tables.sort();
        tables.dedup();
        assert_eq!(routes.len(), Resource::ALL.len());
        assert_eq!(tables.len(), Resource::ALL.len());
    }

    #[test]
    fn filter_matches_strings_and_scalars() {
        let r = record(json!({ "id": "t1", "status": "open", "is_available": false, "seats": 4 }));
        assert!(matches_filter(&r, &vec![("status".into(), "open".into())]));
        assert!(matches_filter(&r, &vec![("is_available".into(), "false".into())]));
        assert!(matches_filter(&r, &vec![("seats".into(), "4".into())]));
        assert!(!matches_filter(&r, &vec![("status".into(), "closed".into())]));
        assert!(!matches_filter(&r, &vec![("missing".into(), "x".into())]));
        assert!(matches_filter(&r, &Vec::new()));
    }

    #[test]
    fn record_id_requires_string() {
        assert_eq!(record_id(&record(json!({ "id": "abc" }))), Some("abc"));
        assert_eq!(record_id(&record(json!({ "id": 7 }))), None);
    }
}
