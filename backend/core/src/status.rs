//! Table status snapshots and the display states derived from them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-reported status label. Unrecognised labels read as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum StatusLabel {
    Available,
    Occupied,
    Outstanding,
    Unknown,
}

impl From<String> for StatusLabel {
    fn from(raw: String) -> Self {
        StatusLabel::parse(&raw)
    }
}

impl StatusLabel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" => StatusLabel::Available,
            "occupied" => StatusLabel::Occupied,
            "outstanding" => StatusLabel::Outstanding,
            _ => StatusLabel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Available => "available",
            StatusLabel::Occupied => "occupied",
            StatusLabel::Outstanding => "outstanding",
            StatusLabel::Unknown => "unknown",
        }
    }
}

/// One full read of an entity's server-side status.
///
/// Wire shape: `{entityId, availabilityFlag, statusLabel, associatedTotal}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(rename = "entityId")]
    pub entity_id: String,
    #[serde(rename = "availabilityFlag")]
    pub server_available: bool,
    #[serde(rename = "statusLabel")]
    pub status_label: StatusLabel,
    #[serde(rename = "associatedTotal", default)]
    pub associated_total: Option<f64>,
}

/// What the cashier UI shows for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Available,
    Occupied,
    Outstanding,
    Unknown,
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisplayStatus::Available => "Available",
            DisplayStatus::Occupied => "Occupied",
            DisplayStatus::Outstanding => "Outstanding",
            DisplayStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A locally known open order for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenItem {
    pub order_id: String,
    pub table_id: String,
    pub total: f64,
    pub opened_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_parses_wire_row() {
        let row = json!({
            "entityId": "7",
            "availabilityFlag": true,
            "statusLabel": "Outstanding",
            "associatedTotal": 12.5
        });
        let snap: StatusSnapshot = serde_json::from_value(row).unwrap();
        assert_eq!(snap.entity_id, "7");
        assert!(snap.server_available);
        assert_eq!(snap.status_label, StatusLabel::Outstanding);
        assert_eq!(snap.associated_total, Some(12.5));
    }

    #[test]
    fn unknown_label_and_null_total() {
        let row = json!({
            "entityId": "3",
            "availabilityFlag": false,
            "statusLabel": "cleaning",
            "associatedTotal": null
        });
        let snap: StatusSnapshot = serde_json::from_value(row).unwrap();
        assert_eq!(snap.status_label, StatusLabel::Unknown);
        assert_eq!(snap.associated_total, None);
    }

    #[test]
    fn missing_flag_is_rejected() {
        let row = json!({ "entityId": "3", "statusLabel": "available" });
        assert!(serde_json::from_value::<StatusSnapshot>(row).is_err());
    }

    #[test]
    fn label_serializes_lowercase() {
        assert_eq!(serde_json::to_value(StatusLabel::Occupied).unwrap(), json!("occupied"));
    }
}
