//! Status sources: the gateway's HTTP route, or a backend read in-process.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use cafepos_core::{
    Backend, BackendError, Credential, FetchError, Record, Resource, StatusLabel, StatusSnapshot,
    StatusSource,
};

/// Build the status row for a table record.
///
/// Expects `is_available` (bool); `status` and `current_total` are optional.
pub fn snapshot_from_table(table_id: &str, record: &Record) -> Result<StatusSnapshot, FetchError> {
    let server_available = record
        .get("is_available")
        .and_then(Value::as_bool)
        .ok_or_else(|| FetchError::Malformed(format!("table '{table_id}' has no boolean is_available")))?;

    let status_label = record
        .get("status")
        .and_then(Value::as_str)
        .map(StatusLabel::parse)
        .unwrap_or(StatusLabel::Unknown);

    let associated_total = match record.get("current_total") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_f64().ok_or_else(|| {
            FetchError::Malformed(format!("table '{table_id}' has non-numeric current_total"))
        })?),
    };

    Ok(StatusSnapshot {
        entity_id: table_id.to_string(),
        server_available,
        status_label,
        associated_total,
    })
}

/// Reads table rows straight from a [`Backend`].
pub struct BackendStatusSource {
    backend: Arc<dyn Backend>,
}

impl BackendStatusSource {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl StatusSource for BackendStatusSource {
    async fn fetch_snapshot(&self, entity_id: &str) -> Result<StatusSnapshot, FetchError> {
        let record = self
            .backend
            .get(Resource::Tables, entity_id)
            .await
            .map_err(|e| match e {
                BackendError::NotFound { .. } => FetchError::NotFound(entity_id.to_string()),
                BackendError::Malformed(m) => FetchError::Malformed(m),
                other => FetchError::Unreachable(other.to_string()),
            })?;
        snapshot_from_table(entity_id, &record)
    }
}

/// Fetches `GET {base_url}/api/tables/{id}/status` from a running gateway.
pub struct HttpStatusSource {
    client: reqwest::Client,
    base_url: String,
    credential: Option<Credential>,
}

impl HttpStatusSource {
    pub fn new(base_url: impl Into<String>, credential: Option<Credential>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        }
    }

    fn status_url(&self, entity_id: &str) -> String {
        format!("{}/api/tables/{}/status", self.base_url, entity_id)
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch_snapshot(&self, entity_id: &str) -> Result<StatusSnapshot, FetchError> {
        let url = self.status_url(entity_id);
        let mut request = self.client.get(&url);
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential.token());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound(entity_id.to_string())),
            s => return Err(FetchError::Unreachable(format!("{url} returned {s}"))),
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        let snapshot: StatusSnapshot =
            serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        if snapshot.entity_id != entity_id {
            return Err(FetchError::Malformed(format!(
                "asked for '{entity_id}', got row for '{}'",
                snapshot.entity_id
            )));
        }
        debug!(entity_id, "fetched status snapshot");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn table_row_maps_to_snapshot() {
        let r = record(json!({
            "id": "7",
            "is_available": false,
            "status": "outstanding",
            "current_total": 23.75
        }));
        let snap = snapshot_from_table("7", &r).unwrap();
        assert!(!snap.server_available);
        assert_eq!(snap.status_label, StatusLabel::Outstanding);
        assert_eq!(snap.associated_total, Some(23.75));
    }

    #[test]
    fn missing_flag_is_malformed() {
        let r = record(json!({ "id": "7", "status": "available" }));
        assert!(matches!(snapshot_from_table("7", &r), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn bad_total_is_malformed() {
        let r = record(json!({ "id": "7", "is_available": true, "current_total": "lots" }));
        assert!(matches!(snapshot_from_table("7", &r), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn status_url_trims_trailing_slash() {
        let source = HttpStatusSource::new("http://localhost:8080/", None);
        assert_eq!(source.status_url("t1"), "http://localhost:8080/api/tables/t1/status");
    }

    #[tokio::test]
    async fn unreachable_gateway_is_fetch_error() {
        // Port 9 (discard) is closed on test hosts.
        let source = HttpStatusSource::new("http://127.0.0.1:9", None);
        assert!(matches!(
            source.fetch_snapshot("t1").await,
            Err(FetchError::Unreachable(_))
        ));
    }
}
