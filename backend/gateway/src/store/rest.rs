//! PostgREST-style client for the hosted relational service.
//!
//! Rows live at `{url}/rest/v1/{table}`; single rows are addressed with
//! `?id=eq.{id}` and writes ask for `Prefer: return=representation` so the
//! stored row comes back in the response.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use cafepos_core::{Backend, BackendError, Filter, Record, Resource};
use cafepos_logging::redact_sensitive_data;

const PREFER_REPRESENTATION: &str = "return=representation";

pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn table_url(&self, resource: Resource) -> String {
        format!("{}/rest/v1/{}", self.base_url, resource.table())
    }

    /// Single-row URL: `{table_url}?id=eq.{id}`.
    pub fn row_url(&self, resource: Resource, id: &str) -> String {
        format!("{}?id=eq.{}", self.table_url(resource), urlencoding::encode(id))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(redact_sensitive_data(&e.to_string())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let body = redact_sensitive_data(&body);
        warn!(%status, body = %body, "Backend request failed");
        Err(match status {
            StatusCode::NOT_FOUND => BackendError::Unavailable(format!("endpoint not found: {body}")),
            StatusCode::CONFLICT => BackendError::Conflict(body),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => BackendError::Validation(body),
            other => BackendError::Unavailable(format!("HTTP {other}: {body}")),
        })
    }

    async fn rows(response: Response) -> Result<Vec<Record>, BackendError> {
        response
            .json::<Vec<Record>>()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }

    async fn single(resource: Resource, id: &str, response: Response) -> Result<Record, BackendError> {
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(resource, id))
    }
}

/// PostgREST equality filters: `column=eq.value`.
pub fn filter_query(filter: &Filter) -> Vec<(String, String)> {
    filter
        .iter()
        .map(|(column, value)| (column.clone(), format!("eq.{value}")))
        .collect()
}

#[async_trait]
impl Backend for RestBackend {
    fn name(&self) -> &str {
        "rest"
    }

    async fn list(&self, resource: Resource, filter: &Filter) -> Result<Vec<Record>, BackendError> {
        debug!(%resource, filters = filter.len(), "Listing rows");
        let request = self
            .client
            .get(self.table_url(resource))
            .query(&filter_query(filter));
        Self::rows(self.send(request).await?).await
    }

    async fn get(&self, resource: Resource, id: &str) -> Result<Record, BackendError> {
        let response = self.send(self.client.get(self.row_url(resource, id))).await?;
        Self::single(resource, id, response).await
    }

    async fn insert(&self, resource: Resource, record: Record) -> Result<Record, BackendError> {
        let request = self
            .client
            .post(self.table_url(resource))
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&record);
        let response = self.send(request).await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Malformed(format!("insert into {resource} returned no row")))
    }

    async fn update(&self, resource: Resource, id: &str, mut patch: Record) -> Result<Record, BackendError> {
        patch.remove("id");
        let request = self
            .client
            .patch(self.row_url(resource, id))
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&patch);
        let response = self.send(request).await?;
        Self::single(resource, id, response).await
    }

    async fn delete(&self, resource: Resource, id: &str) -> Result<(), BackendError> {
        let request = self
            .client
            .delete(self.row_url(resource, id))
            .header("Prefer", PREFER_REPRESENTATION);
        let response = self.send(request).await?;
        Self::single(resource, id, response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_use_backend_table_names() {
        let backend = RestBackend::new("https://pos.example.co/", None);
        assert_eq!(
            backend.table_url(Resource::CheckIns),
            "https://pos.example.co/rest/v1/check_ins"
        );
        assert_eq!(
            backend.row_url(Resource::MenuPromos, "a b"),
            "https://pos.example.co/rest/v1/menu_promos?id=eq.a%20b"
        );
    }

    #[test]
    fn filters_become_eq_operators() {
        let filter = vec![
            ("table_id".to_string(), "t1".to_string()),
            ("status".to_string(), "open".to_string()),
        ];
        assert_eq!(
            filter_query(&filter),
            vec![
                ("table_id".to_string(), "eq.t1".to_string()),
                ("status".to_string(), "eq.open".to_string()),
            ]
        );
    }

    #[test]
    fn empty_api_key_is_dropped() {
        let backend = RestBackend::new("http://localhost:3000", Some(String::new()));
        assert!(backend.api_key.is_none());
        assert_eq!(backend.name(), "rest");
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let backend = RestBackend::new("http://127.0.0.1:9", Some("sk-test".into()));
        let err = backend.get(Resource::Tables, "t1").await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }
}
