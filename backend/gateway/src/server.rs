//! Main HTTP Gateway Server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

use cafepos_config::AuthConfig;
use cafepos_core::{Backend, Resource};

use crate::auth::{Authenticator, RequireAuth};
use crate::handlers;

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub authenticator: Arc<Authenticator>,
    pub cookie_names: Arc<[String]>,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, authenticator: Authenticator, cookie_names: Vec<String>) -> Self {
        Self {
            backend,
            authenticator: Arc::new(authenticator),
            cookie_names: cookie_names.into(),
        }
    }

    pub fn from_auth_config(backend: Arc<dyn Backend>, auth: &AuthConfig) -> Self {
        Self::new(
            backend,
            Authenticator::from_entries(&auth.tokens),
            auth.cookie_names.clone(),
        )
    }
}

/// CRUD routes for one resource, plus its resource-specific actions.
fn resource_router(resource: Resource) -> Router<AppState> {
    let router = Router::new()
        .route(
            "/",
            get(
                move |_auth: RequireAuth,
                      State(state): State<AppState>,
                      Query(query): Query<HashMap<String, String>>| async move {
                    handlers::list_records(&state, resource, handlers::filter_from_query(query)).await
                },
            )
            .post(
                move |RequireAuth(staff): RequireAuth,
                      State(state): State<AppState>,
                      Json(body): Json<Value>| async move {
                    handlers::create_record(&state, &staff, resource, body).await
                },
            ),
        )
        .route(
            "/:id",
            get(
                move |_auth: RequireAuth, State(state): State<AppState>, Path(id): Path<String>| async move {
                    handlers::get_record(&state, resource, &id).await
                },
            )
            .patch(
                move |RequireAuth(staff): RequireAuth,
                      State(state): State<AppState>,
                      Path(id): Path<String>,
                      Json(body): Json<Value>| async move {
                    handlers::update_record(&state, &staff, resource, &id, body).await
                },
            )
            .delete(
                move |RequireAuth(staff): RequireAuth,
                      State(state): State<AppState>,
                      Path(id): Path<String>| async move {
                    handlers::delete_record(&state, &staff, resource, &id).await
                },
            ),
        );

    match resource {
        Resource::Tables => router.route(
            "/:id/status",
            get(
                |_auth: RequireAuth, State(state): State<AppState>, Path(id): Path<String>| async move {
                    handlers::table_status(&state, &id).await
                },
            ),
        ),
        Resource::Orders => router.route(
            "/:id/close",
            post(
                |RequireAuth(staff): RequireAuth, State(state): State<AppState>, Path(id): Path<String>| async move {
                    handlers::close_order(&state, &staff, &id).await
                },
            ),
        ),
        Resource::CheckIns => router.route(
            "/:id/check-out",
            post(
                |RequireAuth(staff): RequireAuth, State(state): State<AppState>, Path(id): Path<String>| async move {
                    handlers::check_out(&state, &staff, &id).await
                },
            ),
        ),
        _ => router,
    }
}

/// Build the Axum router with all API routes.
pub fn build_router(state: AppState) -> Router {
    let mut api = Router::new().route(
        "/health",
        get(|State(state): State<AppState>| async move { handlers::health(&state).await }),
    );
    for resource in Resource::ALL {
        api = api.nest(&format!("/{}", resource.route()), resource_router(resource));
    }
    Router::new().nest("/api", api).with_state(state)
}

/// Starts the HTTP server and runs until Ctrl-C.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: AppState, cors: bool) -> Result<()> {
    let backend = state.backend.name().to_string();
    let mut app = build_router(state).layer(TraceLayer::new_for_http());
    if cors {
        app = app.layer(CorsLayer::permissive());
    }

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%backend, "Gateway HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Gateway server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use cafepos_config::TokenEntry;

    #[test]
    fn state_from_auth_config() {
        let auth = AuthConfig {
            cookie_names: vec!["sid".into()],
            tokens: vec![TokenEntry {
                token: "t".into(),
                staff_id: "s1".into(),
                role: "admin".into(),
            }],
        };
        let state = AppState::from_auth_config(Arc::new(MemoryBackend::new()), &auth);
        assert_eq!(state.authenticator.len(), 1);
        assert_eq!(&*state.cookie_names, ["sid".to_string()]);
    }

    #[test]
    fn router_builds_for_every_resource() {
        let state = AppState::new(Arc::new(MemoryBackend::new()), Authenticator::default(), Vec::new());
        let _router = build_router(state);
    }
}
