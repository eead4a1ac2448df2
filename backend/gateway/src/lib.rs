//! CafePOS Gateway HTTP API Server
//!
//! JSON CRUD over the hosted backend, the table status route polled by the
//! cashier screens, and bearer-credential authentication.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod store;
pub mod validation;

pub use auth::{extract_bearer_credential, AuthenticatedStaff, Authenticator, RequireAuth};
pub use error::ApiError;
pub use server::{build_router, start_server, AppState};
pub use store::{MemoryBackend, RestBackend};
