//! Client-side status machinery for the cashier screens.
//!
//! - [`reconciler`]: merges server table status with locally known open orders
//! - [`view`]: a mounted, auto-refreshing table status view
//! - [`source`]: HTTP and in-process status sources
//! - [`context`]: explicit per-session state (cart, open orders, settings)
//! - [`occupancy`]: table availability derived from open orders

pub mod context;
pub mod occupancy;
pub mod reconciler;
pub mod source;
pub mod view;

pub use context::{OpenOrderBook, SessionContext, SettingsContext};
pub use occupancy::{order_table_id, resync_tables, sync_table_occupancy};
pub use reconciler::{classify, effective_available, Reconciliation, StatusReconciler};
pub use source::{snapshot_from_table, BackendStatusSource, HttpStatusSource};
pub use view::{TableStatusView, TableView};
