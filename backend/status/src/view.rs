//! The mounted table-status view.
//!
//! Mounting fetches once, then hands a refresh action to the scheduler.
//! Results are published on a `watch` channel until the view is disposed;
//! fetches that resolve after disposal are dropped.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use cafepos_core::{DisplayStatus, LocalOpenItems, RefreshAction, StatusSource};
use cafepos_scheduler::{InputEvent, RefreshConfig, RefreshHandle, RefreshScheduler, RefreshStatsSnapshot};

use crate::reconciler::StatusReconciler;

/// What the cashier screen renders for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub table_id: String,
    pub status: DisplayStatus,
    pub server_total: Option<f64>,
    pub local_open: usize,
    pub refreshed_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// Gatekeeper for published results; closed for good on dispose.
struct Publisher {
    disposed: Mutex<bool>,
    tx: watch::Sender<Option<TableView>>,
}

impl Publisher {
    fn publish(&self, view: TableView) -> bool {
        let disposed = self.disposed.lock().unwrap_or_else(PoisonError::into_inner);
        if *disposed {
            debug!(table_id = %view.table_id, "view disposed; dropping late result");
            return false;
        }
        self.tx.send_replace(Some(view));
        true
    }

    fn close(&self) -> bool {
        let mut disposed = self.disposed.lock().unwrap_or_else(PoisonError::into_inner);
        !std::mem::replace(&mut *disposed, true)
    }

    fn is_closed(&self) -> bool {
        *self.disposed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct ViewRefresh {
    table_id: String,
    reconciler: StatusReconciler,
    local: Arc<dyn LocalOpenItems>,
    publisher: Arc<Publisher>,
}

#[async_trait]
impl RefreshAction for ViewRefresh {
    async fn refresh(&self) -> Result<()> {
        let local = self.local.open_items_for(&self.table_id);
        let rec = self.reconciler.reconcile(&self.table_id, &local).await;
        // Fetch failures already degrade to Unknown; nothing to propagate.
        self.publisher.publish(TableView {
            table_id: self.table_id.clone(),
            status: rec.status,
            server_total: rec.snapshot.and_then(|s| s.associated_total),
            local_open: rec.local_open,
            refreshed_at: Utc::now(),
            error: rec.error,
        });
        Ok(())
    }
}

pub struct TableStatusView {
    table_id: String,
    scheduler: RefreshScheduler,
    publisher: Arc<Publisher>,
    rx: watch::Receiver<Option<TableView>>,
}

impl TableStatusView {
    /// Fetch the initial status, then start periodic refresh.
    pub async fn mount(
        table_id: impl Into<String>,
        source: Arc<dyn StatusSource>,
        local: Arc<dyn LocalOpenItems>,
        config: RefreshConfig,
    ) -> Self {
        let table_id = table_id.into();
        let (tx, rx) = watch::channel(None);
        let publisher = Arc::new(Publisher {
            disposed: Mutex::new(false),
            tx,
        });
        let action = Arc::new(ViewRefresh {
            table_id: table_id.clone(),
            reconciler: StatusReconciler::new(source),
            local,
            publisher: Arc::clone(&publisher),
        });

        let mut scheduler = RefreshScheduler::new(config, action);
        scheduler.manual_refresh().await;
        scheduler.start();
        info!(table_id = %table_id, "table status view mounted");

        Self {
            table_id,
            scheduler,
            publisher,
            rx,
        }
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// Latest published view, if any.
    pub fn current(&self) -> Option<TableView> {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TableView>> {
        self.rx.clone()
    }

    pub fn refresher(&self) -> RefreshHandle {
        self.scheduler.handle()
    }

    pub async fn refresh(&self) {
        self.scheduler.manual_refresh().await;
    }

    pub async fn force_refresh(&self) {
        self.scheduler.force_refresh().await;
    }

    pub fn record_activity(&self) {
        self.scheduler.tracker().record_activity();
    }

    pub fn is_user_active(&self) -> bool {
        self.scheduler.tracker().is_active()
    }

    pub fn attach_input(&mut self, events: mpsc::Receiver<InputEvent>) {
        self.scheduler.attach_input(events);
    }

    pub fn reconfigure(&mut self, config: RefreshConfig) {
        self.scheduler.reconfigure(config);
    }

    pub fn stats(&self) -> RefreshStatsSnapshot {
        self.scheduler.stats()
    }

    pub fn is_disposed(&self) -> bool {
        self.publisher.is_closed()
    }

    /// Stop refreshing and close the view. In-flight fetches may still
    /// resolve but their results are discarded. Idempotent.
    pub fn dispose(&mut self) {
        self.scheduler.stop();
        if self.publisher.close() {
            info!(table_id = %self.table_id, "table status view disposed");
        }
    }
}

impl Drop for TableStatusView {
    fn drop(&mut self) {
        self.dispose();
    }
}
