//! Table status reconciliation.
//!
//! The server's availability flag can lag behind orders this client already
//! knows are open, so local knowledge may downgrade availability but never
//! upgrade it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use cafepos_core::{DisplayStatus, OpenItem, StatusLabel, StatusSnapshot, StatusSource};

/// `server_available && no locally known open items`.
pub fn effective_available(snapshot: &StatusSnapshot, local_open: &[OpenItem]) -> bool {
    snapshot.server_available && local_open.is_empty()
}

/// Map a fresh snapshot plus local open items to a display state.
///
/// Priority: Available, then Outstanding (unpaid beats plain occupancy),
/// then Occupied.
pub fn classify(snapshot: &StatusSnapshot, local_open: &[OpenItem]) -> DisplayStatus {
    if effective_available(snapshot, local_open) {
        DisplayStatus::Available
    } else if snapshot.status_label == StatusLabel::Outstanding {
        DisplayStatus::Outstanding
    } else {
        DisplayStatus::Occupied
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub status: DisplayStatus,
    /// The snapshot this pass was computed from; `None` when the fetch failed.
    pub snapshot: Option<StatusSnapshot>,
    pub local_open: usize,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct StatusReconciler {
    source: Arc<dyn StatusSource>,
}

impl StatusReconciler {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self { source }
    }

    /// Fetch a fresh snapshot and classify it. A failed fetch yields
    /// `Unknown`; no earlier snapshot is reused.
    pub async fn reconcile(&self, entity_id: &str, local_open: &[OpenItem]) -> Reconciliation {
        match self.source.fetch_snapshot(entity_id).await {
            Ok(snapshot) => {
                let status = classify(&snapshot, local_open);
                debug!(
                    entity_id,
                    server_available = snapshot.server_available,
                    label = snapshot.status_label.as_str(),
                    local_open = local_open.len(),
                    %status,
                    "reconciled status"
                );
                Reconciliation {
                    status,
                    snapshot: Some(snapshot),
                    local_open: local_open.len(),
                    error: None,
                }
            }
            Err(e) => {
                warn!(entity_id, error = %e, "status fetch failed; showing unknown");
                Reconciliation {
                    status: DisplayStatus::Unknown,
                    snapshot: None,
                    local_open: local_open.len(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn display_status(&self, entity_id: &str, local_open: &[OpenItem]) -> DisplayStatus {
        self.reconcile(entity_id, local_open).await.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cafepos_core::FetchError;
    use chrono::Utc;

    fn snapshot(available: bool, label: StatusLabel) -> StatusSnapshot {
        StatusSnapshot {
            entity_id: "7".into(),
            server_available: available,
            status_label: label,
            associated_total: None,
        }
    }

    fn open_items(n: usize) -> Vec<OpenItem> {
        (0..n)
            .map(|i| OpenItem {
                order_id: format!("order_{}", 42 + i),
                table_id: "7".into(),
                total: 9.0,
                opened_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn effective_availability_truth_table() {
        for available in [true, false] {
            for n in [0, 1, 5] {
                let snap = snapshot(available, StatusLabel::Available);
                assert_eq!(
                    effective_available(&snap, &open_items(n)),
                    available && n == 0,
                    "available={available} local={n}"
                );
            }
        }
    }

    #[test]
    fn local_open_order_downgrades_available_table() {
        let snap = snapshot(true, StatusLabel::Available);
        assert_eq!(classify(&snap, &open_items(1)), DisplayStatus::Occupied);
        assert_eq!(classify(&snap, &[]), DisplayStatus::Available);
    }

    #[test]
    fn outstanding_wins_regardless_of_local_items() {
        let snap = snapshot(false, StatusLabel::Outstanding);
        for n in [0, 1, 3] {
            assert_eq!(classify(&snap, &open_items(n)), DisplayStatus::Outstanding);
        }
    }

    #[test]
    fn outstanding_label_with_local_override() {
        // Server says available but unpaid; a local order makes it unavailable.
        let snap = snapshot(true, StatusLabel::Outstanding);
        assert_eq!(classify(&snap, &open_items(1)), DisplayStatus::Outstanding);
        assert_eq!(classify(&snap, &[]), DisplayStatus::Available);
    }

    #[test]
    fn unavailable_without_outstanding_is_occupied() {
        for label in [StatusLabel::Occupied, StatusLabel::Available, StatusLabel::Unknown] {
            assert_eq!(classify(&snapshot(false, label), &[]), DisplayStatus::Occupied);
        }
    }

    struct Failing;

    #[async_trait]
    impl StatusSource for Failing {
        async fn fetch_snapshot(&self, _entity_id: &str) -> Result<StatusSnapshot, FetchError> {
            Err(FetchError::Unreachable("connection refused".into()))
        }
    }

    struct Fixed(StatusSnapshot);

    #[async_trait]
    impl StatusSource for Fixed {
        async fn fetch_snapshot(&self, _entity_id: &str) -> Result<StatusSnapshot, FetchError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn fetch_error_is_unknown() {
        let reconciler = StatusReconciler::new(Arc::new(Failing));
        let rec = reconciler.reconcile("7", &open_items(1)).await;
        assert_eq!(rec.status, DisplayStatus::Unknown);
        assert!(rec.snapshot.is_none());
        assert!(rec.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn display_status_uses_fresh_snapshot() {
        let reconciler = StatusReconciler::new(Arc::new(Fixed(snapshot(true, StatusLabel::Available))));
        assert_eq!(reconciler.display_status("7", &open_items(1)).await, DisplayStatus::Occupied);
        assert_eq!(reconciler.display_status("7", &[]).await, DisplayStatus::Available);
    }
}
