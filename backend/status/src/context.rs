//! Per-session client state: cart, known open orders, settings, credential.
//!
//! A `SessionContext` is built explicitly when a cashier session starts and
//! passed to whatever needs it; `dispose` tears it down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::occupancy::{order_table_id, resync_tables};

use cafepos_core::{
    record_id, Backend, BackendError, Cart, Credential, LocalOpenItems, OpenItem, Record, Resource,
    ORDER_CLOSED, ORDER_OPEN,
};

/// Locally known open orders, keyed by table.
#[derive(Default)]
pub struct OpenOrderBook {
    by_table: RwLock<HashMap<String, Vec<OpenItem>>>,
}

impl OpenOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, item: OpenItem) {
        let mut book = self.by_table.write().unwrap_or_else(PoisonError::into_inner);
        let items = book.entry(item.table_id.clone()).or_default();
        items.retain(|existing| existing.order_id != item.order_id);
        items.push(item);
    }

    /// Forget an order. Returns false if it was not known.
    pub fn close(&self, order_id: &str) -> bool {
        let mut book = self.by_table.write().unwrap_or_else(PoisonError::into_inner);
        let mut found = false;
        for items in book.values_mut() {
            let before = items.len();
            items.retain(|item| item.order_id != order_id);
            found |= items.len() != before;
        }
        book.retain(|_, items| !items.is_empty());
        found
    }

    pub fn len(&self) -> usize {
        self.by_table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.by_table.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Replace the book with the backend's open orders. Rows missing
    /// `id` or `table_id` are skipped.
    pub async fn load_from(&self, backend: &dyn Backend) -> Result<usize, BackendError> {
        let rows = backend
            .list(Resource::Orders, &vec![("status".to_string(), ORDER_OPEN.to_string())])
            .await?;
        let items: Vec<OpenItem> = rows.iter().filter_map(open_item_from_order).collect();
        let mut book = self.by_table.write().unwrap_or_else(PoisonError::into_inner);
        book.clear();
        for item in &items {
            book.entry(item.table_id.clone()).or_default().push(item.clone());
        }
        Ok(items.len())
    }
}

impl LocalOpenItems for OpenOrderBook {
    fn open_items_for(&self, entity_id: &str) -> Vec<OpenItem> {
        self.by_table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Read an order row into an [`OpenItem`].
pub fn open_item_from_order(record: &Record) -> Option<OpenItem> {
    let order_id = record_id(record)?.to_string();
    let table_id = record.get("table_id").and_then(Value::as_str)?.to_string();
    let total = record.get("total").and_then(Value::as_f64).unwrap_or(0.0);
    let opened_at = record
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Some(OpenItem {
        order_id,
        table_id,
        total,
        opened_at,
    })
}

/// Café settings as stored in the `settings` resource (`key`/`value` rows).
#[derive(Debug, Clone, Default)]
pub struct SettingsContext {
    values: HashMap<String, Value>,
}

impl SettingsContext {
    pub fn from_rows(rows: &[Record]) -> Self {
        let values = rows
            .iter()
            .filter_map(|row| {
                let key = row.get("key").and_then(Value::as_str)?;
                Some((key.to_string(), row.get("value").cloned().unwrap_or(Value::Null)))
            })
            .collect();
        Self { values }
    }

    pub async fn load(backend: &dyn Backend) -> Result<Self, BackendError> {
        let rows = backend.list(Resource::Settings, &Vec::new()).await?;
        Ok(Self::from_rows(&rows))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Numeric setting; numeric strings are accepted too.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.values.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn cafe_name(&self) -> &str {
        self.get_str("cafe_name").unwrap_or("Café")
    }

    /// Override for the table refresh interval, if configured.
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.get_u64("refresh_interval_ms")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub struct SessionContext {
    backend: Arc<dyn Backend>,
    credential: Option<Credential>,
    cart: Mutex<Cart>,
    open_orders: Arc<OpenOrderBook>,
    settings: RwLock<SettingsContext>,
    disposed: AtomicBool,
}

impl SessionContext {
    /// Load settings and open orders, returning a ready context.
    pub async fn init(
        backend: Arc<dyn Backend>,
        credential: Option<Credential>,
    ) -> Result<Self, BackendError> {
        let settings = SettingsContext::load(backend.as_ref()).await?;
        let open_orders = Arc::new(OpenOrderBook::new());
        let loaded = open_orders.load_from(backend.as_ref()).await?;
        info!(
            backend = backend.name(),
            settings = settings.len(),
            open_orders = loaded,
            "session context initialised"
        );
        Ok(Self {
            backend,
            credential,
            cart: Mutex::new(Cart::new()),
            open_orders,
            settings: RwLock::new(settings),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Shared handle for status views on this session.
    pub fn open_orders(&self) -> Arc<OpenOrderBook> {
        Arc::clone(&self.open_orders)
    }

    pub fn settings(&self) -> SettingsContext {
        self.settings.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub async fn reload_settings(&self) -> Result<(), BackendError> {
        self.ensure_live()?;
        let fresh = SettingsContext::load(self.backend.as_ref()).await?;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(())
    }

    /// Run `f` against the cart.
    pub fn with_cart<R>(&self, f: impl FnOnce(&mut Cart) -> R) -> R {
        let mut cart = self.cart.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cart)
    }

    /// Submit the cart as an order for `table_id`. On success the order is
    /// recorded as locally open and the cart is emptied.
    pub async fn submit_cart(&self, table_id: &str) -> Result<Record, BackendError> {
        self.ensure_live()?;
        let payload = self.with_cart(|cart| {
            if cart.is_empty() {
                None
            } else {
                Some(cart.to_order_payload(table_id))
            }
        });
        let Some(Value::Object(mut record)) = payload else {
            return Err(BackendError::Validation("cart is empty".into()));
        };
        record.insert("status".into(), Value::String(ORDER_OPEN.into()));

        let stored = self.backend.insert(Resource::Orders, record).await?;
        resync_tables(self.backend.as_ref(), [table_id]).await?;
        match open_item_from_order(&stored) {
            Some(item) => self.open_orders.open(item),
            None => warn!(table_id, "stored order lacks id/table_id; not tracked locally"),
        }
        self.with_cart(Cart::clear);
        debug!(table_id, "cart submitted");
        Ok(stored)
    }

    /// Mark an order closed in the backend and forget it locally.
    pub async fn close_order(&self, order_id: &str) -> Result<Record, BackendError> {
        self.ensure_live()?;
        let mut patch = Map::new();
        patch.insert("status".into(), Value::String(ORDER_CLOSED.into()));
        let stored = self.backend.update(Resource::Orders, order_id, patch).await?;
        self.open_orders.close(order_id);
        resync_tables(self.backend.as_ref(), order_table_id(&stored)).await?;
        Ok(stored)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Clear all session state. Later operations fail with a conflict.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.with_cart(Cart::clear);
        self.open_orders.clear();
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = SettingsContext::default();
        info!("session context disposed");
    }

    fn ensure_live(&self) -> Result<(), BackendError> {
        if self.is_disposed() {
            Err(BackendError::Conflict("session context disposed".into()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cafepos_core::Filter;
    use serde_json::json;

    /// Minimal backend holding rows in insertion order.
    #[derive(Default)]
    struct Rows {
        rows: Mutex<Vec<(Resource, Record)>>,
    }

    impl Rows {
        fn with(rows: Vec<(Resource, Value)>) -> Arc<Self> {
            let rows = rows
                .into_iter()
                .map(|(r, v)| (r, v.as_object().cloned().unwrap()))
                .collect();
            Arc::new(Self { rows: Mutex::new(rows) })
        }
    }

    #[async_trait::async_trait]
    impl Backend for Rows {
        fn name(&self) -> &str {
            "rows"
        }

        async fn list(&self, resource: Resource, filter: &Filter) -> Result<Vec<Record>, BackendError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|(r, rec)| *r == resource && cafepos_core::matches_filter(rec, filter))
                .map(|(_, rec)| rec.clone())
                .collect())
        }

        async fn get(&self, resource: Resource, id: &str) -> Result<Record, BackendError> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|(r, rec)| *r == resource && record_id(rec) == Some(id))
                .map(|(_, rec)| rec.clone())
                .ok_or_else(|| BackendError::not_found(resource, id))
        }

        async fn insert(&self, resource: Resource, mut record: Record) -> Result<Record, BackendError> {
            let n = self.rows.lock().unwrap().len();
            record.insert("id".into(), json!(format!("row-{n}")));
            self.rows.lock().unwrap().push((resource, record.clone()));
            Ok(record)
        }

        async fn update(&self, resource: Resource, id: &str, patch: Record) -> Result<Record, BackendError> {
            let mut rows = self.rows.lock().unwrap();
            let (_, rec) = rows
                .iter_mut()
                .find(|(r, rec)| *r == resource && record_id(rec) == Some(id))
                .ok_or_else(|| BackendError::not_found(resource, id))?;
            rec.extend(patch);
            Ok(rec.clone())
        }

        async fn delete(&self, _resource: Resource, _id: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn seeded() -> Arc<Rows> {
        Rows::with(vec![
            (Resource::Settings, json!({ "id": "s1", "key": "cafe_name", "value": "Bean There" })),
            (Resource::Settings, json!({ "id": "s2", "key": "refresh_interval_ms", "value": "15000" })),
            (Resource::Orders, json!({ "id": "o1", "table_id": "7", "status": "open", "total": 11.0 })),
            (Resource::Orders, json!({ "id": "o2", "table_id": "3", "status": "closed", "total": 4.0 })),
        ])
    }

    #[tokio::test]
    async fn init_loads_settings_and_open_orders() {
        let ctx = SessionContext::init(seeded(), None).await.unwrap();
        let settings = ctx.settings();
        assert_eq!(settings.cafe_name(), "Bean There");
        assert_eq!(settings.refresh_interval(), Some(Duration::from_millis(15_000)));

        let book = ctx.open_orders();
        assert_eq!(book.open_items_for("7").len(), 1);
        assert!(book.open_items_for("3").is_empty());
    }

    #[tokio::test]
    async fn submit_cart_tracks_order_and_clears_cart() {
        let ctx = SessionContext::init(seeded(), None).await.unwrap();
        ctx.with_cart(|cart| cart.add("latte", "Latte", 4.5, 2));

        let stored = ctx.submit_cart("3").await.unwrap();
        assert_eq!(stored["status"], "open");
        assert!(ctx.with_cart(|cart| cart.is_empty()));
        assert_eq!(ctx.open_orders().open_items_for("3").len(), 1);

        let order_id = record_id(&stored).unwrap().to_string();
        ctx.close_order(&order_id).await.unwrap();
        assert!(ctx.open_orders().open_items_for("3").is_empty());
    }

    #[tokio::test]
    async fn submit_and_close_keep_table_row_in_sync() {
        let backend = seeded();
        backend
            .rows
            .lock()
            .unwrap()
            .push((Resource::Tables, json!({ "id": "3", "is_available": true }).as_object().cloned().unwrap()));
        let ctx = SessionContext::init(backend.clone(), None).await.unwrap();
        ctx.with_cart(|cart| cart.add("mocha", "Mocha", 5.0, 1));

        let stored = ctx.submit_cart("3").await.unwrap();
        let table = backend.get(Resource::Tables, "3").await.unwrap();
        assert_eq!(table["is_available"], false);
        assert_eq!(table["current_total"], 5.0);

        ctx.close_order(record_id(&stored).unwrap()).await.unwrap();
        let table = backend.get(Resource::Tables, "3").await.unwrap();
        assert_eq!(table["is_available"], true);
        assert_eq!(table["status"], "available");
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let ctx = SessionContext::init(seeded(), None).await.unwrap();
        assert!(matches!(ctx.submit_cart("3").await, Err(BackendError::Validation(_))));
    }

    #[tokio::test]
    async fn dispose_clears_state_and_blocks_operations() {
        let ctx = SessionContext::init(seeded(), Credential::new("tok")).await.unwrap();
        ctx.with_cart(|cart| cart.add("scone", "Scone", 3.0, 1));
        ctx.dispose();
        ctx.dispose();

        assert!(ctx.is_disposed());
        assert!(ctx.open_orders().is_empty());
        assert!(ctx.settings().is_empty());
        assert!(ctx.with_cart(|cart| cart.is_empty()));
        assert!(matches!(ctx.submit_cart("3").await, Err(BackendError::Conflict(_))));
    }

    #[test]
    fn order_book_replaces_duplicate_order_ids() {
        let book = OpenOrderBook::new();
        let item = OpenItem {
            order_id: "o1".into(),
            table_id: "7".into(),
            total: 5.0,
            opened_at: Utc::now(),
        };
        book.open(item.clone());
        book.open(OpenItem { total: 6.0, ..item });
        assert_eq!(book.len(), 1);
        assert_eq!(book.open_items_for("7")[0].total, 6.0);
        assert!(book.close("o1"));
        assert!(!book.close("o1"));
    }

    #[test]
    fn order_rows_without_table_are_skipped() {
        let row = json!({ "id": "o9", "total": 2.0 }).as_object().cloned().unwrap();
        assert!(open_item_from_order(&row).is_none());
    }
}
