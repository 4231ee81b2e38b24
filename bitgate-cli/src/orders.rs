//! JSON-file order store for the operator CLI.
//!
//! Stands in for a shop backend: orders, their history and open carts live in
//! one JSON document. Every write is read-modify-write under an exclusive
//! lock on a sibling `.lock` file, so `bitgate serve` and one-off commands can
//! share the file. Writes go through a temp file renamed over the target,
//! which keeps unlocked reads consistent.

use async_trait::async_trait;
use bitgate_lib::store::{
    ApplyOutcome, OrderId, OrderMutation, OrderNote, OrderRecord, OrderStatus, StoreAdapter,
};
use bitgate_lib::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use fs2::FileExt;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Deserialize)]
struct OrderBook {
    #[serde(default)]
    orders: BTreeMap<OrderId, OrderRecord>,
    /// Orders whose customer cart has not been released yet.
    #[serde(default)]
    open_carts: BTreeSet<OrderId>,
}

/// Orders persisted to a single JSON file.
pub struct FileOrderStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileOrderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a new order with an open cart.
    pub async fn create_order(&self, id: OrderId, status: OrderStatus) -> Result<OrderRecord> {
        self.modify(|book| {
            if book.orders.contains_key(&id) {
                return Err(GatewayError::invalid_input(
                    "order_id",
                    format!("order {id} already exists"),
                ));
            }
            let record = OrderRecord::new(id.clone(), status);
            book.orders.insert(id.clone(), record.clone());
            book.open_carts.insert(id);
            Ok(record)
        })
        .await
    }

    /// All orders, by id.
    pub async fn list(&self) -> Result<Vec<OrderRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.orders.into_values().collect())
    }

    pub async fn get(&self, id: &OrderId) -> Result<Option<OrderRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.orders.remove(id))
    }

    /// Whether the order's cart is still held.
    pub async fn has_open_cart(&self, id: &OrderId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.open_carts.contains(id))
    }

    /// Order for an invoice, from the bindings written at checkout.
    pub async fn order_for_invoice(&self, invoice_id: &str) -> Result<Option<OrderId>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()?
            .orders
            .into_values()
            .find(|r| r.invoice_id.as_deref() == Some(invoice_id))
            .map(|r| r.id))
    }

    async fn modify<T>(&self, f: impl FnOnce(&mut OrderBook) -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock().await;
        let _file_lock = self.lock_file()?;
        let mut book = self.load()?;
        let value = f(&mut book)?;
        self.save(&book)?;
        Ok(value)
    }

    async fn modify_order<T>(
        &self,
        id: &OrderId,
        f: impl FnOnce(&mut OrderRecord) -> T,
    ) -> Result<T> {
        self.modify(|book| {
            let record = book
                .orders
                .get_mut(id)
                .ok_or_else(|| GatewayError::OrderNotFound(id.to_string()))?;
            Ok(f(record))
        })
        .await
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "orders.json".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn lock_file(&self) -> Result<LockedFile> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.sibling(".lock"))?;
        file.lock_exclusive()?;
        Ok(LockedFile(file))
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn load(&self) -> Result<OrderBook> {
        if !self.path.exists() {
            return Ok(OrderBook::default());
        }
        let json = std::fs::read_to_string(&self.path)?;
        if json.trim().is_empty() {
            return Ok(OrderBook::default());
        }
        serde_json::from_str(&json).map_err(|e| {
            GatewayError::Storage(format!("{} is not a valid order file: {e}", self.path.display()))
        })
    }

    fn save(&self, book: &OrderBook) -> Result<()> {
        self.ensure_parent()?;
        let json = serde_json::to_string_pretty(book)?;
        let tmp = self.sibling(&format!(".{}.tmp", std::process::id()));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Exclusive lock on the order file, released on drop.
struct LockedFile(File);

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

#[async_trait]
impl StoreAdapter for FileOrderStore {
    async fn current_status(&self, order: &OrderId) -> Result<OrderStatus> {
        self.get(order)
            .await?
            .map(|record| record.status)
            .ok_or_else(|| GatewayError::OrderNotFound(order.to_string()))
    }

    async fn transition(&self, order: &OrderId, to: OrderStatus, note: &str) -> Result<()> {
        self.modify_order(order, |record| {
            record.apply_mutation(OrderMutation::transition(to, note));
        })
        .await
    }

    async fn mark_payment_complete(&self, order: &OrderId) -> Result<()> {
        let fired = self
            .modify_order(order, |record| {
                record.apply_mutation(OrderMutation::default().with_payment_complete())
            })
            .await?;
        if fired {
            info!(order_id = %order, "payment complete");
        }
        Ok(())
    }

    async fn reduce_stock(&self, order: &OrderId) -> Result<()> {
        self.modify_order(order, |record| record.stock_reduced = true)
            .await
    }

    async fn empty_cart(&self, order: &OrderId) -> Result<()> {
        self.modify(|book| {
            if !book.orders.contains_key(order) {
                return Err(GatewayError::OrderNotFound(order.to_string()));
            }
            book.open_carts.remove(order);
            Ok(())
        })
        .await
    }

    async fn apply(
        &self,
        order: &OrderId,
        expected: &OrderStatus,
        mutation: OrderMutation,
    ) -> Result<ApplyOutcome> {
        let (outcome, fired) = self
            .modify_order(order, |record| {
                if &record.status != expected {
                    return (
                        ApplyOutcome::Stale {
                            current: record.status.clone(),
                        },
                        false,
                    );
                }
                let fired = record.apply_mutation(mutation);
                (ApplyOutcome::Applied, fired)
            })
            .await?;

        match &outcome {
            ApplyOutcome::Applied if fired => info!(order_id = %order, "payment complete"),
            ApplyOutcome::Applied => {}
            ApplyOutcome::Stale { current } => {
                debug!(order_id = %order, %expected, %current, "stale order status")
            }
        }
        Ok(outcome)
    }

    async fn history(&self, order: &OrderId) -> Result<Vec<OrderNote>> {
        self.get(order)
            .await?
            .map(|record| record.notes)
            .ok_or_else(|| GatewayError::OrderNotFound(order.to_string()))
    }

    async fn order_for_invoice(&self, invoice_id: &str) -> Result<Option<OrderId>> {
        FileOrderStore::order_for_invoice(self, invoice_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileOrderStore {
        FileOrderStore::new(dir.path().join("orders.json"))
    }

    #[tokio::test]
    async fn test_create_and_reload() {
        let dir = TempDir::new().unwrap();
        let id = OrderId::new("1001");
        store(&dir)
            .create_order(id.clone(), OrderStatus::pending())
            .await
            .unwrap();

        let reopened = store(&dir);
        assert_eq!(
            reopened.current_status(&id).await.unwrap(),
            OrderStatus::pending()
        );
        assert!(reopened.has_open_cart(&id).await.unwrap());
        assert!(reopened
            .create_order(id, OrderStatus::pending())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_apply_is_conditional() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = OrderId::new("1001");
        store
            .create_order(id.clone(), OrderStatus::on_hold())
            .await
            .unwrap();

        let stale = store
            .apply(
                &id,
                &OrderStatus::pending(),
                OrderMutation::transition(OrderStatus::processing(), "paid"),
            )
            .await
            .unwrap();
        assert_eq!(
            stale,
            ApplyOutcome::Stale {
                current: OrderStatus::on_hold()
            }
        );

        let applied = store
            .apply(
                &id,
                &OrderStatus::on_hold(),
                OrderMutation::transition(OrderStatus::completed(), "done").with_payment_complete(),
            )
            .await
            .unwrap();
        assert_eq!(applied, ApplyOutcome::Applied);

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::completed());
        assert!(record.payment_completed);
        assert_eq!(store.history(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_cart_and_unknown_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = OrderId::new("7");
        store
            .create_order(id.clone(), OrderStatus::pending())
            .await
            .unwrap();

        store.empty_cart(&id).await.unwrap();
        assert!(!store.has_open_cart(&id).await.unwrap());

        let err = store
            .current_status(&OrderId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::OrderNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_writers_on_separate_handles_do_not_lose_orders() {
        let dir = TempDir::new().unwrap();
        let first = std::sync::Arc::new(store(&dir));
        let second = std::sync::Arc::new(store(&dir));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..40 {
            let handle = if i % 2 == 0 { first.clone() } else { second.clone() };
            tasks.spawn(async move {
                handle
                    .create_order(OrderId::new(format!("{i}")), OrderStatus::pending())
                    .await
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(first.list().await.unwrap().len(), 40);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_invoice_binding_is_persisted() {
        let dir = TempDir::new().unwrap();
        let id = OrderId::new("1001");
        let writer = store(&dir);
        writer
            .create_order(id.clone(), OrderStatus::pending())
            .await
            .unwrap();
        writer
            .apply(
                &id,
                &OrderStatus::pending(),
                OrderMutation::transition(OrderStatus::on_hold(), "held").with_invoice("inv1"),
            )
            .await
            .unwrap();

        let reader = store(&dir);
        assert_eq!(
            StoreAdapter::order_for_invoice(&reader, "inv1").await.unwrap(),
            Some(id)
        );
        assert_eq!(reader.order_for_invoice("inv2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("orders.json"), "{not json").unwrap();

        let err = store(&dir).list().await.unwrap_err();
        assert!(matches!(err, GatewayError::Storage(_)));
    }
}
