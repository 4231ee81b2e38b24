//! In-memory store.
//!
//! # Thread Safety
//!
//! Uses `RwLock` for thread-safe access. Lock poisoning is reported as a
//! storage error rather than panicking.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{ApplyOutcome, OrderId, OrderMutation, OrderNote, OrderRecord, OrderStatus, StoreAdapter};
use crate::{GatewayError, Result};

fn lock_error(context: &str) -> GatewayError {
    GatewayError::Storage(format!("InMemoryStore: lock poisoned during {context}"))
}

/// Orders held in a map, with counters for the side effects tests care about.
#[derive(Default)]
pub struct InMemoryStore {
    orders: RwLock<HashMap<OrderId, OrderRecord>>,
    payment_completions: AtomicUsize,
    cart_empties: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records.
    pub fn from_records(records: impl IntoIterator<Item = OrderRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut orders) = store.orders.write() {
            orders.extend(records.into_iter().map(|r| (r.id.clone(), r)));
        }
        store
    }

    /// Add or replace an order in `status`.
    pub fn insert_order(&self, id: impl Into<OrderId>, status: OrderStatus) -> Result<()> {
        let record = OrderRecord::new(id, status);
        let mut orders = self.orders.write().map_err(|_| lock_error("insert"))?;
        orders.insert(record.id.clone(), record);
        Ok(())
    }

    /// Copy of one order.
    pub fn record(&self, id: &OrderId) -> Option<OrderRecord> {
        self.orders.read().ok()?.get(id).cloned()
    }

    /// Copy of every order.
    pub fn snapshot(&self) -> Vec<OrderRecord> {
        self.orders
            .read()
            .map(|o| o.values().cloned().collect())
            .unwrap_or_default()
    }

    /// How many times the payment-completed hook fired, across all orders.
    pub fn payment_completions(&self) -> usize {
        self.payment_completions.load(Ordering::SeqCst)
    }

    /// How many carts were emptied.
    pub fn cart_empties(&self) -> usize {
        self.cart_empties.load(Ordering::SeqCst)
    }

    fn with_order<T>(
        &self,
        id: &OrderId,
        context: &str,
        f: impl FnOnce(&mut OrderRecord) -> T,
    ) -> Result<T> {
        let mut orders = self.orders.write().map_err(|_| lock_error(context))?;
        let record = orders
            .get_mut(id)
            .ok_or_else(|| GatewayError::OrderNotFound(id.to_string()))?;
        Ok(f(record))
    }

    fn count_completion(&self, fired: bool) {
        if fired {
            self.payment_completions.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl StoreAdapter for InMemoryStore {
    async fn current_status(&self, order: &OrderId) -> Result<OrderStatus> {
        let orders = self.orders.read().map_err(|_| lock_error("current_status"))?;
        orders
            .get(order)
            .map(|r| r.status.clone())
            .ok_or_else(|| GatewayError::OrderNotFound(order.to_string()))
    }

    async fn transition(&self, order: &OrderId, to: OrderStatus, note: &str) -> Result<()> {
        self.with_order(order, "transition", |record| {
            record.apply_mutation(OrderMutation::transition(to, note));
        })
    }

    async fn mark_payment_complete(&self, order: &OrderId) -> Result<()> {
        let fired = self.with_order(order, "mark_payment_complete", |record| {
            record.apply_mutation(OrderMutation::default().with_payment_complete())
        })?;
        self.count_completion(fired);
        Ok(())
    }

    async fn reduce_stock(&self, order: &OrderId) -> Result<()> {
        self.with_order(order, "reduce_stock", |record| {
            record.stock_reduced = true;
        })
    }

    async fn empty_cart(&self, order: &OrderId) -> Result<()> {
        self.with_order(order, "empty_cart", |_| ())?;
        self.cart_empties.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn apply(
        &self,
        order: &OrderId,
        expected: &OrderStatus,
        mutation: OrderMutation,
    ) -> Result<ApplyOutcome> {
        let outcome = self.with_order(order, "apply", |record| {
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
        })?;
        self.count_completion(outcome.1);
        Ok(outcome.0)
    }

    async fn history(&self, order: &OrderId) -> Result<Vec<OrderNote>> {
        let orders = self.orders.read().map_err(|_| lock_error("history"))?;
        orders
            .get(order)
            .map(|r| r.notes.clone())
            .ok_or_else(|| GatewayError::OrderNotFound(order.to_string()))
    }

    async fn order_for_invoice(&self, invoice_id: &str) -> Result<Option<OrderId>> {
        let orders = self.orders.read().map_err(|_| lock_error("order_for_invoice"))?;
        Ok(orders
            .values()
            .find(|r| r.invoice_id.as_deref() == Some(invoice_id))
            .map(|r| r.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_is_conditional() {
        let store = InMemoryStore::new();
        let id = OrderId::new("1001");
        store.insert_order(id.clone(), OrderStatus::on_hold()).unwrap();

        let outcome = store
            .apply(
                &id,
                &OrderStatus::pending(),
                OrderMutation::transition(OrderStatus::processing(), "paid"),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Stale {
                current: OrderStatus::on_hold()
            }
        );
        assert!(store.history(&id).await.unwrap().is_empty());

        let outcome = store
            .apply(
                &id,
                &OrderStatus::on_hold(),
                OrderMutation::transition(OrderStatus::processing(), "paid"),
            )
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(
            store.current_status(&id).await.unwrap(),
            OrderStatus::processing()
        );
        assert_eq!(store.history(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_completion_counted_once() {
        let store = InMemoryStore::new();
        let id = OrderId::new("1002");
        store.insert_order(id.clone(), OrderStatus::on_hold()).unwrap();

        store.mark_payment_complete(&id).await.unwrap();
        store.mark_payment_complete(&id).await.unwrap();

        assert_eq!(store.payment_completions(), 1);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let store = InMemoryStore::new();
        let err = store
            .current_status(&OrderId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_transition_and_cart() {
        let store = InMemoryStore::from_records([OrderRecord::new("7", OrderStatus::pending())]);
        let id = OrderId::new("7");

        store
            .transition(&id, OrderStatus::on_hold(), "awaiting payment")
            .await
            .unwrap();
        store.reduce_stock(&id).await.unwrap();
        store.empty_cart(&id).await.unwrap();

        let record = store.record(&id).unwrap();
        assert_eq!(record.status, OrderStatus::on_hold());
        assert!(record.stock_reduced);
        assert_eq!(store.cart_empties(), 1);
    }
}
