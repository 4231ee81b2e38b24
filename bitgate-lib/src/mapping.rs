//! Remote invoice status to local order status mapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::invoice::InvoiceStatus;
use crate::store::OrderStatus;
use crate::{GatewayError, Result};

/// Resolved mapping used by the reconciliation rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMapping {
    pub paid: OrderStatus,
    pub confirmed: OrderStatus,
    pub complete: OrderStatus,
    pub expired: Option<OrderStatus>,
    pub invalid: OrderStatus,
}

impl Default for StatusMapping {
    fn default() -> Self {
        Self {
            paid: OrderStatus::processing(),
            confirmed: OrderStatus::processing(),
            complete: OrderStatus::completed(),
            expired: None,
            invalid: OrderStatus::failed(),
        }
    }
}

impl StatusMapping {
    /// Defaults with operator overrides applied.
    pub fn from_overrides(overrides: &OrderStateOverrides) -> Self {
        let mut mapping = Self::default();
        for (remote, local) in overrides.iter() {
            match remote {
                InvoiceStatus::New | InvoiceStatus::Unrecognized => {}
                InvoiceStatus::Paid => mapping.paid = local.clone(),
                InvoiceStatus::Confirmed => mapping.confirmed = local.clone(),
                InvoiceStatus::Complete => mapping.complete = local.clone(),
                InvoiceStatus::Expired => mapping.expired = Some(local.clone()),
                InvoiceStatus::Invalid => mapping.invalid = local.clone(),
            }
        }
        mapping
    }

    /// Local status for a remote status, `None` when unmapped.
    pub fn target(&self, remote: InvoiceStatus) -> Option<&OrderStatus> {
        match remote {
            InvoiceStatus::New | InvoiceStatus::Unrecognized => None,
            InvoiceStatus::Paid => Some(&self.paid),
            InvoiceStatus::Confirmed => Some(&self.confirmed),
            InvoiceStatus::Complete => Some(&self.complete),
            InvoiceStatus::Expired => self.expired.as_ref(),
            InvoiceStatus::Invalid => Some(&self.invalid),
        }
    }
}

/// Operator overrides as persisted in settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderStateOverrides(BTreeMap<InvoiceStatus, OrderStatus>);

impl OrderStateOverrides {
    /// Empty override set, i.e. all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the local status for one remote status.
    ///
    /// Targets that re-open the lifecycle (`on-hold`, `pending`) are rejected,
    /// as is mapping `new`, which never moves an order.
    pub fn set(&mut self, remote: InvoiceStatus, local: OrderStatus) -> Result<()> {
        if matches!(remote, InvoiceStatus::New | InvoiceStatus::Unrecognized) {
            return Err(GatewayError::invalid_input(
                "order_state",
                format!("`{remote}` invoices never change the order status"),
            ));
        }
        if local.as_str().is_empty() {
            return Err(GatewayError::invalid_input(
                "order_state",
                "local status cannot be empty",
            ));
        }
        if local.is_awaiting_payment() {
            return Err(GatewayError::invalid_input(
                "order_state",
                format!("`{remote}` cannot map to `{local}`, which awaits payment"),
            ));
        }
        self.0.insert(remote, local);
        Ok(())
    }

    /// Drop an override, restoring the default.
    pub fn clear(&mut self, remote: InvoiceStatus) -> Option<OrderStatus> {
        self.0.remove(&remote)
    }

    /// Re-check overrides loaded from storage.
    pub fn validate(&self) -> Result<()> {
        let mut check = Self::new();
        for (remote, local) in self.iter() {
            check.set(remote, local.clone())?;
        }
        Ok(())
    }

    pub fn get(&self, remote: InvoiceStatus) -> Option<&OrderStatus> {
        self.0.get(&remote)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InvoiceStatus, &OrderStatus)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let mapping = StatusMapping::default();
        assert_eq!(mapping.target(InvoiceStatus::Paid), Some(&OrderStatus::processing()));
        assert_eq!(
            mapping.target(InvoiceStatus::Confirmed),
            Some(&OrderStatus::processing())
        );
        assert_eq!(
            mapping.target(InvoiceStatus::Complete),
            Some(&OrderStatus::completed())
        );
        assert_eq!(mapping.target(InvoiceStatus::Invalid), Some(&OrderStatus::failed()));
        assert_eq!(mapping.target(InvoiceStatus::New), None);
        assert_eq!(mapping.target(InvoiceStatus::Expired), None);
    }

    #[test]
    fn test_overrides_apply() {
        let mut overrides = OrderStateOverrides::new();
        overrides
            .set(InvoiceStatus::Confirmed, OrderStatus::new("wc-confirmed-btc"))
            .unwrap();
        overrides
            .set(InvoiceStatus::Expired, OrderStatus::new("cancelled"))
            .unwrap();

        let mapping = StatusMapping::from_overrides(&overrides);
        assert_eq!(mapping.confirmed.as_str(), "confirmed-btc");
        assert_eq!(mapping.expired, Some(OrderStatus::new("cancelled")));
        assert_eq!(mapping.paid, OrderStatus::processing());
    }

    #[test]
    fn test_reopening_targets_rejected() {
        let mut overrides = OrderStateOverrides::new();
        assert!(overrides
            .set(InvoiceStatus::Paid, OrderStatus::on_hold())
            .is_err());
        assert!(overrides
            .set(InvoiceStatus::Invalid, OrderStatus::new("wc-pending"))
            .is_err());
        assert!(overrides.set(InvoiceStatus::Paid, OrderStatus::new("")).is_err());
        assert!(overrides
            .set(InvoiceStatus::New, OrderStatus::processing())
            .is_err());
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_clear_restores_default() {
        let mut overrides = OrderStateOverrides::new();
        overrides
            .set(InvoiceStatus::Complete, OrderStatus::new("shipped"))
            .unwrap();
        assert_eq!(
            overrides.clear(InvoiceStatus::Complete),
            Some(OrderStatus::new("shipped"))
        );
        assert_eq!(
            StatusMapping::from_overrides(&overrides),
            StatusMapping::default()
        );
    }

    #[test]
    fn test_serialized_as_flat_map() {
        let mut overrides = OrderStateOverrides::new();
        overrides
            .set(InvoiceStatus::Paid, OrderStatus::new("paid-btc"))
            .unwrap();
        let json = serde_json::to_string(&overrides).unwrap();
        assert_eq!(json, r#"{"paid":"paid-btc"}"#);

        let tampered: OrderStateOverrides =
            serde_json::from_str(r#"{"paid":"on-hold"}"#).unwrap();
        assert!(tampered.validate().is_err());
    }
}
