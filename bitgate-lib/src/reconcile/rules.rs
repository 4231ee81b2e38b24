//! Transition rules.
//!
//! Pure: given the authoritative invoice status, the order's current status
//! and the mapping, decide what (if anything) happens. The order's current
//! status is the whole state of the machine.
//!
//! | remote      | applies when the order is in                                              |
//! |-------------|---------------------------------------------------------------------------|
//! | `paid`      | on-hold, failed, M(invalid)                                               |
//! | `confirmed` | on-hold, pending, failed, M(invalid), M(paid)                             |
//! | `complete`  | on-hold, processing, pending, failed, M(invalid), M(paid), M(confirmed)   |
//! | `invalid`   | on-hold, pending                                                          |
//! | `expired`   | on-hold, pending (only when mapped)                                       |
//! | `new`       | never                                                                     |
//! | other       | never                                                                     |
//!
//! An order already at M(complete), or already at the target, never moves.

use std::fmt;

use crate::invoice::InvoiceStatus;
use crate::mapping::StatusMapping;
use crate::store::{OrderMutation, OrderStatus};

/// What the engine should do with one authoritative status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Apply(PlannedTransition),
    Skip(SkipReason),
}

/// A legal transition, not yet applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedTransition {
    pub remote: InvoiceStatus,
    pub to: OrderStatus,
    /// Whether the store's payment-completed hook fires with this transition.
    pub completes_payment: bool,
}

impl PlannedTransition {
    /// Audit note written to the order history.
    pub fn note(&self, invoice_id: &str) -> String {
        match self.remote {
            InvoiceStatus::Paid => format!(
                "Invoice {invoice_id} paid. Awaiting network confirmation and payment completed status."
            ),
            InvoiceStatus::Confirmed => {
                format!("Invoice {invoice_id} confirmed. Awaiting payment completed status.")
            }
            InvoiceStatus::Complete => format!(
                "Invoice {invoice_id} payment completed. Payment credited to your merchant account."
            ),
            InvoiceStatus::Invalid => format!(
                "Bitcoin payment for invoice {invoice_id} is invalid. The payment was not confirmed by the network within 1 hour."
            ),
            InvoiceStatus::Expired => {
                format!("Invoice {invoice_id} expired before a payment was received.")
            }
            InvoiceStatus::New => format!("Invoice {invoice_id} created."),
            InvoiceStatus::Unrecognized => {
                format!("Invoice {invoice_id} reported an unrecognized status.")
            }
        }
    }

    /// The single store mutation carrying this transition.
    pub fn to_mutation(&self, invoice_id: &str) -> OrderMutation {
        let mutation = OrderMutation::transition(self.to.clone(), self.note(invoice_id));
        if self.completes_payment {
            mutation.with_payment_complete()
        } else {
            mutation
        }
    }
}

/// Why nothing happened. Never an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The order already reached the mapped complete status.
    AlreadyComplete,
    /// The order is already where this status would put it.
    AlreadyAtTarget,
    /// The remote status has no local mapping.
    Unmapped(InvoiceStatus),
    /// The current status is outside the rule's precondition set.
    NotPermitted {
        from: OrderStatus,
        remote: InvoiceStatus,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyComplete => f.write_str("order already complete"),
            Self::AlreadyAtTarget => f.write_str("order already at target status"),
            Self::Unmapped(remote) => write!(f, "`{remote}` is not mapped to a local status"),
            Self::NotPermitted { from, remote } => {
                write!(f, "`{remote}` does not apply to an order in `{from}`")
            }
        }
    }
}

/// Decide the transition for `remote` on an order currently in `current`.
pub fn decide(remote: InvoiceStatus, current: &OrderStatus, mapping: &StatusMapping) -> Decision {
    if current == &mapping.complete {
        return Decision::Skip(SkipReason::AlreadyComplete);
    }

    let Some(target) = mapping.target(remote) else {
        return Decision::Skip(SkipReason::Unmapped(remote));
    };

    if current == target {
        return Decision::Skip(SkipReason::AlreadyAtTarget);
    }

    if !permits(remote, current, mapping) {
        return Decision::Skip(SkipReason::NotPermitted {
            from: current.clone(),
            remote,
        });
    }

    Decision::Apply(PlannedTransition {
        remote,
        to: target.clone(),
        completes_payment: remote == InvoiceStatus::Complete,
    })
}

fn permits(remote: InvoiceStatus, current: &OrderStatus, mapping: &StatusMapping) -> bool {
    let on_hold = current.is(OrderStatus::ON_HOLD);
    let pending = current.is(OrderStatus::PENDING);
    let failed = current.is(OrderStatus::FAILED) || current == &mapping.invalid;

    match remote {
        InvoiceStatus::Paid => on_hold || failed,
        InvoiceStatus::Confirmed => on_hold || pending || failed || current == &mapping.paid,
        InvoiceStatus::Complete => {
            on_hold
                || pending
                || failed
                || current.is(OrderStatus::PROCESSING)
                || current == &mapping.paid
                || current == &mapping.confirmed
        }
        InvoiceStatus::Invalid | InvoiceStatus::Expired => on_hold || pending,
        InvoiceStatus::New | InvoiceStatus::Unrecognized => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::OrderStateOverrides;

    fn applies(remote: InvoiceStatus, current: &str) -> Option<OrderStatus> {
        match decide(remote, &OrderStatus::new(current), &StatusMapping::default()) {
            Decision::Apply(t) => Some(t.to),
            Decision::Skip(_) => None,
        }
    }

    #[test]
    fn test_paid() {
        assert_eq!(applies(InvoiceStatus::Paid, "on-hold"), Some(OrderStatus::processing()));
        assert_eq!(applies(InvoiceStatus::Paid, "failed"), Some(OrderStatus::processing()));
        assert_eq!(applies(InvoiceStatus::Paid, "pending"), None);
        assert_eq!(applies(InvoiceStatus::Paid, "completed"), None);
        assert_eq!(applies(InvoiceStatus::Paid, "cancelled"), None);
    }

    #[test]
    fn test_confirmed_out_of_order() {
        assert_eq!(
            applies(InvoiceStatus::Confirmed, "on-hold"),
            Some(OrderStatus::processing())
        );
        assert_eq!(
            applies(InvoiceStatus::Confirmed, "pending"),
            Some(OrderStatus::processing())
        );
    }

    #[test]
    fn test_confirmed_after_paid_with_same_mapping_is_noop() {
        assert_eq!(
            decide(
                InvoiceStatus::Confirmed,
                &OrderStatus::processing(),
                &StatusMapping::default()
            ),
            Decision::Skip(SkipReason::AlreadyAtTarget)
        );
    }

    #[test]
    fn test_complete_fires_payment_hook() {
        let decision = decide(
            InvoiceStatus::Complete,
            &OrderStatus::on_hold(),
            &StatusMapping::default(),
        );
        let Decision::Apply(transition) = decision else {
            panic!("expected a transition, got {decision:?}");
        };
        assert_eq!(transition.to, OrderStatus::completed());
        assert!(transition.completes_payment);

        let mutation = transition.to_mutation("inv1");
        assert!(mutation.mark_payment_complete);
        assert!(mutation.note.unwrap().contains("inv1"));
    }

    #[test]
    fn test_complete_from_every_progress_state() {
        for current in ["on-hold", "processing", "pending", "failed"] {
            assert_eq!(
                applies(InvoiceStatus::Complete, current),
                Some(OrderStatus::completed()),
                "from {current}"
            );
        }
    }

    #[test]
    fn test_completed_never_moves() {
        for remote in InvoiceStatus::ALL {
            assert_eq!(
                decide(remote, &OrderStatus::completed(), &StatusMapping::default()),
                Decision::Skip(SkipReason::AlreadyComplete)
            );
        }
    }

    #[test]
    fn test_invalid_only_before_progress() {
        assert_eq!(applies(InvoiceStatus::Invalid, "on-hold"), Some(OrderStatus::failed()));
        assert_eq!(applies(InvoiceStatus::Invalid, "pending"), Some(OrderStatus::failed()));
        assert_eq!(applies(InvoiceStatus::Invalid, "processing"), None);
        assert_eq!(applies(InvoiceStatus::Invalid, "completed"), None);
    }

    #[test]
    fn test_new_and_unmapped_expired_never_move() {
        assert_eq!(
            decide(InvoiceStatus::New, &OrderStatus::on_hold(), &StatusMapping::default()),
            Decision::Skip(SkipReason::Unmapped(InvoiceStatus::New))
        );
        assert_eq!(
            decide(
                InvoiceStatus::Expired,
                &OrderStatus::on_hold(),
                &StatusMapping::default()
            ),
            Decision::Skip(SkipReason::Unmapped(InvoiceStatus::Expired))
        );
    }

    #[test]
    fn test_unrecognized_status_is_unmapped() {
        for current in ["on-hold", "pending", "processing", "failed"] {
            assert_eq!(
                decide(
                    InvoiceStatus::Unrecognized,
                    &OrderStatus::new(current),
                    &StatusMapping::default()
                ),
                Decision::Skip(SkipReason::Unmapped(InvoiceStatus::Unrecognized)),
                "from {current}"
            );
        }
    }

    #[test]
    fn test_custom_mapping() {
        let mut overrides = OrderStateOverrides::new();
        overrides
            .set(InvoiceStatus::Paid, OrderStatus::new("paid-btc"))
            .unwrap();
        overrides
            .set(InvoiceStatus::Invalid, OrderStatus::new("btc-invalid"))
            .unwrap();
        overrides
            .set(InvoiceStatus::Expired, OrderStatus::new("cancelled"))
            .unwrap();
        let mapping = StatusMapping::from_overrides(&overrides);

        // Mapped paid and mapped invalid count as their rule's states.
        assert!(matches!(
            decide(InvoiceStatus::Confirmed, &OrderStatus::new("paid-btc"), &mapping),
            Decision::Apply(_)
        ));
        assert!(matches!(
            decide(InvoiceStatus::Paid, &OrderStatus::new("btc-invalid"), &mapping),
            Decision::Apply(_)
        ));
        assert!(matches!(
            decide(InvoiceStatus::Expired, &OrderStatus::on_hold(), &mapping),
            Decision::Apply(PlannedTransition { completes_payment: false, .. })
        ));
        assert!(matches!(
            decide(InvoiceStatus::Expired, &OrderStatus::new("paid-btc"), &mapping),
            Decision::Skip(SkipReason::NotPermitted { .. })
        ));
    }
}
