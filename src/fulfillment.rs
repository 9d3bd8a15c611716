//! Partial-fulfillment delivery processing.
//!
//! Applies a shipped quantity against a line item. A full shipment updates
//! the row in place; a partial shipment splits it into a remainder row and a
//! fulfilled row sharing the same `mgmt_no`, conserving quantity exactly and
//! money within scale. One [`DeliveryRecord`] is appended for every non-zero
//! shipment.

use crate::error::{Result, StoreError};
use crate::money::Decimal4;
use crate::records::{DeliveryRecord, LineItem};
use crate::store::RecordStore;
use chrono::NaiveDate;
use log::debug;
use std::str::FromStr;
use uuid::Uuid;

/// Shipment details shared by every item of one delivery batch.
#[derive(Debug, Clone)]
pub struct Shipment {
    /// Delivery batch number, from [`RecordStore::next_delivery_no`].
    pub delivery_no: String,
    pub ship_date: NaiveDate,
    /// Carrier tracking/invoice number.
    pub invoice_no: String,
    pub shipping_method: String,
    pub actor: String,
}

/// Result of applying a delivery quantity to one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Zero quantity: item unchanged, no delivery record emitted.
    Noop,
    /// Full shipment: the item was updated in place.
    Full { item: Uuid, record: Uuid },
    /// Partial shipment: the original row keeps the remainder, a new
    /// fulfilled row was appended.
    Split {
        remainder: Uuid,
        fulfilled: Uuid,
        record: Uuid,
    },
}

/// Quantity comparison tolerance for "shipped everything".
fn qty_epsilon() -> Decimal4 {
    Decimal4::from_str("0.000001").unwrap_or(Decimal4::ZERO)
}

/// Applies `deliver_qty` of the item identified by `item_id`.
///
/// Rejects negative and over-delivery quantities, and items whose status is
/// not shippable (already delivered, complete, cancelled, on hold). All
/// monetary recomputation derives from `qty * unit_price * tax_rate`, never
/// by subtracting from stale totals.
pub fn apply_delivery(
    store: &mut RecordStore,
    item_id: Uuid,
    deliver_qty: Decimal4,
    serial_no: &str,
    shipment: &Shipment,
) -> Result<DeliveryOutcome> {
    let idx = store
        .item_index(item_id)
        .ok_or_else(|| StoreError::Validation(format!("unknown line item {}", item_id)))?;

    {
        let item = &store.items[idx];
        if deliver_qty.is_negative() {
            return Err(StoreError::Validation(format!(
                "delivery quantity must not be negative (item {})",
                item.model
            )));
        }
        if deliver_qty > item.qty {
            return Err(StoreError::Validation(format!(
                "delivery quantity {} exceeds remaining quantity {} (item {})",
                deliver_qty, item.qty, item.model
            )));
        }
        if !item.status.is_shippable() {
            return Err(StoreError::Validation(format!(
                "item {} is not awaiting delivery (status {})",
                item.model, item.status
            )));
        }
    }

    if deliver_qty.is_zero() {
        return Ok(DeliveryOutcome::Noop);
    }

    let full = (store.items[idx].qty - deliver_qty) < qty_epsilon();
    let record = delivery_record(&store.items[idx], deliver_qty, serial_no, shipment);
    let record_id = record.id;
    store.deliveries.push(record);

    if full {
        let item = &mut store.items[idx];
        item.status = item.status.after_shipment();
        stamp_shipment(item, shipment);
        item.recompute_amounts();
        debug!(
            "full shipment of {} x {} ({}), now {}",
            item.qty, item.model, item.mgmt_no, item.status
        );
        return Ok(DeliveryOutcome::Full {
            item: item_id,
            record: record_id,
        });
    }

    // Split: the original row keeps the remainder and its current status,
    // still awaiting further shipment.
    let mut fulfilled = store.items[idx].clone();
    {
        let remainder = &mut store.items[idx];
        remainder.qty -= deliver_qty;
        remainder.recompute_amounts();
    }

    // The fulfilled row starts with no payment allocated against it; a
    // subsequent ledger replay restores the group's true balances.
    fulfilled.id = Uuid::new_v4();
    fulfilled.qty = deliver_qty;
    fulfilled.paid_amount = Decimal4::ZERO;
    fulfilled.status = fulfilled.status.after_shipment();
    stamp_shipment(&mut fulfilled, shipment);
    fulfilled.recompute_amounts();
    let fulfilled_id = fulfilled.id;
    store.items.push(fulfilled);

    debug!(
        "partial shipment of {} ({}), remainder {} left on original row",
        deliver_qty, shipment.delivery_no, store.items[idx].qty
    );
    Ok(DeliveryOutcome::Split {
        remainder: item_id,
        fulfilled: fulfilled_id,
        record: record_id,
    })
}

fn stamp_shipment(item: &mut LineItem, shipment: &Shipment) {
    item.ship_date = Some(shipment.ship_date);
    item.invoice_no = shipment.invoice_no.clone();
    item.shipping_method = shipment.shipping_method.clone();
}

fn delivery_record(
    item: &LineItem,
    shipped_qty: Decimal4,
    serial_no: &str,
    shipment: &Shipment,
) -> DeliveryRecord {
    DeliveryRecord {
        id: Uuid::new_v4(),
        timestamp: crate::records::now(),
        delivery_no: shipment.delivery_no.clone(),
        ship_date: Some(shipment.ship_date),
        mgmt_no: item.mgmt_no.clone(),
        item: item.item.clone(),
        serial_no: serial_no.to_string(),
        shipped_qty,
        invoice_no: shipment.invoice_no.clone(),
        shipping_method: shipment.shipping_method.clone(),
        actor: shipment.actor.clone(),
        note: "batch delivery".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ItemKind, Status};

    fn dec(s: &str) -> Decimal4 {
        Decimal4::from_str(s).unwrap()
    }

    fn shipment() -> Shipment {
        Shipment {
            delivery_no: "D20260830-01".to_string(),
            ship_date: NaiveDate::from_ymd_opt(2026, 8, 30).unwrap(),
            invoice_no: "AWB-123".to_string(),
            shipping_method: "DHL".to_string(),
            actor: "tester".to_string(),
        }
    }

    fn store_with_item(qty: &str, status: Status) -> (RecordStore, Uuid) {
        let mut store = RecordStore::default();
        let mut item = LineItem::new(
            "Q-1",
            ItemKind::Export,
            "Acme",
            "controller",
            "CX-100",
            dec(qty),
            dec("100"),
            dec("0.1"),
            "EUR",
        );
        item.status = status;
        let id = item.id;
        store.items.push(item);
        (store, id)
    }

    #[test]
    fn test_partial_split_conserves_qty_and_money() {
        let (mut store, id) = store_with_item("10", Status::AwaitingDelivery);

        let outcome = apply_delivery(&mut store, id, dec("4"), "SN-1", &shipment()).unwrap();
        let (remainder_id, fulfilled_id) = match outcome {
            DeliveryOutcome::Split {
                remainder,
                fulfilled,
                ..
            } => (remainder, fulfilled),
            other => panic!("expected split, got {:?}", other),
        };

        let remainder = store.item_by_id(remainder_id).unwrap();
        let fulfilled = store.item_by_id(fulfilled_id).unwrap();

        assert_eq!(remainder.qty, dec("6"));
        assert_eq!(remainder.supply_amount, dec("600"));
        assert_eq!(remainder.tax_amount, dec("60"));
        assert_eq!(remainder.total_amount, dec("660"));
        assert_eq!(remainder.status, Status::AwaitingDelivery);
        assert_eq!(remainder.ship_date, None);

        assert_eq!(fulfilled.qty, dec("4"));
        assert_eq!(fulfilled.supply_amount, dec("400"));
        assert_eq!(fulfilled.tax_amount, dec("40"));
        assert_eq!(fulfilled.total_amount, dec("440"));
        assert_eq!(fulfilled.paid_amount, Decimal4::ZERO);
        assert_eq!(fulfilled.unpaid_amount, dec("440"));
        assert_eq!(fulfilled.status, Status::DeliveredAwaitingPayment);
        assert_eq!(fulfilled.mgmt_no, remainder.mgmt_no);
        assert_eq!(fulfilled.invoice_no, "AWB-123");

        // Exact conservation
        assert_eq!(remainder.qty + fulfilled.qty, dec("10"));
        assert_eq!(remainder.total_amount + fulfilled.total_amount, dec("1100"));
        assert!(remainder.invariants_hold());
        assert!(fulfilled.invariants_hold());

        assert_eq!(store.deliveries.len(), 1);
        let rec = &store.deliveries[0];
        assert_eq!(rec.shipped_qty, dec("4"));
        assert_eq!(rec.serial_no, "SN-1");
        assert_eq!(rec.delivery_no, "D20260830-01");
    }

    #[test]
    fn test_full_shipment_in_place() {
        let (mut store, id) = store_with_item("10", Status::Order);

        let outcome = apply_delivery(&mut store, id, dec("10"), "SN-1", &shipment()).unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Full { .. }));

        assert_eq!(store.items.len(), 1);
        let item = &store.items[0];
        assert_eq!(item.status, Status::DeliveredAwaitingPayment);
        assert_eq!(item.ship_date, Some(NaiveDate::from_ymd_opt(2026, 8, 30).unwrap()));
        assert_eq!(item.unpaid_amount, item.total_amount);
        assert!(item.invariants_hold());
        assert_eq!(store.deliveries.len(), 1);
    }

    #[test]
    fn test_full_shipment_of_paid_item_completes() {
        let (mut store, id) = store_with_item("10", Status::AwaitingDeliveryPaymentDone);

        apply_delivery(&mut store, id, dec("10"), "-", &shipment()).unwrap();
        assert_eq!(store.items[0].status, Status::Complete);
    }

    #[test]
    fn test_zero_quantity_is_noop() {
        let (mut store, id) = store_with_item("10", Status::Order);

        let outcome = apply_delivery(&mut store, id, Decimal4::ZERO, "-", &shipment()).unwrap();
        assert_eq!(outcome, DeliveryOutcome::Noop);
        assert!(store.deliveries.is_empty());
        assert_eq!(store.items[0].qty, dec("10"));
        assert_eq!(store.items[0].status, Status::Order);
    }

    #[test]
    fn test_over_delivery_rejected() {
        let (mut store, id) = store_with_item("10", Status::Order);

        let err = apply_delivery(&mut store, id, dec("11"), "-", &shipment()).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.deliveries.is_empty());
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let (mut store, id) = store_with_item("10", Status::Order);

        let err = apply_delivery(&mut store, id, dec("-1"), "-", &shipment()).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_non_shippable_status_rejected() {
        for status in [
            Status::DeliveredAwaitingPayment,
            Status::Complete,
            Status::Cancelled,
            Status::OnHold,
        ] {
            let (mut store, id) = store_with_item("10", status);
            let err = apply_delivery(&mut store, id, dec("1"), "-", &shipment()).unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }
    }

    #[test]
    fn test_fractional_quantity_split() {
        let (mut store, id) = store_with_item("2.5", Status::AwaitingDelivery);

        apply_delivery(&mut store, id, dec("1.5"), "-", &shipment()).unwrap();
        assert_eq!(store.items.len(), 2);
        assert_eq!(store.items[0].qty, dec("1.0"));
        assert_eq!(store.items[1].qty, dec("1.5"));
        assert_eq!(
            store.items[0].total_amount + store.items[1].total_amount,
            dec("275")
        );
    }

    #[test]
    fn test_repeated_partials_do_not_drift() {
        let (mut store, id) = store_with_item("9", Status::AwaitingDelivery);

        // ship 3 three times; the last one exhausts the remainder in place
        apply_delivery(&mut store, id, dec("3"), "-", &shipment()).unwrap();
        apply_delivery(&mut store, id, dec("3"), "-", &shipment()).unwrap();
        apply_delivery(&mut store, id, dec("3"), "-", &shipment()).unwrap();

        let total_qty: Decimal4 = store.items.iter().map(|i| i.qty).sum();
        let total_amount: Decimal4 = store.items.iter().map(|i| i.total_amount).sum();
        assert_eq!(total_qty, dec("9"));
        assert_eq!(total_amount, dec("990"));
        assert!(store.items.iter().all(|i| i.invariants_hold()));
        assert_eq!(store.deliveries.len(), 3);
    }
}
