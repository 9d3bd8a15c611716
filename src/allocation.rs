//! Payment waterfall allocation and ledger reconciliation.
//!
//! Distributes one incoming payment across the outstanding balances of one
//! or more order groups in table order (oldest registered first). Shortfalls
//! within the currency-specific remittance-fee tolerance can be written off
//! as fee-adjustment ledger entries after caller confirmation.
//!
//! Balances are never adjusted incrementally: after recording the new ledger
//! entries, every touched group's paid/unpaid amounts are recomputed by
//! replaying its full payment history. Replaying the same ledger twice
//! yields the same balances, which protects against double application when
//! a transaction is resubmitted.

use crate::error::{Result, StoreError};
use crate::money::Decimal4;
use crate::records::{LineItem, PaymentRecord, Status};
use crate::store::RecordStore;
use chrono::NaiveDate;
use log::debug;
use uuid::Uuid;

/// Small-remainder tolerance per currency.
///
/// Foreign remittances lose bank fees in transit, so a small shortfall is
/// normal noise rather than an unpaid balance. KRW transfers carry a larger
/// absolute threshold than foreign currencies.
pub fn fee_tolerance(currency: &str) -> Decimal4 {
    if currency.eq_ignore_ascii_case("KRW") {
        Decimal4::from(5000)
    } else {
        Decimal4::from(200)
    }
}

/// Outcome of one allocation run.
#[derive(Debug, Default)]
pub struct AllocationSummary {
    /// Ids of the deposit records written, one per item that received funds.
    pub deposits: Vec<Uuid>,
    /// Ids of the fee-adjustment records written for tolerated shortfalls.
    pub fees: Vec<Uuid>,
    /// Total amount allocated as deposits. Never exceeds the input amount.
    pub allocated: Decimal4,
    /// Total shortfall written off as fees.
    pub written_off: Decimal4,
    /// Unallocated remainder of the incoming amount.
    pub leftover: Decimal4,
}

/// Applies `amount` against the outstanding balances of the given order
/// groups.
///
/// Items are visited in their existing table order; this ordering decides
/// which obligations are paid off first when the payment under-covers the
/// total. `confirm` is invoked when an item would be left with a shortfall
/// within [`fee_tolerance`]; returning `true` settles the item in full and
/// writes the shortfall off as a fee-adjustment record.
pub fn allocate<F>(
    store: &mut RecordStore,
    mgmt_nos: &[&str],
    amount: Decimal4,
    pay_date: NaiveDate,
    actor: &str,
    mut confirm: F,
) -> Result<AllocationSummary>
where
    F: FnMut(&LineItem, Decimal4) -> bool,
{
    if !amount.is_positive() {
        return Err(StoreError::Validation(
            "payment amount must be positive".to_string(),
        ));
    }
    if mgmt_nos.is_empty() {
        return Err(StoreError::Validation(
            "no order groups selected for payment".to_string(),
        ));
    }

    // Force balances back to ledger truth before allocating against them.
    for mgmt_no in mgmt_nos {
        reconcile_group(store, mgmt_no);
    }

    let mut summary = AllocationSummary::default();
    let mut budget = amount;
    let mut new_records: Vec<PaymentRecord> = Vec::new();

    for item in &store.items {
        if !budget.is_positive() {
            break;
        }
        if !mgmt_nos.iter().any(|m| *m == item.mgmt_no) {
            continue;
        }
        if item.status == Status::Cancelled || !item.unpaid_amount.is_positive() {
            continue;
        }

        let (pay, fee) = if budget >= item.unpaid_amount {
            (item.unpaid_amount, Decimal4::ZERO)
        } else {
            let diff = item.unpaid_amount - budget;
            if diff <= fee_tolerance(&item.currency) && confirm(item, diff) {
                (budget, diff)
            } else {
                (budget, Decimal4::ZERO)
            }
        };

        if pay.is_positive() {
            let record = PaymentRecord::deposit(
                &item.mgmt_no,
                pay,
                &item.currency,
                actor,
                format!("bulk deposit ({})", pay_date),
            );
            summary.deposits.push(record.id);
            summary.allocated += pay;
            new_records.push(record);
            budget -= pay;
        }
        if fee.is_positive() {
            let record = PaymentRecord::fee_adjustment(&item.mgmt_no, fee, &item.currency, actor);
            summary.fees.push(record.id);
            summary.written_off += fee;
            new_records.push(record);
        }
    }

    if summary.deposits.is_empty() && summary.fees.is_empty() {
        return Err(StoreError::Validation(
            "no outstanding balance to allocate against".to_string(),
        ));
    }

    store.payments.extend(new_records);
    summary.leftover = budget;

    // Recompute from the full ledger, then stamp paid dates on items the
    // payment settled.
    for mgmt_no in mgmt_nos {
        reconcile_group(store, mgmt_no);
    }
    for item in store.items.iter_mut() {
        if mgmt_nos.iter().any(|m| *m == item.mgmt_no)
            && item.unpaid_amount.is_zero()
            && item.total_amount.is_positive()
            && item.paid_date.is_none()
        {
            item.paid_date = Some(pay_date);
        }
    }

    debug!(
        "allocated {} across {} groups: {} deposits, {} fees, leftover {}",
        amount,
        mgmt_nos.len(),
        summary.deposits.len(),
        summary.fees.len(),
        summary.leftover
    );
    Ok(summary)
}

/// Recomputes paid/unpaid amounts for every item of one order group by
/// replaying the full payment ledger for its `mgmt_no`.
///
/// The group's ledger total (deposits plus fee adjustments) is distributed
/// across its items in table order. Idempotent: running the replay twice
/// with the same ledger produces identical balances. Items whose unpaid
/// balance reaches zero take the payment-side status transition; cancelled
/// items are skipped.
pub fn reconcile_group(store: &mut RecordStore, mgmt_no: &str) {
    let ledger_total: Decimal4 = store
        .payments
        .iter()
        .filter(|p| p.mgmt_no == mgmt_no)
        .map(|p| p.amount)
        .sum();

    let mut remaining = ledger_total;
    for item in store.items.iter_mut().filter(|i| i.mgmt_no == mgmt_no) {
        if item.status == Status::Cancelled {
            continue;
        }
        let alloc = remaining.min(item.total_amount);
        item.paid_amount = alloc;
        item.recompute_amounts();
        remaining -= alloc;

        if item.unpaid_amount.is_zero()
            && item.total_amount.is_positive()
            && !item.status.is_terminal()
            && item.status != Status::OnHold
        {
            item.status = item.status.after_full_payment();
        }
    }
}
