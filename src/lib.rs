//! # Order Ledger
//!
//! A single-user order/fulfillment tracker that persists clients, order
//! line items, payments, deliveries and an audit log in one shared workbook
//! file, with transactional load-mutate-save semantics on top.
//!
//! ## Design Principles
//!
//! - **Fixed-point arithmetic**: 4 decimal places via `rust_decimal`
//! - **Typed tables**: five explicit record types, stable uuid identities
//! - **Amounts derived, never patched**: `qty * unit_price * tax_rate` is
//!   the only derivation path for money columns
//! - **Ledger is truth**: paid/unpaid balances are replayed from the
//!   append-only payment history, never adjusted incrementally
//! - **All-or-nothing commits**: a failed mutation leaves the workbook
//!   byte-for-byte unchanged
//!
//! ## Example
//!
//! ```no_run
//! use order_ledger::{Coordinator, Decimal4, ItemKind, LineItem};
//! use std::str::FromStr;
//!
//! let mut coord = Coordinator::new("orders.wb", "alice");
//! coord.execute("order entry", |store| {
//!     store.items.push(LineItem::new(
//!         "Q-2026-001",
//!         ItemKind::Export,
//!         "Acme",
//!         "controller",
//!         "CX-100",
//!         Decimal4::from(10),
//!         Decimal4::from(100),
//!         Decimal4::from_str("0.1").unwrap(),
//!         "EUR",
//!     ));
//!     Ok("created Q-2026-001".to_string())
//! }).unwrap();
//! ```

pub mod allocation;
pub mod coordinator;
pub mod error;
pub mod fulfillment;
pub mod guard;
pub mod money;
pub mod records;
pub mod store;

pub use allocation::{allocate, fee_tolerance, reconcile_group, AllocationSummary};
pub use coordinator::{Commit, Coordinator};
pub use error::{Result, StoreError};
pub use fulfillment::{apply_delivery, DeliveryOutcome, Shipment};
pub use guard::{fingerprint, Fingerprint};
pub use money::Decimal4;
pub use records::{
    AuditLogEntry, Client, DeliveryRecord, ItemKind, LineItem, PaymentKind, PaymentRecord, Status,
};
pub use store::{backup, RecordStore};
