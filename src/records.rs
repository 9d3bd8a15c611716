//! Typed records for the five workbook tables.
//!
//! Every table maps to an explicit record type rather than a dynamically
//! typed row bag; columns absent from a loaded workbook land on
//! deserialization defaults (the `-` sentinel for free text, zero for
//! numbers, a fresh id for missing id columns).

use crate::money::Decimal4;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current wall-clock time without timezone, as stored in the workbook.
pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn dash() -> String {
    "-".to_string()
}

/// Lifecycle state of a line item.
///
/// Terminal states are `Complete` and `Cancelled`; `Cancelled` and `OnHold`
/// are reachable from any non-terminal state via explicit user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "quote")]
    Quote,
    #[serde(rename = "order")]
    Order,
    #[serde(rename = "in-production")]
    InProduction,
    #[serde(rename = "awaiting-delivery")]
    AwaitingDelivery,
    /// Shipped, payment outstanding.
    #[serde(rename = "delivered/awaiting-payment")]
    DeliveredAwaitingPayment,
    /// Paid in full, shipment outstanding.
    #[serde(rename = "awaiting-delivery/payment-done")]
    AwaitingDeliveryPaymentDone,
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "on-hold")]
    OnHold,
}

impl Status {
    /// True for states no further transition may leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Complete | Status::Cancelled)
    }

    /// True if the item can still be delivered against.
    ///
    /// Already-shipped, complete, cancelled and on-hold rows are excluded
    /// from delivery processing.
    pub fn is_shippable(&self) -> bool {
        !matches!(
            self,
            Status::DeliveredAwaitingPayment
                | Status::Complete
                | Status::Cancelled
                | Status::OnHold
        )
    }

    /// State after a full shipment.
    pub fn after_shipment(&self) -> Status {
        match self {
            Status::AwaitingDeliveryPaymentDone => Status::Complete,
            _ => Status::DeliveredAwaitingPayment,
        }
    }

    /// State after the unpaid balance reaches zero.
    pub fn after_full_payment(&self) -> Status {
        match self {
            Status::DeliveredAwaitingPayment => Status::Complete,
            _ => Status::AwaitingDeliveryPaymentDone,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Quote => "quote",
            Status::Order => "order",
            Status::InProduction => "in-production",
            Status::AwaitingDelivery => "awaiting-delivery",
            Status::DeliveredAwaitingPayment => "delivered/awaiting-payment",
            Status::AwaitingDeliveryPaymentDone => "awaiting-delivery/payment-done",
            Status::Complete => "complete",
            Status::Cancelled => "cancelled",
            Status::OnHold => "on-hold",
        };
        f.write_str(s)
    }
}

/// Domestic sale or export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemKind {
    #[default]
    #[serde(rename = "domestic")]
    Domestic,
    #[serde(rename = "export")]
    Export,
}

/// A customer, keyed by unique name.
///
/// Line items reference clients by name only; there is no enforced foreign
/// key, lookup is by string match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    #[serde(default = "dash")]
    pub country: String,
    #[serde(default = "dash")]
    pub currency: String,
    #[serde(default = "dash")]
    pub address: String,
    #[serde(default = "dash")]
    pub contact: String,
    #[serde(default = "dash")]
    pub phone: String,
    #[serde(default = "dash")]
    pub email: String,
    /// Default carrier account used to prefill deliveries.
    #[serde(default = "dash")]
    pub shipping_account: String,
    /// Default shipping method used to prefill deliveries.
    #[serde(default = "dash")]
    pub shipping_method: String,
    #[serde(default = "dash")]
    pub notes: String,
    /// Path to the business registration document.
    #[serde(default = "dash")]
    pub registration_doc: String,
}

impl Client {
    pub fn new(name: impl Into<String>, country: impl Into<String>, currency: impl Into<String>) -> Self {
        Client {
            name: name.into(),
            country: country.into(),
            currency: currency.into(),
            address: dash(),
            contact: dash(),
            phone: dash(),
            email: dash(),
            shipping_account: dash(),
            shipping_method: dash(),
            notes: dash(),
            registration_doc: dash(),
        }
    }
}

/// One item row within an order, independently shippable and payable.
///
/// # Invariants
///
/// - `supply_amount == qty * unit_price`
/// - `tax_amount == supply_amount * tax_rate`
/// - `total_amount == supply_amount + tax_amount`
/// - `unpaid_amount == total_amount - paid_amount`
/// - `qty >= 0`
///
/// Amounts are only ever derived through [`LineItem::recompute_amounts`],
/// never by subtracting from stale totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Stable generated id, independent of table position.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Order/quote group identifier shared by all items of one order.
    pub mgmt_no: String,
    #[serde(default)]
    pub kind: ItemKind,
    pub client_name: String,
    #[serde(default = "dash")]
    pub item: String,
    #[serde(default = "dash")]
    pub model: String,
    #[serde(default = "dash")]
    pub description: String,
    #[serde(default)]
    pub qty: Decimal4,
    #[serde(default)]
    pub unit_price: Decimal4,
    #[serde(default = "dash")]
    pub currency: String,
    /// Tax rate as a fraction, e.g. 0.1 for 10%.
    #[serde(default)]
    pub tax_rate: Decimal4,
    #[serde(default)]
    pub supply_amount: Decimal4,
    #[serde(default)]
    pub tax_amount: Decimal4,
    #[serde(default)]
    pub total_amount: Decimal4,
    #[serde(default)]
    pub paid_amount: Decimal4,
    #[serde(default)]
    pub unpaid_amount: Decimal4,
    #[serde(default)]
    pub status: Status,
    #[serde(default, with = "opt_date")]
    pub quote_date: Option<NaiveDate>,
    #[serde(default, with = "opt_date")]
    pub order_date: Option<NaiveDate>,
    #[serde(default, with = "opt_date")]
    pub expected_ship_date: Option<NaiveDate>,
    #[serde(default, with = "opt_date")]
    pub ship_date: Option<NaiveDate>,
    #[serde(default, with = "opt_date")]
    pub paid_date: Option<NaiveDate>,
    /// Carrier tracking/invoice number, set at shipment.
    #[serde(default = "dash")]
    pub invoice_no: String,
    #[serde(default = "dash")]
    pub shipping_method: String,
    /// Path to the issued quote document.
    #[serde(default = "dash")]
    pub quote_doc: String,
    /// Path to the received purchase order document.
    #[serde(default = "dash")]
    pub order_doc: String,
    #[serde(default = "dash")]
    pub note: String,
}

impl LineItem {
    /// Creates a new item with derived amounts and an unpaid balance.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mgmt_no: impl Into<String>,
        kind: ItemKind,
        client_name: impl Into<String>,
        item: impl Into<String>,
        model: impl Into<String>,
        qty: Decimal4,
        unit_price: Decimal4,
        tax_rate: Decimal4,
        currency: impl Into<String>,
    ) -> Self {
        let mut li = LineItem {
            id: Uuid::new_v4(),
            mgmt_no: mgmt_no.into(),
            kind,
            client_name: client_name.into(),
            item: item.into(),
            model: model.into(),
            description: dash(),
            qty,
            unit_price,
            currency: currency.into(),
            tax_rate,
            supply_amount: Decimal4::ZERO,
            tax_amount: Decimal4::ZERO,
            total_amount: Decimal4::ZERO,
            paid_amount: Decimal4::ZERO,
            unpaid_amount: Decimal4::ZERO,
            status: Status::Quote,
            quote_date: None,
            order_date: None,
            expected_ship_date: None,
            ship_date: None,
            paid_date: None,
            invoice_no: dash(),
            shipping_method: dash(),
            quote_doc: dash(),
            order_doc: dash(),
            note: dash(),
        };
        li.recompute_amounts();
        li
    }

    /// Rederives all amount columns from `qty`, `unit_price`, `tax_rate`
    /// and `paid_amount`.
    pub fn recompute_amounts(&mut self) {
        self.supply_amount = self.qty * self.unit_price;
        self.tax_amount = self.supply_amount * self.tax_rate;
        self.total_amount = self.supply_amount + self.tax_amount;
        self.unpaid_amount = self.total_amount - self.paid_amount;
    }

    /// Checks the amount identities and `qty >= 0`.
    pub fn invariants_hold(&self) -> bool {
        !self.qty.is_negative()
            && self.supply_amount == self.qty * self.unit_price
            && self.tax_amount == self.supply_amount * self.tax_rate
            && self.total_amount == self.supply_amount + self.tax_amount
            && self.unpaid_amount == self.total_amount - self.paid_amount
    }
}

/// Ledger entry kind for the payments table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    #[serde(rename = "deposit")]
    Deposit,
    /// A tolerated shortfall written off rather than collected.
    #[serde(rename = "fee-adjustment")]
    FeeAdjustment,
}

/// Append-only payment ledger entry.
///
/// The authoritative history from which a line item's paid/unpaid amounts
/// can always be recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    pub mgmt_no: String,
    pub kind: PaymentKind,
    pub amount: Decimal4,
    #[serde(default = "dash")]
    pub currency: String,
    #[serde(default = "dash")]
    pub actor: String,
    #[serde(default = "dash")]
    pub note: String,
    /// Path to remittance evidence, if attached.
    #[serde(default = "dash")]
    pub evidence_doc: String,
}

impl PaymentRecord {
    pub fn deposit(
        mgmt_no: impl Into<String>,
        amount: Decimal4,
        currency: impl Into<String>,
        actor: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        PaymentRecord {
            id: Uuid::new_v4(),
            timestamp: now(),
            mgmt_no: mgmt_no.into(),
            kind: PaymentKind::Deposit,
            amount,
            currency: currency.into(),
            actor: actor.into(),
            note: note.into(),
            evidence_doc: dash(),
        }
    }

    pub fn fee_adjustment(
        mgmt_no: impl Into<String>,
        amount: Decimal4,
        currency: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        PaymentRecord {
            id: Uuid::new_v4(),
            timestamp: now(),
            mgmt_no: mgmt_no.into(),
            kind: PaymentKind::FeeAdjustment,
            amount,
            currency: currency.into(),
            actor: actor.into(),
            note: "remainder written off".to_string(),
            evidence_doc: dash(),
        }
    }
}

/// Append-only shipment ledger entry, paralleling [`PaymentRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    /// Delivery batch number, e.g. `D20260830-01`.
    pub delivery_no: String,
    #[serde(default, with = "opt_date")]
    pub ship_date: Option<NaiveDate>,
    pub mgmt_no: String,
    #[serde(default = "dash")]
    pub item: String,
    #[serde(default = "dash")]
    pub serial_no: String,
    pub shipped_qty: Decimal4,
    #[serde(default = "dash")]
    pub invoice_no: String,
    #[serde(default = "dash")]
    pub shipping_method: String,
    #[serde(default = "dash")]
    pub actor: String,
    #[serde(default = "dash")]
    pub note: String,
}

/// Append-only audit log entry, one per committed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    pub actor: String,
    pub action: String,
    pub detail: String,
}

impl AuditLogEntry {
    pub fn new(actor: impl Into<String>, action: impl Into<String>, detail: impl Into<String>) -> Self {
        AuditLogEntry {
            timestamp: now(),
            actor: actor.into(),
            action: action.into(),
            detail: detail.into(),
        }
    }
}

/// Serde helper for optional dates with the `-` workbook sentinel.
pub(crate) mod opt_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
            None => serializer.serialize_str("-"),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Ok(None);
        }
        NaiveDate::parse_from_str(trimmed, FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// Serde helper for ledger timestamps (`YYYY-MM-DD HH:MM:SS`).
pub(crate) mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(s.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}
