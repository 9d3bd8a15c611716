//! The workbook-backed record store.
//!
//! Loads the five related tables (Clients, LineItems, Payments, Deliveries,
//! AuditLog) from one workbook file into memory and serializes them back out
//! preserving table and column identity. The workbook is a plain UTF-8 file:
//! each table is a `[Name]` section line followed by one CSV table.
//!
//! Saving goes through a sibling temp file plus rename, so a subsequent
//! `load` observes either the whole previous workbook or the whole new one.

use crate::error::{Result, StoreError};
use crate::records::{AuditLogEntry, Client, DeliveryRecord, LineItem, PaymentRecord};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const TABLE_CLIENTS: &str = "Clients";
const TABLE_ITEMS: &str = "LineItems";
const TABLE_PAYMENTS: &str = "Payments";
const TABLE_DELIVERIES: &str = "Deliveries";
const TABLE_AUDIT: &str = "AuditLog";

const CLIENT_COLUMNS: [&str; 11] = [
    "name",
    "country",
    "currency",
    "address",
    "contact",
    "phone",
    "email",
    "shipping_account",
    "shipping_method",
    "notes",
    "registration_doc",
];

const ITEM_COLUMNS: [&str; 27] = [
    "id",
    "mgmt_no",
    "kind",
    "client_name",
    "item",
    "model",
    "description",
    "qty",
    "unit_price",
    "currency",
    "tax_rate",
    "supply_amount",
    "tax_amount",
    "total_amount",
    "paid_amount",
    "unpaid_amount",
    "status",
    "quote_date",
    "order_date",
    "expected_ship_date",
    "ship_date",
    "paid_date",
    "invoice_no",
    "shipping_method",
    "quote_doc",
    "order_doc",
    "note",
];

const PAYMENT_COLUMNS: [&str; 9] = [
    "id",
    "timestamp",
    "mgmt_no",
    "kind",
    "amount",
    "currency",
    "actor",
    "note",
    "evidence_doc",
];

const DELIVERY_COLUMNS: [&str; 12] = [
    "id",
    "timestamp",
    "delivery_no",
    "ship_date",
    "mgmt_no",
    "item",
    "serial_no",
    "shipped_qty",
    "invoice_no",
    "shipping_method",
    "actor",
    "note",
];

const AUDIT_COLUMNS: [&str; 4] = ["timestamp", "actor", "action", "detail"];

/// In-memory representation of the five workbook tables.
///
/// The store exclusively owns all tables for the duration of one
/// transaction; ledgers (payments, deliveries, audit log) are append-only.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    pub clients: Vec<Client>,
    pub items: Vec<LineItem>,
    pub payments: Vec<PaymentRecord>,
    pub deliveries: Vec<DeliveryRecord>,
    pub audit_log: Vec<AuditLogEntry>,
}

impl RecordStore {
    /// Loads the workbook at `path`.
    ///
    /// Fails with `NotFound` if the file is absent, `Permission` if it is
    /// locked by another process and `Format` on unreadable content. Missing
    /// tables come back empty; missing columns land on their
    /// deserialization defaults.
    pub fn load(path: &Path) -> Result<RecordStore> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::from_io(e, path))?;
        let store = Self::parse(&content)?;
        debug!(
            "loaded workbook {}: {} clients, {} items, {} payments, {} deliveries, {} log entries",
            path.display(),
            store.clients.len(),
            store.items.len(),
            store.payments.len(),
            store.deliveries.len(),
            store.audit_log.len()
        );
        Ok(store)
    }

    /// Loads the workbook, treating a missing file as an empty store.
    pub fn load_or_default(path: &Path) -> Result<RecordStore> {
        match Self::load(path) {
            Ok(store) => Ok(store),
            Err(StoreError::NotFound(_)) => {
                debug!("workbook {} absent, starting empty", path.display());
                Ok(RecordStore::default())
            }
            Err(e) => Err(e),
        }
    }

    fn parse(content: &str) -> Result<RecordStore> {
        let mut sections: Vec<(String, String)> = Vec::new();
        let mut current: Option<usize> = None;
        // Quoted CSV fields may span lines (free-text columns carry embedded
        // newlines), so a bracketed line only opens a section when no quoted
        // field is open. Doubled escape quotes contribute two to the count
        // and keep the parity intact.
        let mut in_quoted_field = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if !in_quoted_field && trimmed.starts_with('[') && trimmed.ends_with(']') {
                let name = trimmed[1..trimmed.len() - 1].trim().to_string();
                sections.push((name, String::new()));
                current = Some(sections.len() - 1);
            } else {
                match current {
                    Some(idx) => {
                        sections[idx].1.push_str(line);
                        sections[idx].1.push('\n');
                        if line.matches('"').count() % 2 == 1 {
                            in_quoted_field = !in_quoted_field;
                        }
                    }
                    None if trimmed.is_empty() => {}
                    None => {
                        return Err(StoreError::Format {
                            table: "workbook".to_string(),
                            message: format!("content before first table header: {:?}", trimmed),
                        })
                    }
                }
            }
        }

        let mut store = RecordStore::default();
        for (name, body) in sections {
            match name.as_str() {
                TABLE_CLIENTS => store.clients = parse_table(&name, &body)?,
                TABLE_ITEMS => store.items = parse_table(&name, &body)?,
                TABLE_PAYMENTS => store.payments = parse_table(&name, &body)?,
                TABLE_DELIVERIES => store.deliveries = parse_table(&name, &body)?,
                TABLE_AUDIT => store.audit_log = parse_table(&name, &body)?,
                _ => {
                    return Err(StoreError::Format {
                        table: name,
                        message: "unknown table".to_string(),
                    })
                }
            }
        }
        Ok(store)
    }

    /// Writes all five tables back to `path`.
    ///
    /// The workbook is rendered in full to a sibling temp file and renamed
    /// over the original, so either the whole table set is updated or none
    /// of it is. Fails with `Permission` if the file is locked.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf: Vec<u8> = Vec::new();
        write_table(&mut buf, TABLE_CLIENTS, &CLIENT_COLUMNS, &self.clients)?;
        write_table(&mut buf, TABLE_ITEMS, &ITEM_COLUMNS, &self.items)?;
        write_table(&mut buf, TABLE_PAYMENTS, &PAYMENT_COLUMNS, &self.payments)?;
        write_table(&mut buf, TABLE_DELIVERIES, &DELIVERY_COLUMNS, &self.deliveries)?;
        write_table(&mut buf, TABLE_AUDIT, &AUDIT_COLUMNS, &self.audit_log)?;

        let tmp = sibling_tmp(path);
        fs::write(&tmp, &buf).map_err(|e| StoreError::from_io(e, path))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::from_io(e, path)
        })?;
        debug!("saved workbook {}", path.display());
        Ok(())
    }

    /// Checks amount identities and quantity sign for every line item.
    pub fn validate(&self) -> Result<()> {
        for item in &self.items {
            if !item.invariants_hold() {
                return Err(StoreError::Validation(format!(
                    "line item {} ({} / {}) violates amount invariants",
                    item.id, item.mgmt_no, item.model
                )));
            }
        }
        Ok(())
    }

    /// Line items belonging to one order group, in table order.
    pub fn items_for<'a>(&'a self, mgmt_no: &'a str) -> impl Iterator<Item = &'a LineItem> {
        self.items.iter().filter(move |i| i.mgmt_no == mgmt_no)
    }

    pub fn item_by_id(&self, id: Uuid) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub(crate) fn item_index(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    /// Looks up a client by its unique name (weak reference, string match).
    pub fn find_client(&self, name: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.name == name)
    }

    /// Appends one audit log entry.
    pub fn append_log(&mut self, actor: &str, action: &str, detail: &str) {
        self.audit_log.push(AuditLogEntry::new(actor, action, detail));
    }

    /// Next sequential delivery batch number for `date`, e.g. `D20260830-02`.
    pub fn next_delivery_no(&self, date: NaiveDate) -> String {
        let prefix = format!("D{}", date.format("%Y%m%d"));
        let existing: BTreeSet<&str> = self
            .deliveries
            .iter()
            .map(|d| d.delivery_no.as_str())
            .filter(|no| no.starts_with(&prefix))
            .collect();
        format!("{}-{:02}", prefix, existing.len() + 1)
    }
}

fn parse_table<T: DeserializeOwned>(name: &str, body: &str) -> Result<Vec<T>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(body.trim_start_matches('\n').as_bytes());

    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        let row = result.map_err(|e| StoreError::Format {
            table: name.to_string(),
            message: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_table<T: Serialize>(
    buf: &mut Vec<u8>,
    name: &str,
    columns: &[&str],
    rows: &[T],
) -> Result<()> {
    buf.extend_from_slice(format!("[{}]\n", name).as_bytes());

    // Header written explicitly so empty tables keep their column identity.
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let rendered = writer
        .into_inner()
        .map_err(|e| {
            StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
    buf.extend_from_slice(&rendered);
    buf.push(b'\n');
    Ok(())
}

fn sibling_tmp(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Copies the workbook into a `backup/` folder next to it, suffixed with a
/// timestamp. Returns the backup path.
pub fn backup(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let dir = path.parent().unwrap_or_else(|| Path::new(".")).join("backup");
    fs::create_dir_all(&dir).map_err(|e| StoreError::from_io(e, path))?;

    let stamp = crate::records::now().format("%Y%m%d_%H%M%S");
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("workbook");
    let dest = dir.join(format!("{}_{}.bak", file_name, stamp));
    fs::copy(path, &dest).map_err(|e| StoreError::from_io(e, path))?;
    debug!("backed up {} to {}", path.display(), dest.display());
    Ok(dest)
}
