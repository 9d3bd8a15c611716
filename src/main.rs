//! Order Ledger CLI
//!
//! Thin command-line surface over the record store: create an empty
//! workbook or print a line-item summary. Data entry goes through the form
//! front-end, which drives the same library API.
//!
//! # Usage
//!
//! ```bash
//! order-ledger init orders.wb
//! order-ledger report orders.wb > summary.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: set to `debug` or `warn` to control logging verbosity

use order_ledger::{RecordStore, Result, StoreError};
use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        return Err(StoreError::MissingArgument);
    }

    let command = args[1].as_str();
    let path = Path::new(&args[2]);

    match command {
        "init" => init(path),
        "report" => report(path),
        _ => Err(StoreError::MissingArgument),
    }
}

/// Creates an empty workbook with all five tables and their headers.
fn init(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(StoreError::Validation(format!(
            "refusing to overwrite existing workbook {}",
            path.display()
        )));
    }
    RecordStore::default().save(path)?;
    println!("created {}", path.display());
    Ok(())
}

/// Prints a line-item summary CSV to stdout, in table order.
fn report(path: &Path) -> Result<()> {
    let store = RecordStore::load(path)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(
        handle,
        "mgmt_no,client,model,qty,total_amount,paid_amount,unpaid_amount,status"
    )?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(handle);

    for item in &store.items {
        writer.write_record([
            item.mgmt_no.clone(),
            item.client_name.clone(),
            item.model.clone(),
            item.qty.to_string(),
            item.total_amount.to_string(),
            item.paid_amount.to_string(),
            item.unpaid_amount.to_string(),
            item.status.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
