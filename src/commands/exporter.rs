// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, bail};

use crate::commands::entries::EntryRow;
use crate::commands::{entry_query, open, required};
use crate::wallet::Wallet;

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("entries", sub)) => {
            let wallet = open(sub)?;
            export_entries(&wallet, sub)
        }
        _ => Ok(()),
    }
}

pub fn export_entries(wallet: &Wallet, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = required(sub, "format")?.to_lowercase();
    let out = required(sub, "out")?;
    if fmt != "csv" && fmt != "json" {
        bail!("Unknown format: {} (use csv|json)", fmt);
    }

    let query = entry_query(sub)?;
    let mut entries = wallet.find_entries(&query)?;
    entries.sort();
    let mut rows = Vec::with_capacity(entries.len());
    for e in entries {
        rows.push(EntryRow::from_entry(wallet, e)?);
    }

    if fmt == "csv" {
        let mut wtr = csv::Writer::from_path(out)?;
        for row in &rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    } else {
        std::fs::write(out, serde_json::to_string_pretty(&rows)?)?;
    }
    println!("Exported {} entries to {}", rows.len(), out);
    Ok(())
}
