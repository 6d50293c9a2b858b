// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod categories;
pub mod doctor;
pub mod entries;
pub mod exporter;
pub mod reports;
pub mod rewrite;
pub mod summary;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use dialoguer::Confirm;

use crate::daterange::DateSpec;
use crate::models::EntryType;
use crate::query::{AmountSpec, Query};
use crate::utils::parse_decimal;
use crate::wallet::Wallet;
use crate::writer::{Classification, Deletion, Verbosity, WriteOptions, WriteReport};

pub fn required<'a>(m: &'a clap::ArgMatches, id: &str) -> Result<&'a String> {
    m.get_one::<String>(id)
        .ok_or_else(|| anyhow!("missing required argument '{}'", id))
}

pub fn db_path(m: &clap::ArgMatches) -> Result<PathBuf> {
    m.get_one::<String>("db")
        .map(|s| PathBuf::from(s.trim()))
        .ok_or_else(|| anyhow!("no backup given; pass --db <PATH>"))
}

pub fn open(m: &clap::ArgMatches) -> Result<Wallet> {
    let path = db_path(m)?;
    Wallet::open(&path).with_context(|| format!("Failed to read backup {}", path.display()))
}

pub fn parse_kind(s: &str) -> Result<EntryType> {
    match s.trim().to_lowercase().as_str() {
        "income" | "inc" | "+1" | "1" => Ok(EntryType::Income),
        "expense" | "exp" | "-1" => Ok(EntryType::Expense),
        "transfer" | "tr" | "0" => Ok(EntryType::Transfer),
        other => bail!("Unknown kind '{}' (use income|expense|transfer)", other),
    }
}

pub fn write_options(m: &clap::ArgMatches) -> Result<WriteOptions> {
    let mut opts = WriteOptions::default();
    if let Some(name) = m.get_one::<String>("name") {
        opts.new_db_name = name.clone();
    }
    opts.overwrite = m.get_flag("overwrite");
    opts.safe_delete = m.get_flag("safe-delete");
    opts.strict = m.get_flag("strict");
    if let Some(level) = m.get_one::<u8>("verbose") {
        opts.verbose = Verbosity::from_level(*level)?;
    }
    Ok(opts)
}

fn confirm_deletion(deletion: &Deletion) -> bool {
    Confirm::new()
        .with_prompt(format!("Delete {}?", deletion))
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// Writes the wallet as a new backup next to the one it was read from.
pub fn commit(wallet: &mut Wallet, m: &clap::ArgMatches) -> Result<WriteReport> {
    let opts = write_options(m)?;
    let report = if opts.safe_delete {
        wallet.write_confirmed(None, &opts, &mut confirm_deletion)?
    } else {
        wallet.write(None, &opts)?
    };
    println!(
        "Wrote {} (new {}, updated {}, deleted {}, warnings {})",
        report.path.display(),
        report.count(Classification::New),
        report.count(Classification::Updated),
        report.count(Classification::Deleted),
        report.warnings().count()
    );
    Ok(report)
}

/// Query built from the entry filter flags shared by `entry list` and `export`.
pub fn entry_query(m: &clap::ArgMatches) -> Result<Query<'static>> {
    let mut q = Query::new();
    if let Some(date) = m.get_one::<String>("date") {
        q = q.date(date.trim());
    }
    let from = m.get_one::<String>("from").map(|s| s.trim());
    let to = m.get_one::<String>("to").map(|s| s.trim());
    if from.is_some() || to.is_some() {
        q = q.date(DateSpec::between(from, to));
    }
    if let Some(parties) = m.get_many::<String>("account") {
        q = q.account_any(parties.map(|s| s.trim().to_string()));
    }
    if let Some(cats) = m.get_many::<String>("category") {
        q = q.category_any(cats.map(|s| s.trim().to_string()));
    }
    if let Some(item) = m.get_one::<String>("item") {
        q = q.item(item);
    }
    if let Some(kind) = m.get_one::<String>("kind") {
        q = q.kind(parse_kind(kind)?);
    }
    let min = m
        .get_one::<String>("min")
        .map(|s| parse_decimal(s.trim()))
        .transpose()?;
    let max = m
        .get_one::<String>("max")
        .map(|s| parse_decimal(s.trim()))
        .transpose()?;
    if min.is_some() || max.is_some() {
        q = q.amount(AmountSpec::between(min, max));
    }
    Ok(q)
}
