// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow, bail};
use serde::Serialize;

use crate::commands::{commit, entry_query, open, parse_kind, required};
use crate::models::{Entity, Entry, EntryType, NEW_MWID, Party};
use crate::query::{Selector, resolve_categories};
use crate::utils::{fmt_money, maybe_print_json, parse_date, parse_decimal, pretty_table};
use crate::wallet::{Namespace, Wallet};

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(sub)?,
        Some(("list", sub)) => list(sub)?,
        Some(("rm", sub)) => rm(sub)?,
        _ => {}
    }
    Ok(())
}

/// Account for `@Name`, counterpart (created on demand) for anything else.
fn party(wallet: &mut Wallet, raw: &str) -> Result<Party> {
    let raw = raw.trim();
    if let Some(name) = raw.strip_prefix('@') {
        let account = wallet
            .account_named(name)
            .ok_or_else(|| anyhow!("Account '@{}' not found", name))?;
        return Ok(Party::from(account));
    }
    Ok(Party::from(wallet.counterpart_or_create(raw)?))
}

fn add(sub: &clap::ArgMatches) -> Result<()> {
    let mut wallet = open(sub)?;
    let date = parse_date(required(sub, "date")?.trim())?;
    let amount = parse_decimal(required(sub, "amount")?.trim())?;
    let kind = parse_kind(required(sub, "kind")?)?;
    let source = party(&mut wallet, required(sub, "from")?)?;
    let target = party(&mut wallet, required(sub, "to")?)?;

    let sel = Selector::from(required(sub, "category")?.trim());
    let matches = resolve_categories(&wallet, &sel)?;
    let category = matches
        .iter()
        .filter_map(|uid| wallet.category(*uid))
        .find(|c| c.kind() == kind)
        .ok_or_else(|| anyhow!("No {} category matches {:?}", kind.label(), sel))?;

    let mut entry = Entry::new(NEW_MWID, amount, date, kind, source, target, category)?;
    if let Some(item) = sub.get_one::<String>("item") {
        entry.set_item(item);
    }
    if let Some(details) = sub.get_one::<String>("details") {
        entry.set_details(details);
    }
    entry.is_bill = sub.get_flag("bill");
    println!("Recorded {}", entry);
    wallet.entries.push(entry);
    commit(&mut wallet, sub)?;
    Ok(())
}

fn rm(sub: &clap::ArgMatches) -> Result<()> {
    let mut wallet = open(sub)?;
    let mwid = *sub
        .get_one::<i64>("MWID")
        .ok_or_else(|| anyhow!("missing entry id"))?;
    let transfer = sub.get_flag("transfer");
    let before = wallet.entries.len();
    wallet
        .entries
        .retain(|e| !(e.mwid() == mwid && (e.kind() == EntryType::Transfer) == transfer));
    if wallet.entries.len() == before {
        bail!("Entry {} not found", mwid);
    }
    println!("Removed entry {}", mwid);
    commit(&mut wallet, sub)?;
    Ok(())
}

fn list(sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let wallet = open(sub)?;
    let data = query_rows(&wallet, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.mwid.to_string(),
                    r.date.clone(),
                    r.kind.clone(),
                    r.source.clone(),
                    r.target.clone(),
                    r.amount.clone(),
                    r.category.clone(),
                    r.item.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Date", "Kind", "From", "To", "Amount", "Category", "Item"],
                rows,
            )
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct EntryRow {
    pub mwid: i64,
    pub date: String,
    pub kind: String,
    pub source: String,
    pub target: String,
    pub amount: String,
    pub category: String,
    pub item: String,
    pub details: String,
}

impl EntryRow {
    pub fn from_entry(ns: &Namespace, e: &Entry) -> crate::errors::Result<Self> {
        Ok(Self {
            mwid: e.mwid(),
            date: e.date().to_string(),
            kind: e.kind().label().to_string(),
            source: ns.party_name(e.source())?,
            target: ns.party_name(e.target())?,
            amount: fmt_money(&e.amount()),
            category: ns.category_of(e)?.repr_name(),
            item: e.item().to_string(),
            details: e.details().to_string(),
        })
    }
}

/// Matching entries, newest first, cut at `--limit`.
pub fn query_rows(wallet: &Wallet, sub: &clap::ArgMatches) -> Result<Vec<EntryRow>> {
    let query = entry_query(sub)?;
    let mut found = wallet.find_entries(&query)?;
    found.sort_by(|a, b| b.cmp(a));
    if let Some(limit) = sub.get_one::<usize>("limit") {
        found.truncate(*limit);
    }
    let mut data = Vec::with_capacity(found.len());
    for e in found {
        data.push(EntryRow::from_entry(wallet, e)?);
    }
    Ok(data)
}
