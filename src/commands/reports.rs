// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use chrono::Local;
use rust_decimal::Decimal;

use crate::commands::{open, required};
use crate::daterange::DateSpec;
use crate::models::Entity;
use crate::query::{Query, resolve_single_party};
use crate::utils::{fmt_money, maybe_print_json, pretty_table};
use crate::wallet::Wallet;

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("sum", sub)) => {
            let wallet = open(sub)?;
            println!("{}", fmt_money(&sum(&wallet, sub)?));
        }
        Some(("budget", sub)) => {
            let wallet = open(sub)?;
            println!("{}", fmt_money(&budget(&wallet, sub)?));
        }
        Some(("balances", sub)) => balances(sub)?,
        Some(("by-category", sub)) => by_category(sub)?,
        _ => {}
    }
    Ok(())
}

fn category_filter(sub: &clap::ArgMatches) -> Query<'static> {
    match sub.get_many::<String>("category") {
        Some(cats) => Query::new().category_any(cats.map(|s| s.trim().to_string())),
        None => Query::new(),
    }
}

pub fn sum(wallet: &Wallet, sub: &clap::ArgMatches) -> Result<Decimal> {
    let account = required(sub, "account")?.trim();
    let from = sub.get_one::<String>("from").map(|s| s.trim());
    let to = sub.get_one::<String>("to").map(|s| s.trim());
    let date = match (sub.get_one::<String>("date"), from.is_some() || to.is_some()) {
        (Some(_), true) => bail!("Use either --date or --from/--to"),
        (Some(d), false) => DateSpec::from(d.trim()),
        (None, _) => DateSpec::between(from, to),
    };
    Ok(wallet.sum(account, date, category_filter(sub))?)
}

pub fn budget(wallet: &Wallet, sub: &clap::ArgMatches) -> Result<Decimal> {
    let account = required(sub, "account")?.trim();
    let date = required(sub, "date")?.trim();
    Ok(wallet.budget(account, date, category_filter(sub))?)
}

fn balances(sub: &clap::ArgMatches) -> Result<()> {
    let wallet = open(sub)?;
    let date = match sub.get_one::<String>("date") {
        Some(d) => DateSpec::from(d.trim()),
        None => DateSpec::from(Local::now().date_naive()),
    };
    let all = sub.get_flag("all");
    let mut data = Vec::new();
    for account in wallet.accounts.iter().filter(|a| all || a.is_visible) {
        let balance = wallet.budget(account, date.clone(), Query::new())?;
        data.push(vec![account.repr_name(), fmt_money(&balance)]);
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        println!("{}", pretty_table(&["Account", "Balance"], data));
    }
    Ok(())
}

fn by_category(sub: &clap::ArgMatches) -> Result<()> {
    let wallet = open(sub)?;
    let account = required(sub, "account")?.trim();
    let who = resolve_single_party(&wallet, &account.into())?;
    let query = Query::new()
        .account(who)
        .date(required(sub, "date")?.trim());
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for e in wallet.find_entries(&query)? {
        let category = wallet.category_of(e)?.repr_name();
        *totals.entry(category).or_default() += e.amount() * Decimal::from(e.flow_of(who));
    }
    let data: Vec<Vec<String>> = totals
        .into_iter()
        .map(|(cat, total)| vec![cat, fmt_money(&total)])
        .collect();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        println!("{}", pretty_table(&["Category", "Total"], data));
    }
    Ok(())
}
