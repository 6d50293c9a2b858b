// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::commands::{commit, open, required};
use crate::models::{Account, Entity};
use crate::utils::{maybe_print_json, pretty_table};
use crate::wallet::Wallet;

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => {
            let wallet = open(sub)?;
            list(&wallet, sub)?;
        }
        Some(("add", sub)) => {
            let mut wallet = open(sub)?;
            let name = required(sub, "NAME")?.trim().to_string();
            let order = sub.get_one::<u32>("order").copied();
            let account = wallet.create_account(&name, order)?;
            if let Some(color) = sub.get_one::<String>("color") {
                account.set_color(color.trim())?;
            }
            println!("Added account '@{}'", name);
            commit(&mut wallet, sub)?;
        }
        Some(("rename", sub)) => {
            let mut wallet = open(sub)?;
            let old = required(sub, "OLD")?.trim();
            let new = required(sub, "NEW")?.trim();
            find_mut(&mut wallet, old)?.set_name(new)?;
            println!("Renamed account '@{}' to '@{}'", old.trim_start_matches('@'), new);
            commit(&mut wallet, sub)?;
        }
        Some(("rm", sub)) => {
            let mut wallet = open(sub)?;
            let name = required(sub, "NAME")?.trim();
            let uid = find_mut(&mut wallet, name)?.uid();
            wallet.accounts.retain(|a| a.uid() != uid);
            println!("Removed account '@{}'", name.trim_start_matches('@'));
            commit(&mut wallet, sub)?;
        }
        _ => {}
    }
    Ok(())
}

fn find_mut<'a>(wallet: &'a mut Wallet, name: &str) -> Result<&'a mut Account> {
    let name = name.strip_prefix('@').unwrap_or(name);
    wallet
        .accounts
        .iter_mut()
        .find(|a| a.name() == name)
        .ok_or_else(|| anyhow!("Account '@{}' not found", name))
}

#[derive(Serialize)]
pub struct AccountRow {
    pub mwid: i64,
    pub name: String,
    pub order: u32,
    pub color: String,
    pub visible: bool,
    pub legacy: bool,
    pub entries: usize,
}

pub fn query_rows(wallet: &Wallet, all: bool) -> Vec<AccountRow> {
    wallet
        .accounts
        .iter()
        .filter(|a| all || a.is_visible)
        .map(|a| AccountRow {
            mwid: a.mwid(),
            name: a.repr_name(),
            order: a.order(),
            color: a.color().to_string(),
            visible: a.is_visible,
            legacy: a.is_legacy,
            entries: wallet.entries.iter().filter(|e| e.has_account(a)).count(),
        })
        .collect()
}

fn list(wallet: &Wallet, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(wallet, sub.get_flag("all"));
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.mwid.to_string(),
                    r.name.clone(),
                    r.order.to_string(),
                    r.color.clone(),
                    if r.legacy { "legacy".into() } else if r.visible { "yes".into() } else { "no".into() },
                    r.entries.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Id", "Account", "Order", "Color", "Visible", "Entries"], rows)
        );
    }
    Ok(())
}
