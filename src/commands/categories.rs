// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, bail};
use serde::Serialize;

use crate::commands::{commit, open, parse_kind, required};
use crate::models::{Category, Entity, NEW_MWID};
use crate::utils::{maybe_print_json, pretty_table};
use crate::wallet::Wallet;

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => {
            let wallet = open(sub)?;
            let data = query_rows(&wallet, sub)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows: Vec<Vec<String>> = data
                    .iter()
                    .map(|r| {
                        vec![
                            r.mwid.to_string(),
                            r.code.clone(),
                            r.name.clone(),
                            r.kind.clone(),
                            r.entries.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Id", "Code", "Name", "Kind", "Entries"], rows)
                );
            }
        }
        Some(("add", sub)) => {
            let mut wallet = open(sub)?;
            let code = required(sub, "CODE")?.trim();
            let name = required(sub, "NAME")?.trim();
            let kind = parse_kind(required(sub, "kind")?)?;
            if wallet.category_coded(code).is_some() {
                bail!("Category '{}' already exists", code);
            }
            let mut category = Category::new(NEW_MWID, code, name, kind)?;
            if let Some(color) = sub.get_one::<String>("color") {
                category.set_color(color.trim())?;
            }
            if let Some(icon) = sub.get_one::<u8>("icon") {
                category.set_icon_id(*icon)?;
            }
            println!("Added category '{}'", category.repr_name());
            wallet.categories.push(category);
            commit(&mut wallet, sub)?;
        }
        Some(("rm", sub)) => {
            let mut wallet = open(sub)?;
            let code = required(sub, "CODE")?.trim();
            let before = wallet.categories.len();
            wallet.categories.retain(|c| c.code() != code);
            if wallet.categories.len() == before {
                bail!("Category '{}' not found", code);
            }
            println!("Removed category '{}'", code);
            commit(&mut wallet, sub)?;
        }
        _ => {}
    }
    Ok(())
}

#[derive(Serialize)]
pub struct CategoryRow {
    pub mwid: i64,
    pub code: String,
    pub name: String,
    pub kind: String,
    pub entries: usize,
}

pub fn query_rows(wallet: &Wallet, sub: &clap::ArgMatches) -> Result<Vec<CategoryRow>> {
    let kind = sub
        .get_one::<String>("kind")
        .map(|k| parse_kind(k))
        .transpose()?;
    Ok(wallet
        .categories
        .iter()
        .filter(|c| kind.is_none_or(|k| c.kind() == k))
        .map(|c| CategoryRow {
            mwid: c.mwid(),
            code: c.code().to_string(),
            name: c.name().to_string(),
            kind: c.kind().label().to_string(),
            entries: wallet
                .entries
                .iter()
                .filter(|e| e.category().uid() == c.uid())
                .count(),
        })
        .collect())
}
