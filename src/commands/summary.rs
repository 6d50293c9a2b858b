// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use crate::commands::open;
use crate::utils::pretty_table;
use crate::wallet::Wallet;

pub fn rows(wallet: &Wallet) -> Vec<Vec<String>> {
    let first = wallet.entries.iter().map(|e| e.date()).min();
    let last = wallet.entries.iter().map(|e| e.date()).max();
    let span = match (first, last) {
        (Some(f), Some(l)) => format!("{} .. {}", f, l),
        _ => "-".to_string(),
    };
    vec![
        vec!["accounts".into(), wallet.accounts.len().to_string()],
        vec!["counterparts".into(), wallet.counterparts.len().to_string()],
        vec!["categories".into(), wallet.categories.len().to_string()],
        vec!["incomes".into(), wallet.incomes().len().to_string()],
        vec!["expenses".into(), wallet.expenses().len().to_string()],
        vec!["transfers".into(), wallet.transfers().len().to_string()],
        vec!["dates".into(), span],
    ]
}

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    let wallet = open(m)?;
    println!("{}", pretty_table(&["Collection", "Size"], rows(&wallet)));
    Ok(())
}
