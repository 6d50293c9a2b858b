// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashSet;

use anyhow::Result;

use crate::commands::open;
use crate::models::Entity;
use crate::utils::pretty_table;
use crate::wallet::Wallet;

/// Issue name and detail for everything that will not survive a rewrite as is.
pub fn issues(wallet: &Wallet) -> Vec<Vec<String>> {
    let mut rows = Vec::new();

    // 1) Entities synthesized for ids the backup does not define
    for a in wallet.accounts.iter().filter(|a| a.is_legacy) {
        rows.push(vec!["legacy_account".into(), a.to_string()]);
    }
    for c in wallet.categories.iter().filter(|c| c.is_legacy) {
        rows.push(vec!["legacy_category".into(), c.to_string()]);
    }

    // 2) Counterparts no entry names; they are dropped on write
    let named: HashSet<_> = wallet
        .entries
        .iter()
        .flat_map(|e| [e.source().uid(), e.target().uid()])
        .collect();
    for c in wallet.counterparts.iter().filter(|c| !named.contains(&c.uid())) {
        rows.push(vec!["unused_counterpart".into(), c.repr_name()]);
    }

    // 3) Links to entities missing from their collection
    for e in &wallet.entries {
        for party in [e.source(), e.target()] {
            if let Err(err) = wallet.party_name(party) {
                rows.push(vec!["broken_link".into(), format!("{}: {}", e, err)]);
            }
        }
        if let Err(err) = wallet.category_of(e) {
            rows.push(vec!["broken_link".into(), format!("{}: {}", e, err)]);
        }
    }

    rows
}

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    let wallet = open(m)?;
    let rows = issues(&wallet);
    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
