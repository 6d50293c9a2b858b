// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use crate::commands::{commit, open};
use crate::utils::pretty_table;

/// Reads the backup and writes it back as a new file, listing every warning.
pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    let mut wallet = open(m)?;
    let report = commit(&mut wallet, m)?;
    let rows: Vec<Vec<String>> = report
        .warnings()
        .map(|o| {
            vec![
                o.class.label().to_string(),
                o.kind.to_string(),
                o.mwid.to_string(),
                o.label.clone(),
                o.reason.clone().unwrap_or_default(),
            ]
        })
        .collect();
    if !rows.is_empty() {
        println!(
            "{}",
            pretty_table(&["Outcome", "Kind", "Id", "Entity", "Reason"], rows)
        );
    }
    Ok(())
}
