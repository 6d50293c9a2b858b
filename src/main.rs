// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use anyhow::Result;

use mwx::{cli, commands, db, utils};

fn main() -> Result<()> {
    utils::init_tracing();
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("init", sub)) => {
            let path = commands::required(sub, "PATH")?;
            db::create_empty(Path::new(path.trim()))?;
            println!("Backup initialized at {}", path.trim());
        }
        Some(("summary", sub)) => commands::summary::handle(sub)?,
        Some(("account", sub)) => commands::accounts::handle(sub)?,
        Some(("category", sub)) => commands::categories::handle(sub)?,
        Some(("entry", sub)) => commands::entries::handle(sub)?,
        Some(("report", sub)) => commands::reports::handle(sub)?,
        Some(("export", sub)) => commands::exporter::handle(sub)?,
        Some(("rewrite", sub)) => commands::rewrite::handle(sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
