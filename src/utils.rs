// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;
use std::sync::Once;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rust_decimal::Decimal;

use crate::errors::{self, MwxError, usage};

static TRACING_INIT: Once = Once::new();

/// Installs the global subscriber; `RUST_LOG` overrides the `mwx=info` default.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt};

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mwx=info"));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn fmt_money(d: &Decimal) -> String {
    format!("{:.2}", d.round_dp(2))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}]*)\}").unwrap());

/// Expands a backup file name template against the `base` file.
///
/// `{now}` is `YYYYMMDDHHMMSS`, `{name}` the base file name, `{stem}` the name
/// without extension and `{ext}` the extension without its dot.
pub fn render_db_name(template: &str, base: &Path, now: NaiveDateTime) -> errors::Result<String> {
    let name = base
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MwxError::Path(format!("{} has no file name", base.display())))?;
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = base.extension().and_then(|e| e.to_str()).unwrap_or("");

    let mut unknown = None;
    let rendered = PLACEHOLDER_RE.replace_all(template, |caps: &Captures<'_>| match &caps[1] {
        "now" => now.format("%Y%m%d%H%M%S").to_string(),
        "name" => name.to_string(),
        "stem" => stem.to_string(),
        "ext" => ext.to_string(),
        other => {
            unknown.get_or_insert_with(|| other.to_string());
            String::new()
        }
    });
    if let Some(key) = unknown {
        return Err(usage(format!(
            "Unknown placeholder '{{{}}}' in '{}'",
            key, template
        )));
    }
    let rendered = rendered.trim().to_string();
    if rendered.is_empty() || rendered.contains(['/', '\\']) {
        return Err(MwxError::Path(format!(
            "'{}' does not render to a plain file name",
            template
        )));
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap()
    }

    #[test]
    fn renders_every_placeholder() {
        let base = Path::new("/tmp/backups/MyWallet.sqlite");
        assert_eq!(
            render_db_name("MWX_{now}_{stem}.sqlite", base, at()).unwrap(),
            "MWX_20240305070809_MyWallet.sqlite"
        );
        assert_eq!(
            render_db_name("copy-of-{name}.{ext}", base, at()).unwrap(),
            "copy-of-MyWallet.sqlite.sqlite"
        );
    }

    #[test]
    fn rejects_unknown_placeholders_and_paths() {
        let base = Path::new("wallet.db");
        assert!(matches!(
            render_db_name("{today}.db", base, at()),
            Err(MwxError::Usage(_))
        ));
        assert!(matches!(
            render_db_name("sub/{name}", base, at()),
            Err(MwxError::Path(_))
        ));
    }
}
