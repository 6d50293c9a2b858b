// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, arg, value_parser};

fn output_args() -> [Arg; 2] {
    [
        arg!(--json "Print as pretty JSON").action(ArgAction::SetTrue),
        arg!(--jsonl "Print as JSON lines").action(ArgAction::SetTrue),
    ]
}

/// Flags of every command that produces a new backup.
fn write_args() -> [Arg; 5] {
    [
        arg!(--name <TEMPLATE> "File name of the new backup; {now} {name} {stem} {ext}")
            .required(false),
        arg!(--overwrite "Replace the new backup if it already exists").action(ArgAction::SetTrue),
        arg!(--"safe-delete" "Ask before deleting any stored row").action(ArgAction::SetTrue),
        arg!(--strict "Fail instead of keeping rows that entries still reference")
            .action(ArgAction::SetTrue),
        arg!(--verbose <LEVEL> "0 silent, 1 warnings, 2 warnings and info")
            .required(false)
            .value_parser(value_parser!(u8).range(0..=2))
            .default_value("2"),
    ]
}

fn entry_filters() -> [Arg; 9] {
    [
        arg!(--date <DATE> "YYYY, YYYY-MM or YYYY-MM-DD").required(false),
        arg!(--from <DATE> "First day, inclusive").required(false),
        arg!(--to <DATE> "Last bound, exclusive").required(false),
        arg!(--account <PARTY> "@Account or counterpart name")
            .required(false)
            .action(ArgAction::Append),
        arg!(--category <CATEGORY> "Code, name or 'A01. Name'")
            .required(false)
            .action(ArgAction::Append),
        arg!(--item <TEXT> "Substring of the item, or !exact").required(false),
        arg!(--kind <KIND> "income|expense|transfer").required(false),
        arg!(--min <AMOUNT> "Smallest amount, inclusive").required(false),
        arg!(--max <AMOUNT> "Largest amount, exclusive").required(false),
    ]
}

pub fn build_cli() -> Command {
    Command::new("mwx")
        .about("Load, query and rewrite MyWallet backups")
        .version(clap::crate_version!())
        .arg(
            arg!(--db <PATH> "MyWallet backup to read")
                .required(false)
                .global(true),
        )
        .subcommand(
            Command::new("init")
                .about("Create an empty backup")
                .arg(arg!(<PATH> "Where to create it")),
        )
        .subcommand(Command::new("summary").about("Counts and date span of the backup"))
        .subcommand(
            Command::new("account")
                .about("Accounts")
                .subcommand(
                    Command::new("list")
                        .arg(arg!(--all "Include hidden accounts").action(ArgAction::SetTrue))
                        .args(output_args()),
                )
                .subcommand(
                    Command::new("add")
                        .arg(arg!(<NAME> "Account name"))
                        .arg(
                            arg!(--order <ORDER> "1..=999")
                                .required(false)
                                .value_parser(value_parser!(u32)),
                        )
                        .arg(arg!(--color <RGB> "#RRGGBB").required(false))
                        .args(write_args()),
                )
                .subcommand(
                    Command::new("rename")
                        .arg(arg!(<OLD> "Current name"))
                        .arg(arg!(<NEW> "New name"))
                        .args(write_args()),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(arg!(<NAME> "Account name"))
                        .args(write_args()),
                ),
        )
        .subcommand(
            Command::new("category")
                .about("Categories")
                .subcommand(
                    Command::new("list")
                        .arg(arg!(--kind <KIND> "income|expense|transfer").required(false))
                        .args(output_args()),
                )
                .subcommand(
                    Command::new("add")
                        .arg(arg!(<CODE> "Letter and two digits, e.g. A01"))
                        .arg(arg!(<NAME> "Category name"))
                        .arg(arg!(--kind <KIND> "income|expense|transfer").required(true))
                        .arg(arg!(--color <RGB> "#RRGGBB").required(false))
                        .arg(
                            arg!(--icon <ICON> "0..=99")
                                .required(false)
                                .value_parser(value_parser!(u8)),
                        )
                        .args(write_args()),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(arg!(<CODE> "Category code"))
                        .args(write_args()),
                ),
        )
        .subcommand(
            Command::new("entry")
                .about("Incomes, expenses and transfers")
                .subcommand(
                    Command::new("list")
                        .args(entry_filters())
                        .arg(
                            arg!(--limit <N> "Show at most N entries, newest first")
                                .required(false)
                                .value_parser(value_parser!(usize)),
                        )
                        .args(output_args()),
                )
                .subcommand(
                    Command::new("add")
                        .arg(arg!(--date <DATE> "YYYY-MM-DD").required(true))
                        .arg(arg!(--amount <AMOUNT> "Positive amount").required(true))
                        .arg(arg!(--kind <KIND> "income|expense|transfer").required(true))
                        .arg(arg!(--from <PARTY> "Source party").required(true))
                        .arg(arg!(--to <PARTY> "Target party").required(true))
                        .arg(arg!(--category <CATEGORY> "Category").required(true))
                        .arg(arg!(--item <TEXT> "Short description").required(false))
                        .arg(arg!(--details <TEXT> "Free text").required(false))
                        .arg(arg!(--bill "Mark as a bill").action(ArgAction::SetTrue))
                        .args(write_args()),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(
                            arg!(<MWID> "Stored id of the entry")
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(
                            arg!(--transfer "The id is a transfer id")
                                .action(ArgAction::SetTrue),
                        )
                        .args(write_args()),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Aggregates")
                .subcommand(
                    Command::new("sum")
                        .about("Signed total of an account over a period")
                        .arg(arg!(--account <PARTY> "@Account").required(true))
                        .arg(arg!(--date <DATE> "YYYY, YYYY-MM or YYYY-MM-DD").required(false))
                        .arg(arg!(--from <DATE> "First day, inclusive").required(false))
                        .arg(arg!(--to <DATE> "Last bound, exclusive").required(false))
                        .arg(
                            arg!(--category <CATEGORY> "Restrict to categories")
                                .required(false)
                                .action(ArgAction::Append),
                        ),
                )
                .subcommand(
                    Command::new("budget")
                        .about("Running balance of an account up to a date")
                        .arg(arg!(--account <PARTY> "@Account").required(true))
                        .arg(arg!(--date <DATE> "YYYY, YYYY-MM or YYYY-MM-DD").required(true))
                        .arg(
                            arg!(--category <CATEGORY> "Restrict to categories")
                                .required(false)
                                .action(ArgAction::Append),
                        ),
                )
                .subcommand(
                    Command::new("balances")
                        .about("Balance of every account up to a date")
                        .arg(arg!(--date <DATE> "Defaults to today").required(false))
                        .arg(arg!(--all "Include hidden accounts").action(ArgAction::SetTrue))
                        .args(output_args()),
                )
                .subcommand(
                    Command::new("by-category")
                        .about("Totals per category of an account over a period")
                        .arg(arg!(--account <PARTY> "@Account").required(true))
                        .arg(arg!(--date <DATE> "YYYY, YYYY-MM or YYYY-MM-DD").required(true))
                        .args(output_args()),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand(
                    Command::new("entries")
                        .args(entry_filters())
                        .arg(arg!(--format <FORMAT> "csv|json").required(true))
                        .arg(arg!(--out <PATH> "Output file").required(true)),
                ),
        )
        .subcommand(
            Command::new("rewrite")
                .about("Write the backup back unchanged, normalizing every row")
                .args(write_args()),
        )
        .subcommand(Command::new("doctor").about("Look for integrity issues"))
}
