// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use std::fs;

use chrono::NaiveDate;
use mwx::db::{self, Table};
use mwx::models::NEW_MWID;
use mwx::{
    Category, Classification, Deletion, Entity, Entry, EntryType, MwxError, Query, Verbosity,
    Wallet, WriteOptions,
};
use rusqlite::Connection;
use rust_decimal_macros::dec;
use tempfile::tempdir;

fn opts(name: &str) -> WriteOptions {
    WriteOptions {
        new_db_name: name.to_string(),
        verbose: Verbosity::Silent,
        ..Default::default()
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

#[test]
fn rewrite_keeps_the_base_untouched() {
    let dir = tempdir().unwrap();
    let base = common::seed_backup(dir.path());
    let before = fs::read(&base).unwrap();
    let mut wallet = Wallet::open(&base).unwrap();

    let report = wallet.write(None, &opts("out.sqlite")).unwrap();
    assert_eq!(report.path, dir.path().join("out.sqlite"));
    assert_eq!(report.count(Classification::Updated), 14);
    assert_eq!(report.count(Classification::Skipped), 3);
    assert_eq!(report.count(Classification::New), 0);
    assert_eq!(report.count(Classification::Deleted), 0);
    assert_eq!(report.warnings().count(), 0);
    assert_eq!(fs::read(&base).unwrap(), before);
    assert_eq!(wallet.target_path(), Some(report.path.as_path()));

    // Unpaid and legacy rows survive as they were.
    assert_eq!(common::count(&report.path, "SELECT COUNT(*) FROM tbl_trans"), 6);
    assert_eq!(common::count(&report.path, "SELECT COUNT(*) FROM tbl_account"), 3);

    let reread = Wallet::open(&report.path).unwrap();
    assert_eq!(reread.entries.len(), 7);
    assert_eq!(reread.sum("@Cash", "2024-01", Query::new()).unwrap(), dec!(229.50));
    assert_eq!(reread.budget("@Bank", "2024-02", Query::new()).unwrap(), dec!(230.00));
}

#[test]
fn second_write_changes_nothing() {
    let dir = tempdir().unwrap();
    let mut wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();
    let first = wallet.write(None, &opts("first.sqlite")).unwrap();
    let second = wallet.write(None, &opts("second.sqlite")).unwrap();
    assert_eq!(second.count(Classification::New), 0);
    assert_eq!(second.count(Classification::Deleted), 0);
    assert_eq!(
        second.count(Classification::Updated),
        first.count(Classification::Updated)
    );
}

#[test]
fn empty_backup_round_trip_assigns_ids() {
    let dir = tempdir().unwrap();
    let empty = dir.path().join("Empty.sqlite");
    db::create_empty(&empty).unwrap();
    assert!(matches!(db::create_empty(&empty), Err(MwxError::Path(_))));

    let mut wallet = Wallet::new();
    let cash = wallet.create_account("Cash", None).unwrap().clone();
    let bank = wallet.create_account("Bank", None).unwrap().clone();
    let employer = wallet.counterpart_or_create("Employer").unwrap().clone();
    let market = wallet.counterpart_or_create("Market").unwrap().clone();
    let salary = Category::new(NEW_MWID, "A01", "Salary", EntryType::Income).unwrap();
    let food = Category::new(NEW_MWID, "B01", "Food", EntryType::Expense).unwrap();
    let savings = Category::new(NEW_MWID, "T01", "Savings", EntryType::Transfer).unwrap();
    wallet.categories.extend([salary.clone(), food.clone(), savings.clone()]);
    wallet.entries.extend([
        Entry::new(NEW_MWID, dec!(100), day(5), EntryType::Income, &employer, &cash, &salary)
            .unwrap()
            .with_item("Pay"),
        Entry::new(NEW_MWID, dec!(30), day(6), EntryType::Expense, &cash, &market, &food)
            .unwrap()
            .with_details("weekly"),
        Entry::new(NEW_MWID, dec!(50), day(7), EntryType::Transfer, &cash, &bank, &savings)
            .unwrap(),
    ]);

    let report = wallet.write(Some(empty.as_path()), &opts("filled.sqlite")).unwrap();
    assert_eq!(report.count(Classification::New), 8);
    assert!(wallet.accounts.iter().all(|a| a.mwid() >= 1));
    assert!(wallet.categories.iter().all(|c| c.mwid() >= 1));
    assert!(wallet.entries.iter().all(|e| e.mwid() >= 1));
    wallet.check_references().unwrap();

    let reread = Wallet::open(&report.path).unwrap();
    assert_eq!(reread.accounts.len(), 2);
    assert_eq!(reread.categories.len(), 3);
    assert_eq!(reread.entries.len(), 3);
    assert!(reread.categories.iter().all(|c| !c.is_legacy));
    assert_eq!(reread.sum("@Cash", "2024-01", Query::new()).unwrap(), dec!(20.00));
    assert_eq!(reread.sum("@Bank", "2024-01", Query::new()).unwrap(), dec!(50.00));
    let expenses = reread.expenses();
    assert_eq!(expenses[0].details(), "weekly");

    let again = wallet.write(None, &opts("again.sqlite")).unwrap();
    assert_eq!(again.count(Classification::New), 0);
    assert_eq!(again.count(Classification::Updated), 8);
    assert_eq!(again.count(Classification::Deleted), 0);
}

#[test]
fn round_trip_keeps_every_attribute() {
    let dir = tempdir().unwrap();
    let empty = dir.path().join("Empty.sqlite");
    db::create_empty(&empty).unwrap();

    let mut wallet = Wallet::new();
    wallet
        .create_account("Cash", Some(3))
        .unwrap()
        .set_color("#12AB34")
        .unwrap();
    let vault = wallet.create_account("Vault", Some(7)).unwrap();
    vault.set_color("#FEDCBA").unwrap();
    vault.is_visible = false;
    let cash = wallet.account_named("Cash").unwrap().clone();
    let vault = wallet.account_named("Vault").unwrap().clone();
    let employer = wallet.counterpart_or_create("Employer").unwrap().clone();
    let market = wallet.counterpart_or_create("Market").unwrap().clone();
    let salary = Category::new(NEW_MWID, "A01", "Salary", EntryType::Income)
        .unwrap()
        .with_icon(12)
        .unwrap()
        .with_color("#00AA00")
        .unwrap();
    let food = Category::new(NEW_MWID, "B07", "Food and drink", EntryType::Expense)
        .unwrap()
        .with_icon(99)
        .unwrap()
        .with_color("#FF0000")
        .unwrap();
    // Transfer categories live in the notes table, which has no color or icon.
    let savings = Category::new(NEW_MWID, "T01", "Savings", EntryType::Transfer).unwrap();
    wallet.categories.extend([salary.clone(), food.clone(), savings.clone()]);
    let feb = |d| NaiveDate::from_ymd_opt(2024, 2, d).unwrap();
    wallet.entries.extend([
        Entry::new(NEW_MWID, dec!(1234.56), day(3), EntryType::Income, &employer, &cash, &salary)
            .unwrap()
            .with_item("Line1\nLine2")
            .with_details("  indented\n  second line  "),
        Entry::new(NEW_MWID, dec!(0.01), feb(29), EntryType::Expense, &vault, &market, &food)
            .unwrap()
            .with_details("only details")
            .bill(),
        Entry::new(NEW_MWID, dec!(75), day(31), EntryType::Expense, &cash, &market, &food)
            .unwrap()
            .with_item("  Fruit  "),
        Entry::new(NEW_MWID, dec!(500), feb(1), EntryType::Transfer, &cash, &vault, &savings)
            .unwrap()
            .with_item("Move\nout")
            .with_details(" monthly "),
    ]);
    assert_eq!(wallet.entries[0].item(), "Line1 Line2");
    assert_eq!(wallet.entries[0].details(), "indented\n  second line");

    let report = wallet.write(Some(empty.as_path()), &opts("full.sqlite")).unwrap();
    assert_eq!(report.count(Classification::New), 9);
    let reread = Wallet::open(&report.path).unwrap();

    assert_eq!(reread.accounts.len(), wallet.accounts.len());
    for a in &wallet.accounts {
        let b = reread.accounts.iter().find(|b| b.mwid() == a.mwid()).unwrap();
        assert_eq!(b.name(), a.name());
        assert_eq!(b.order(), a.order());
        assert_eq!(b.color(), a.color());
        assert_eq!(b.is_visible, a.is_visible);
        assert_eq!(b.is_legacy, a.is_legacy);
    }

    let mut names: Vec<&str> = reread.counterparts.iter().map(|c| c.name()).collect();
    names.sort_unstable();
    assert_eq!(names, ["Employer", "Market"]);

    assert_eq!(reread.categories.len(), wallet.categories.len());
    for c in &wallet.categories {
        let d = reread
            .categories
            .iter()
            .find(|d| d.kind() == c.kind() && d.mwid() == c.mwid())
            .unwrap();
        assert_eq!(d.repr_name(), c.repr_name());
        assert_eq!(d.icon_id(), c.icon_id());
        assert_eq!(d.color(), c.color());
        assert!(!d.is_legacy);
    }

    assert_eq!(reread.entries.len(), wallet.entries.len());
    for e in &wallet.entries {
        let f = reread
            .entries
            .iter()
            .find(|f| {
                Table::for_entry(f.kind()) == Table::for_entry(e.kind()) && f.mwid() == e.mwid()
            })
            .unwrap();
        assert_eq!(f.kind(), e.kind());
        assert_eq!(f.amount(), e.amount());
        assert_eq!(f.date(), e.date());
        assert_eq!(f.item(), e.item());
        assert_eq!(f.details(), e.details());
        assert_eq!(f.is_bill, e.is_bill);
        assert_eq!(
            reread.party_name(f.source()).unwrap(),
            wallet.party_name(e.source()).unwrap()
        );
        assert_eq!(
            reread.party_name(f.target()).unwrap(),
            wallet.party_name(e.target()).unwrap()
        );
        assert_eq!(
            reread.category_of(f).unwrap().repr_name(),
            wallet.category_of(e).unwrap().repr_name()
        );
    }
}

#[test]
fn empty_payee_survives_a_rewrite() {
    let dir = tempdir().unwrap();
    let base = common::seed_backup(dir.path());
    Connection::open(&base)
        .unwrap()
        .execute(
            "INSERT INTO tbl_trans(exp_amount, exp_date, exp_is_debit, exp_acc_id, exp_cat)
             VALUES (5.0, '20240301', 0, 1, 2)",
            [],
        )
        .unwrap();
    let mut wallet = Wallet::open(&base).unwrap();

    let report = wallet.write(None, &opts("payees.sqlite")).unwrap();
    assert_eq!(report.count(Classification::Erroneous), 0);
    assert_eq!(
        common::count(
            &report.path,
            "SELECT COUNT(*) FROM tbl_trans WHERE exp_id=7 AND exp_payee_name=''"
        ),
        1
    );
}

#[test]
fn new_rows_continue_the_store_ids() {
    let dir = tempdir().unwrap();
    let mut wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();
    let savings = wallet.create_account("Savings", None).unwrap().clone();
    assert_eq!(savings.order(), 5);
    let cash = wallet.account_named("Cash").unwrap().clone();
    let market = wallet.counterpart_named("Market").unwrap().clone();
    let groceries = wallet.category_coded("B01").unwrap().clone();
    wallet.entries.push(
        Entry::new(NEW_MWID, dec!(12.30), day(25), EntryType::Expense, &cash, &market, &groceries)
            .unwrap(),
    );

    let report = wallet.write(None, &opts("grown.sqlite")).unwrap();
    assert_eq!(report.count(Classification::New), 2);
    assert_eq!(wallet.account_named("Savings").unwrap().mwid(), 4);
    let added = wallet.entries.iter().find(|e| e.date() == day(25)).unwrap();
    assert_eq!(added.mwid(), 7);
    assert_eq!(savings.mwid(), NEW_MWID);
}

#[test]
fn unreferenced_rows_are_deleted() {
    let dir = tempdir().unwrap();
    let mut wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();
    wallet.accounts.retain(|a| a.name() != "Old");
    wallet.entries.retain(|e| e.item() != "Fruit");
    wallet.categories.retain(|c| c.code() != "B01");

    let report = wallet.write(None, &opts("trimmed.sqlite")).unwrap();
    let deleted: Vec<(&str, i64)> = report
        .of(Classification::Deleted)
        .map(|o| (o.kind, o.mwid))
        .collect();
    assert!(deleted.contains(&("account", 3)));
    assert!(deleted.contains(&("entry", 3)));
    assert_eq!(deleted.len(), 2);
    // The unpaid row still uses B01.
    let retained: Vec<i64> = report.of(Classification::Retained).map(|o| o.mwid).collect();
    assert_eq!(retained, [2]);

    assert_eq!(common::count(&report.path, "SELECT COUNT(*) FROM tbl_account"), 2);
    assert_eq!(common::count(&report.path, "SELECT COUNT(*) FROM tbl_trans"), 5);
    assert_eq!(
        common::count(&report.path, "SELECT COUNT(*) FROM tbl_cat WHERE category_id=2"),
        1
    );
}

#[test]
fn referenced_account_is_retained() {
    let dir = tempdir().unwrap();
    let mut wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();
    wallet.accounts.retain(|a| a.name() != "Cash");

    let report = wallet.write(None, &opts("kept.sqlite")).unwrap();
    let retained: Vec<_> = report.of(Classification::Retained).collect();
    assert_eq!(retained.len(), 1);
    assert_eq!(retained[0].mwid, 1);
    assert_eq!(report.count(Classification::Deleted), 0);
    assert_eq!(common::count(&report.path, "SELECT COUNT(*) FROM tbl_account"), 3);

    let cash = wallet.account_named("Cash").unwrap();
    assert_eq!(cash.mwid(), 1);
    wallet.check_references().unwrap();
}

#[test]
fn strict_mode_refuses_blocked_deletions() {
    let dir = tempdir().unwrap();
    let mut wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();
    wallet.accounts.retain(|a| a.name() != "Cash");

    let strict = WriteOptions {
        strict: true,
        ..opts("strict.sqlite")
    };
    assert!(matches!(
        wallet.write(None, &strict),
        Err(MwxError::Reference(_))
    ));
    assert!(!dir.path().join("strict.sqlite").exists());
    assert!(wallet.account_named("Cash").is_none());
    assert!(wallet.target_path().is_none());
}

#[test]
fn removed_counterpart_comes_back() {
    let dir = tempdir().unwrap();
    let mut wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();
    wallet.counterparts.retain(|c| c.name() != "Market");
    wallet.counterpart_or_create("Nobody").unwrap();

    let report = wallet.write(None, &opts("parties.sqlite")).unwrap();
    let retained: Vec<&str> = report
        .of(Classification::Retained)
        .map(|o| o.label.as_str())
        .collect();
    assert_eq!(retained, ["Market"]);
    let skipped: Vec<&str> = report
        .of(Classification::Skipped)
        .filter(|o| o.kind == "counterpart")
        .map(|o| o.label.as_str())
        .collect();
    assert_eq!(skipped, ["Nobody"]);
    assert!(wallet.counterpart_named("Market").is_some());
    wallet.check_references().unwrap();
}

#[test]
fn unsaved_account_without_row_is_a_reference_error() {
    let dir = tempdir().unwrap();
    let mut wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();
    let savings = wallet.create_account("Savings", None).unwrap().clone();
    let bank = wallet.account_named("Bank").unwrap().clone();
    let moves = wallet.category_coded("T01").unwrap().clone();
    wallet.entries.push(
        Entry::new(NEW_MWID, dec!(5), day(30), EntryType::Transfer, &bank, &savings, &moves)
            .unwrap(),
    );
    wallet.accounts.retain(|a| a.name() != "Savings");

    assert!(matches!(
        wallet.write(None, &opts("dangling.sqlite")),
        Err(MwxError::Reference(_))
    ));
    assert!(!dir.path().join("dangling.sqlite").exists());
}

#[test]
fn unsaved_legacy_account_holds_back_its_entries() {
    let dir = tempdir().unwrap();
    let mut wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();
    wallet.create_account("Ghost", None).unwrap().is_legacy = true;
    let ghost = wallet.account_named("Ghost").unwrap().clone();
    let market = wallet.counterpart_named("Market").unwrap().clone();
    let groceries = wallet.category_coded("B01").unwrap().clone();
    wallet.entries.push(
        Entry::new(NEW_MWID, dec!(4), day(28), EntryType::Expense, &ghost, &market, &groceries)
            .unwrap(),
    );

    let report = wallet.write(None, &opts("ghost.sqlite")).unwrap();
    let skipped: Vec<&str> = report
        .of(Classification::Skipped)
        .filter(|o| o.kind == "account")
        .map(|o| o.label.as_str())
        .collect();
    assert_eq!(skipped, ["@LEGACY09", "@Ghost"]);
    let erroneous: Vec<(&str, i64)> = report
        .of(Classification::Erroneous)
        .map(|o| (o.kind, o.mwid))
        .collect();
    assert_eq!(erroneous, [("entry", NEW_MWID)]);
    assert_eq!(report.count(Classification::New), 0);
    // The stored legacy row 6 is still written under its old ids.
    assert_eq!(common::count(&report.path, "SELECT COUNT(*) FROM tbl_trans"), 6);
    assert_eq!(
        common::count(&report.path, "SELECT COUNT(*) FROM tbl_trans WHERE exp_acc_id=9"),
        1
    );
}

#[test]
fn ids_unknown_to_the_base_are_erroneous() {
    let dir = tempdir().unwrap();
    let base = common::seed_backup(dir.path());
    let mut wallet = Wallet::open(&base).unwrap();

    let other = dir.path().join("Other.sqlite");
    fs::copy(&base, &other).unwrap();
    Connection::open(&other)
        .unwrap()
        .execute_batch(
            "DELETE FROM tbl_account WHERE acc_id=3;
             DELETE FROM tbl_transfer WHERE trans_id=1;",
        )
        .unwrap();

    let report = wallet.write(Some(other.as_path()), &opts("{stem}-out.sqlite")).unwrap();
    assert_eq!(report.path, dir.path().join("Other-out.sqlite"));
    let mut erroneous: Vec<(&str, i64)> = report
        .of(Classification::Erroneous)
        .map(|o| (o.kind, o.mwid))
        .collect();
    erroneous.sort_unstable();
    assert_eq!(erroneous, [("account", 3), ("entry", 1)]);
    assert_eq!(common::count(&report.path, "SELECT COUNT(*) FROM tbl_transfer"), 1);
    assert_eq!(common::count(&report.path, "SELECT COUNT(*) FROM tbl_account"), 2);
}

#[test]
fn safe_delete_asks_before_removing() {
    let dir = tempdir().unwrap();
    let base = common::seed_backup(dir.path());
    let mut wallet = Wallet::open(&base).unwrap();
    wallet.accounts.retain(|a| a.name() != "Old");
    let safe = |name: &str| WriteOptions {
        safe_delete: true,
        ..opts(name)
    };

    let unattended = wallet.write(Some(base.as_path()), &safe("unattended.sqlite")).unwrap();
    assert_eq!(unattended.count(Classification::Declined), 1);
    assert_eq!(unattended.count(Classification::Deleted), 0);

    let declined = wallet
        .write_confirmed(Some(base.as_path()), &safe("declined.sqlite"), &mut |_: &Deletion| false)
        .unwrap();
    assert_eq!(declined.count(Classification::Declined), 1);
    assert_eq!(common::count(&declined.path, "SELECT COUNT(*) FROM tbl_account"), 3);

    let mut asked = Vec::new();
    let approved = wallet
        .write_confirmed(Some(base.as_path()), &safe("approved.sqlite"), &mut |d: &Deletion| {
            asked.push((d.table, d.mwid, d.label.clone()));
            true
        })
        .unwrap();
    assert_eq!(approved.count(Classification::Deleted), 1);
    assert_eq!(asked, [(Table::Account, 3, "@Old".to_string())]);
    assert_eq!(common::count(&approved.path, "SELECT COUNT(*) FROM tbl_account"), 2);
}

#[test]
fn destination_rules() {
    let dir = tempdir().unwrap();
    let base = common::seed_backup(dir.path());
    let mut wallet = Wallet::open(&base).unwrap();

    assert!(matches!(
        wallet.write(None, &opts("{name}")),
        Err(MwxError::Path(_))
    ));
    assert!(matches!(
        wallet.write(None, &opts("{when}.sqlite")),
        Err(MwxError::Usage(_))
    ));

    wallet.write(Some(base.as_path()), &opts("same.sqlite")).unwrap();
    assert!(matches!(
        wallet.write(Some(base.as_path()), &opts("same.sqlite")),
        Err(MwxError::Path(_))
    ));
    let overwrite = WriteOptions {
        overwrite: true,
        ..opts("same.sqlite")
    };
    wallet.write(Some(base.as_path()), &overwrite).unwrap();

    // Without a base argument the last written file is the base.
    assert!(matches!(
        wallet.write(None, &overwrite),
        Err(MwxError::Path(_))
    ));

    assert!(matches!(
        Wallet::new().write(None, &opts("x.sqlite")),
        Err(MwxError::Path(_))
    ));
    assert!(matches!(Verbosity::from_level(3), Err(MwxError::Usage(_))));
}
