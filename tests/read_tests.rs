// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use mwx::models::{MAX_ORDER, NO_ITEM};
use mwx::{Entity, EntryType, MwxError, Wallet};
use rusqlite::Connection;
use rust_decimal_macros::dec;
use tempfile::tempdir;

#[test]
fn read_builds_every_collection() {
    let dir = tempdir().unwrap();
    let path = common::seed_backup(dir.path());
    let wallet = Wallet::open(&path).unwrap();

    let accounts: Vec<String> = wallet.accounts.iter().map(|a| a.repr_name()).collect();
    assert_eq!(accounts, ["@Cash", "@Bank", "@Old", "@LEGACY09"]);
    assert!(!wallet.account_named("Old").unwrap().is_visible);
    let legacy = wallet.account_named("@LEGACY09").unwrap();
    assert!(legacy.is_legacy);
    assert_eq!(legacy.mwid(), 9);
    assert_eq!(legacy.order(), 4);

    let codes: Vec<&str> = wallet.categories.iter().map(|c| c.code()).collect();
    assert_eq!(codes, ["A01", "B01", "B02", "T01", "X00", "X42"]);
    let groceries = wallet.category_coded("B01").unwrap();
    assert_eq!(groceries.icon_id(), 5);
    assert_eq!(groceries.color(), "#112233");
    let x42 = wallet.category_coded("X42").unwrap();
    assert!(x42.is_legacy);
    assert_eq!(x42.name(), "LEGACY 42");
    assert_eq!(x42.kind(), EntryType::Expense);

    let mut payees: Vec<&str> = wallet.counterparts.iter().map(|c| c.name()).collect();
    payees.sort_unstable();
    assert_eq!(payees, ["Employer", "Kiosk", "Landlord", "Market"]);

    assert_eq!(wallet.entries.len(), 7);
    assert_eq!(wallet.incomes().len(), 2);
    assert_eq!(wallet.expenses().len(), 3);
    assert_eq!(wallet.transfers().len(), 2);
    wallet.check_references().unwrap();
    assert_eq!(wallet.source_path(), Some(path.as_path()));
}

#[test]
fn read_skips_unpaid_rows_and_splits_notes() {
    let dir = tempdir().unwrap();
    let wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();

    assert!(wallet.entries.iter().all(|e| e.item() != "Not yet paid"));

    let bonus = wallet.entries.iter().find(|e| e.item() == "Bonus").unwrap();
    assert_eq!(bonus.details(), "cash in hand");
    assert_eq!(bonus.amount(), dec!(50.00));
    assert_eq!(bonus.kind(), EntryType::Income);
    assert_eq!(wallet.party_name(bonus.source()).unwrap(), "Employer");
    assert_eq!(wallet.party_name(bonus.target()).unwrap(), "@Cash");

    let rent = wallet
        .entries
        .iter()
        .find(|e| e.kind() == EntryType::Expense && e.mwid() == 4)
        .unwrap();
    assert_eq!(rent.item(), NO_ITEM);
    assert!(rent.is_bill);

    let top_up = wallet
        .transfers()
        .into_iter()
        .find(|e| e.mwid() == 1)
        .unwrap();
    assert_eq!(top_up.item(), "Top up");
    assert_eq!(wallet.category_of(top_up).unwrap().repr_name(), "T01. Savings");

    let back = wallet
        .transfers()
        .into_iter()
        .find(|e| e.mwid() == 2)
        .unwrap();
    let legacy = wallet.category_of(back).unwrap();
    assert!(legacy.is_legacy);
    assert_eq!(legacy.repr_name(), "X00. LEGACY");
}

#[test]
fn entries_are_sorted_by_date() {
    let dir = tempdir().unwrap();
    let wallet = Wallet::open(common::seed_backup(dir.path())).unwrap();
    let dates: Vec<_> = wallet.entries.iter().map(|e| e.date()).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
}

#[test]
fn missing_backup_is_an_error() {
    let dir = tempdir().unwrap();
    let err = Wallet::open(dir.path().join("nope.sqlite")).unwrap_err();
    assert!(matches!(err, MwxError::Store(_)));
}

#[test]
fn rows_without_a_payee_are_read() {
    let dir = tempdir().unwrap();
    let path = common::seed_backup(dir.path());
    Connection::open(&path)
        .unwrap()
        .execute(
            "INSERT INTO tbl_trans(exp_amount, exp_date, exp_is_debit, exp_acc_id, exp_cat)
             VALUES (5.0, '20240301', 0, 1, 2)",
            [],
        )
        .unwrap();

    let wallet = Wallet::open(&path).unwrap();
    assert_eq!(wallet.entries.len(), 8);
    let nobody = wallet.counterpart_named("").unwrap();
    let entry = wallet.entries.iter().find(|e| e.mwid() == 7).unwrap();
    assert_eq!(entry.target().uid(), nobody.uid());
    assert_eq!(wallet.party_name(entry.target()).unwrap(), "");
    wallet.check_references().unwrap();
}

#[test]
fn accounts_past_the_last_order_are_still_read() {
    let dir = tempdir().unwrap();
    let path = common::seed_backup(dir.path());
    Connection::open(&path)
        .unwrap()
        .execute_batch(
            "UPDATE tbl_account SET acc_order=999 WHERE acc_id=3;
             INSERT INTO tbl_account(acc_id, acc_name, acc_order, acc_color, acc_is_closed)
             VALUES (4, 'Unordered', 0, '#000000', 0);",
        )
        .unwrap();

    let mut wallet = Wallet::open(&path).unwrap();
    assert_eq!(wallet.account_named("Unordered").unwrap().order(), MAX_ORDER);
    let legacy = wallet.account_named("@LEGACY09").unwrap();
    assert!(legacy.is_legacy);
    assert_eq!(legacy.order(), MAX_ORDER);

    // Accounts created by hand still need a free slot.
    assert!(matches!(
        wallet.create_account("Spare", None),
        Err(MwxError::Validation(_))
    ));
}
