// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mwx::db;
use rusqlite::Connection;

/// A small MyWallet backup:
///
/// - accounts Cash(1), Bank(2), Old(3, closed)
/// - categories A01 Salary (income), B01 Groceries, B02 Rent, transfer T01 Savings
/// - paid rows 1-4 and 6, unpaid row 5; row 6 points at unknown account 9
///   and unknown category 42
/// - transfers Bank->Cash (T01) and Cash->Bank (unknown T09)
pub fn seed_backup(dir: &Path) -> PathBuf {
    let path = dir.join("MyWallet.sqlite");
    let conn = Connection::open(&path).unwrap();
    db::init_schema(&conn).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO tbl_account(acc_id, acc_name, acc_order, acc_color, acc_is_closed) VALUES
            (1, 'Cash', 1, '#00FF00', 0),
            (2, 'Bank', 2, '#0000FF', 0),
            (3, 'Old', 3, '#000000', 1);
        INSERT INTO tbl_cat(category_id, category_name, category_is_inc, category_color, category_icon) VALUES
            (1, 'A01. Salary', 1, '#000000', 0),
            (2, 'B01. Groceries', 0, '#112233', 5),
            (3, 'B02. Rent', 0, '#000000', 0);
        INSERT INTO tbl_notes(notey_id, note_text, note_payee_payer) VALUES
            (1, '[T01. Savings]', -1),
            (2, 'Corner shop', 0);
        INSERT INTO tbl_trans(exp_id, exp_amount, exp_date, exp_is_debit, exp_acc_id,
                              exp_payee_name, exp_cat, exp_note, exp_is_paid, exp_is_bill) VALUES
            (1, 1000.0, '20240101', 1, 2, 'Employer', 1, 'January salary', 1, 0),
            (2, 50.0, '20240110', 1, 1, 'Employer', 1, 'Bonus
cash in hand', 1, 0),
            (3, 20.5, '20240115', 0, 1, 'Market', 2, 'Fruit', 1, 0),
            (4, 600.0, '20240201', 0, 2, 'Landlord', 3, '', 1, 1),
            (5, 99.99, '20240205', 0, 1, 'Market', 2, 'Not yet paid', 0, 0),
            (6, 10.0, '20240210', 0, 9, 'Kiosk', 42, 'Legacy row', 1, 0);
        INSERT INTO tbl_transfer(trans_id, trans_from_id, trans_to_id, trans_amount, trans_date, trans_note) VALUES
            (1, 2, 1, 200.0, '20240120', '[T01. Savings]
Top up'),
            (2, 1, 2, 30.0, '20240220', '[T09. Gone]
Back');
        "#,
    )
    .unwrap();
    path
}

pub fn count(path: &Path, sql: &str) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}
