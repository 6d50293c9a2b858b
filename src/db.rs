// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Backup file access: schema, row shapes and `read`.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::errors::{MwxError, Result, validation};
use crate::models::{
    Account, Category, Counterpart, Entity, EntityKind, Entry, EntryType, OrderTracker, Party,
    split_category_repr,
};
use crate::wallet::Namespace;

const DATE_FMT: &str = "%Y%m%d";
/// `note_payee_payer` value of notes that hold transfer categories.
const NOTE_CATEGORY: i64 = -1;

/// Creates the backup tables when missing.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS tbl_account(
        acc_id INTEGER PRIMARY KEY AUTOINCREMENT,
        acc_name TEXT NOT NULL,
        acc_order INTEGER NOT NULL DEFAULT 0,
        acc_color TEXT NOT NULL DEFAULT '#000000',
        acc_is_closed INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS tbl_cat(
        category_id INTEGER PRIMARY KEY AUTOINCREMENT,
        category_name TEXT NOT NULL,
        category_is_inc INTEGER NOT NULL DEFAULT 0,
        category_color TEXT NOT NULL DEFAULT '#000000',
        category_icon INTEGER NOT NULL DEFAULT 0
    );

    -- Payee/payer notes; transfer categories live here as '[T01. Name]'
    CREATE TABLE IF NOT EXISTS tbl_notes(
        notey_id INTEGER PRIMARY KEY AUTOINCREMENT,
        note_text TEXT NOT NULL,
        note_payee_payer INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS tbl_trans(
        exp_id INTEGER PRIMARY KEY AUTOINCREMENT,
        exp_amount REAL NOT NULL,
        exp_date TEXT NOT NULL,
        exp_is_debit INTEGER NOT NULL DEFAULT 0,
        exp_acc_id INTEGER NOT NULL,
        exp_payee_name TEXT NOT NULL DEFAULT '',
        exp_cat INTEGER NOT NULL,
        exp_note TEXT NOT NULL DEFAULT '',
        exp_is_paid INTEGER NOT NULL DEFAULT 1,
        exp_is_bill INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_trans_date ON tbl_trans(exp_date);

    CREATE TABLE IF NOT EXISTS tbl_transfer(
        trans_id INTEGER PRIMARY KEY AUTOINCREMENT,
        trans_from_id INTEGER NOT NULL,
        trans_to_id INTEGER NOT NULL,
        trans_amount REAL NOT NULL,
        trans_date TEXT NOT NULL,
        trans_note TEXT NOT NULL DEFAULT ''
    );
    "#,
    )?;
    Ok(())
}

/// Creates an empty backup at `path`.
pub fn create_empty(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(MwxError::Path(format!("{} already exists", path.display())));
    }
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(())
}

/// Tables of the backup; each one is its own id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Account,
    Category,
    Note,
    Trans,
    Transfer,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Account => "tbl_account",
            Table::Category => "tbl_cat",
            Table::Note => "tbl_notes",
            Table::Trans => "tbl_trans",
            Table::Transfer => "tbl_transfer",
        }
    }

    fn id_column(self) -> &'static str {
        match self {
            Table::Account => "acc_id",
            Table::Category => "category_id",
            Table::Note => "notey_id",
            Table::Trans => "exp_id",
            Table::Transfer => "trans_id",
        }
    }

    /// Ids of the rows the model is reconciled against.
    fn ids_sql(self) -> &'static str {
        match self {
            Table::Account => "SELECT acc_id FROM tbl_account",
            Table::Category => "SELECT category_id FROM tbl_cat",
            Table::Note => {
                "SELECT notey_id FROM tbl_notes WHERE note_payee_payer = -1 AND note_text LIKE '[%]'"
            }
            Table::Trans => "SELECT exp_id FROM tbl_trans WHERE exp_is_paid = 1",
            Table::Transfer => "SELECT trans_id FROM tbl_transfer",
        }
    }

    pub fn entity_kind(self) -> EntityKind {
        match self {
            Table::Account => EntityKind::Account,
            Table::Category | Table::Note => EntityKind::Category,
            Table::Trans | Table::Transfer => EntityKind::Entry,
        }
    }

    pub fn for_category(kind: EntryType) -> Table {
        match kind {
            EntryType::Transfer => Table::Note,
            _ => Table::Category,
        }
    }

    pub fn for_entry(kind: EntryType) -> Table {
        match kind {
            EntryType::Transfer => Table::Transfer,
            _ => Table::Trans,
        }
    }
}

pub fn row_ids(conn: &Connection, table: Table) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(table.ids_sql())?;
    let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
    let mut ids = Vec::new();
    for id in rows {
        ids.push(id?);
    }
    Ok(ids)
}

/// Whether any stored entry row, paid or not, points at row `id` of `table`.
pub fn is_referenced(conn: &Connection, table: Table, id: i64) -> Result<bool> {
    let sql = match table {
        Table::Account => {
            "SELECT EXISTS(SELECT 1 FROM tbl_trans WHERE exp_acc_id=?1)
             OR EXISTS(SELECT 1 FROM tbl_transfer WHERE trans_from_id=?1 OR trans_to_id=?1)"
        }
        Table::Category => "SELECT EXISTS(SELECT 1 FROM tbl_trans WHERE exp_cat=?1)",
        // transfers name their category in the note text
        Table::Note => {
            "SELECT EXISTS(SELECT 1 FROM tbl_transfer t JOIN tbl_notes n ON n.notey_id=?1
             WHERE substr(t.trans_note, 1, length(n.note_text)) = n.note_text)"
        }
        Table::Trans | Table::Transfer => return Ok(false),
    };
    Ok(conn.query_row(sql, params![id], |r| r.get::<_, bool>(0))?)
}

/// Short human description of a stored row.
pub fn describe_row(conn: &Connection, table: Table, id: i64) -> Result<String> {
    let sql = match table {
        Table::Account => "SELECT '@' || acc_name FROM tbl_account WHERE acc_id=?1",
        Table::Category => "SELECT category_name FROM tbl_cat WHERE category_id=?1",
        Table::Note => "SELECT note_text FROM tbl_notes WHERE notey_id=?1",
        Table::Trans => {
            "SELECT exp_date || ' ' || printf('%.2f', exp_amount) || ' ' || exp_payee_name
             FROM tbl_trans WHERE exp_id=?1"
        }
        Table::Transfer => {
            "SELECT trans_date || ' ' || printf('%.2f', trans_amount) || ' '
             || trans_from_id || '->' || trans_to_id FROM tbl_transfer WHERE trans_id=?1"
        }
    };
    let label: Option<String> = conn
        .query_row(sql, params![id], |r| r.get(0))
        .optional()?;
    Ok(label.unwrap_or_default())
}

pub fn delete_row(conn: &Connection, table: Table, id: i64) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {} WHERE {}=?1", table.name(), table.id_column()),
        params![id],
    )?;
    Ok(())
}

// Row shapes. An id of -1 means the row is yet to be inserted.

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRow {
    pub acc_id: i64,
    pub acc_name: String,
    pub acc_order: i64,
    pub acc_color: String,
    pub acc_is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub category_id: i64,
    pub category_name: String,
    pub category_is_inc: bool,
    pub category_color: String,
    pub category_icon: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteRow {
    pub notey_id: i64,
    pub note_text: String,
    pub note_payee_payer: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransRow {
    pub exp_id: i64,
    pub exp_amount: f64,
    pub exp_date: String,
    pub exp_is_debit: bool,
    pub exp_acc_id: i64,
    pub exp_payee_name: String,
    pub exp_cat: i64,
    pub exp_note: String,
    pub exp_is_paid: bool,
    pub exp_is_bill: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRow {
    pub trans_id: i64,
    pub trans_from_id: i64,
    pub trans_to_id: i64,
    pub trans_amount: f64,
    pub trans_date: String,
    pub trans_note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table")]
pub enum ExternalRow {
    Account(AccountRow),
    Category(CategoryRow),
    Note(NoteRow),
    Trans(TransRow),
    Transfer(TransferRow),
}

impl ExternalRow {
    pub fn table(&self) -> Table {
        match self {
            ExternalRow::Account(_) => Table::Account,
            ExternalRow::Category(_) => Table::Category,
            ExternalRow::Note(_) => Table::Note,
            ExternalRow::Trans(_) => Table::Trans,
            ExternalRow::Transfer(_) => Table::Transfer,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ExternalRow::Account(r) => r.acc_id,
            ExternalRow::Category(r) => r.category_id,
            ExternalRow::Note(r) => r.notey_id,
            ExternalRow::Trans(r) => r.exp_id,
            ExternalRow::Transfer(r) => r.trans_id,
        }
    }
}

/// Inserts the row when its id is -1, updates it otherwise. Returns the row id.
pub fn save(conn: &Connection, row: &ExternalRow) -> Result<i64> {
    let id = row.id();
    let insert = id < 0;
    match row {
        ExternalRow::Account(r) => {
            if insert {
                conn.execute(
                    "INSERT INTO tbl_account(acc_name, acc_order, acc_color, acc_is_closed)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![r.acc_name, r.acc_order, r.acc_color, r.acc_is_closed],
                )?;
            } else {
                conn.execute(
                    "UPDATE tbl_account SET acc_name=?2, acc_order=?3, acc_color=?4, acc_is_closed=?5
                     WHERE acc_id=?1",
                    params![id, r.acc_name, r.acc_order, r.acc_color, r.acc_is_closed],
                )?;
            }
        }
        ExternalRow::Category(r) => {
            if insert {
                conn.execute(
                    "INSERT INTO tbl_cat(category_name, category_is_inc, category_color, category_icon)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![r.category_name, r.category_is_inc, r.category_color, r.category_icon],
                )?;
            } else {
                conn.execute(
                    "UPDATE tbl_cat SET category_name=?2, category_is_inc=?3, category_color=?4,
                     category_icon=?5 WHERE category_id=?1",
                    params![id, r.category_name, r.category_is_inc, r.category_color, r.category_icon],
                )?;
            }
        }
        ExternalRow::Note(r) => {
            if insert {
                conn.execute(
                    "INSERT INTO tbl_notes(note_text, note_payee_payer) VALUES (?1, ?2)",
                    params![r.note_text, r.note_payee_payer],
                )?;
            } else {
                conn.execute(
                    "UPDATE tbl_notes SET note_text=?2, note_payee_payer=?3 WHERE notey_id=?1",
                    params![id, r.note_text, r.note_payee_payer],
                )?;
            }
        }
        ExternalRow::Trans(r) => {
            if insert {
                conn.execute(
                    "INSERT INTO tbl_trans(exp_amount, exp_date, exp_is_debit, exp_acc_id,
                     exp_payee_name, exp_cat, exp_note, exp_is_paid, exp_is_bill)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        r.exp_amount,
                        r.exp_date,
                        r.exp_is_debit,
                        r.exp_acc_id,
                        r.exp_payee_name,
                        r.exp_cat,
                        r.exp_note,
                        r.exp_is_paid,
                        r.exp_is_bill
                    ],
                )?;
            } else {
                conn.execute(
                    "UPDATE tbl_trans SET exp_amount=?2, exp_date=?3, exp_is_debit=?4, exp_acc_id=?5,
                     exp_payee_name=?6, exp_cat=?7, exp_note=?8, exp_is_paid=?9, exp_is_bill=?10
                     WHERE exp_id=?1",
                    params![
                        id,
                        r.exp_amount,
                        r.exp_date,
                        r.exp_is_debit,
                        r.exp_acc_id,
                        r.exp_payee_name,
                        r.exp_cat,
                        r.exp_note,
                        r.exp_is_paid,
                        r.exp_is_bill
                    ],
                )?;
            }
        }
        ExternalRow::Transfer(r) => {
            if insert {
                conn.execute(
                    "INSERT INTO tbl_transfer(trans_from_id, trans_to_id, trans_amount, trans_date,
                     trans_note) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![r.trans_from_id, r.trans_to_id, r.trans_amount, r.trans_date, r.trans_note],
                )?;
            } else {
                conn.execute(
                    "UPDATE tbl_transfer SET trans_from_id=?2, trans_to_id=?3, trans_amount=?4,
                     trans_date=?5, trans_note=?6 WHERE trans_id=?1",
                    params![
                        id,
                        r.trans_from_id,
                        r.trans_to_id,
                        r.trans_amount,
                        r.trans_date,
                        r.trans_note
                    ],
                )?;
            }
        }
    }
    Ok(if insert { conn.last_insert_rowid() } else { id })
}

// Entity -> row

impl Account {
    pub fn to_external(&self) -> ExternalRow {
        ExternalRow::Account(AccountRow {
            acc_id: self.mwid(),
            acc_name: self.name().to_string(),
            acc_order: i64::from(self.order()),
            acc_color: self.color().to_string(),
            acc_is_closed: !self.is_visible,
        })
    }
}

impl Category {
    pub fn to_external(&self) -> ExternalRow {
        match self.kind() {
            EntryType::Transfer => ExternalRow::Note(NoteRow {
                notey_id: self.mwid(),
                note_text: format!("[{}]", self.repr_name()),
                note_payee_payer: NOTE_CATEGORY,
            }),
            kind => ExternalRow::Category(CategoryRow {
                category_id: self.mwid(),
                category_name: self.repr_name(),
                category_is_inc: kind == EntryType::Income,
                category_color: self.color().to_string(),
                category_icon: i64::from(self.icon_id()),
            }),
        }
    }
}

impl Entry {
    /// Row for this entry; linked accounts, and categories other than
    /// transfer ones, must already carry an id.
    pub fn to_external(&self, ns: &Namespace) -> Result<ExternalRow> {
        let category = ns.category_of(self)?;
        let amount = self
            .amount()
            .to_f64()
            .ok_or_else(|| validation(format!("Amount {} does not fit a REAL", self.amount())))?;
        let date = self.date().format(DATE_FMT).to_string();
        let note = join_note(self.item(), self.details());

        if self.kind() == EntryType::Transfer {
            return Ok(ExternalRow::Transfer(TransferRow {
                trans_id: self.mwid(),
                trans_from_id: account_id(ns, self.source())?,
                trans_to_id: account_id(ns, self.target())?,
                trans_amount: amount,
                trans_date: date,
                trans_note: join_note(&format!("[{}]", category.repr_name()), &note),
            }));
        }

        let (account, counterpart) = match self.kind() {
            EntryType::Income => (self.target(), self.source()),
            _ => (self.source(), self.target()),
        };
        let cat_id = persisted_id(category.mwid(), &category.repr_name())?;
        Ok(ExternalRow::Trans(TransRow {
            exp_id: self.mwid(),
            exp_amount: amount,
            exp_date: date,
            exp_is_debit: self.kind() == EntryType::Income,
            exp_acc_id: account_id(ns, account)?,
            exp_payee_name: ns
                .counterpart(counterpart.uid())
                .map(|c| c.name().to_string())
                .ok_or_else(|| {
                    MwxError::Reference(format!(
                        "counterpart '{}' is not a member of its collection",
                        counterpart.repr_name()
                    ))
                })?,
            exp_cat: cat_id,
            exp_note: note,
            exp_is_paid: true,
            exp_is_bill: self.is_bill,
        }))
    }
}

fn persisted_id(mwid: i64, what: &str) -> Result<i64> {
    if mwid > 0 {
        Ok(mwid)
    } else {
        Err(MwxError::Reference(format!("'{}' has not been persisted yet", what)))
    }
}

fn account_id(ns: &Namespace, party: &Party) -> Result<i64> {
    let account = ns.account(party.uid()).ok_or_else(|| {
        MwxError::Reference(format!(
            "account '{}' is not a member of its collection",
            party.repr_name()
        ))
    })?;
    persisted_id(account.mwid(), &account.repr_name())
}

fn join_note(head: &str, tail: &str) -> String {
    if tail.is_empty() {
        head.to_string()
    } else {
        format!("{}\n{}", head, tail)
    }
}

/// Splits a stored note into its first line and the rest, both trimmed.
fn split_note(text: &str) -> (String, String) {
    match text.split_once('\n') {
        Some((head, tail)) => (head.trim().to_string(), tail.trim().to_string()),
        None => (text.trim().to_string(), String::new()),
    }
}

fn parse_store_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FMT)
        .map_err(|_| validation(format!("Invalid stored date '{}', expected YYYYMMDD", raw)))
}

fn parse_store_amount(raw: f64) -> Result<Decimal> {
    Decimal::try_from(raw)
        .map(|d| d.round_dp(2))
        .map_err(|_| validation(format!("Invalid stored amount '{}'", raw)))
}

// Row -> entity

fn account_from_row(r: &rusqlite::Row<'_>, orders: &mut OrderTracker) -> Result<Account> {
    let id: i64 = r.get(0)?;
    let name: String = r.get(1)?;
    let order: i64 = r.get(2)?;
    let color: String = r.get(3)?;
    let closed: bool = r.get(4)?;
    // 0 means the app never assigned an order
    let order = if order <= 0 {
        Some(orders.next_or_last())
    } else {
        Some(u32::try_from(order).map_err(|_| validation(format!("Invalid order {}", order)))?)
    };
    let mut account = Account::new(id, &name, order, orders)?.with_color(&color)?;
    account.is_visible = !closed;
    Ok(account)
}

fn category_from_row(r: &rusqlite::Row<'_>) -> Result<Category> {
    let id: i64 = r.get(0)?;
    let name: String = r.get(1)?;
    let is_inc: bool = r.get(2)?;
    let color: String = r.get(3)?;
    let icon: i64 = r.get(4)?;
    let kind = if is_inc {
        EntryType::Income
    } else {
        EntryType::Expense
    };
    let icon = u8::try_from(icon).map_err(|_| validation(format!("Invalid icon {}", icon)))?;
    Category::from_repr(id, &name, kind)?
        .with_color(&color)?
        .with_icon(icon)
}

fn transfer_category_from_note(id: i64, text: &str) -> Result<Category> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| validation(format!("Note '{}' is not a category", text)))?;
    Category::from_repr(id, inner, EntryType::Transfer)
}

const ACCOUNT_SQL: &str =
    "SELECT acc_id, acc_name, acc_order, acc_color, acc_is_closed FROM tbl_account";
const CATEGORY_SQL: &str =
    "SELECT category_id, category_name, category_is_inc, category_color, category_icon FROM tbl_cat";
const NOTE_SQL: &str = "SELECT notey_id, note_text FROM tbl_notes WHERE note_payee_payer = -1";

/// Loads one stored account, for rows retained behind the model's back.
pub fn load_account(conn: &Connection, id: i64) -> Result<Option<Account>> {
    let mut stmt = conn.prepare(&format!("{} WHERE acc_id=?1", ACCOUNT_SQL))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(r) => Ok(Some(account_from_row(r, &mut OrderTracker::default())?)),
        None => Ok(None),
    }
}

pub fn load_category(conn: &Connection, kind: EntryType, id: i64) -> Result<Option<Category>> {
    if kind == EntryType::Transfer {
        let text: Option<String> = conn
            .query_row(&format!("{} AND notey_id=?1", NOTE_SQL), params![id], |r| {
                r.get(1)
            })
            .optional()?;
        return text
            .map(|t| transfer_category_from_note(id, &t))
            .transpose();
    }
    let mut stmt = conn.prepare(&format!("{} WHERE category_id=?1", CATEGORY_SQL))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(r) => Ok(Some(category_from_row(r)?)),
        None => Ok(None),
    }
}

/// Collects accounts, legacy ones included, as they are discovered.
struct AccountIndex {
    accounts: Vec<Account>,
    by_id: HashMap<i64, usize>,
    orders: OrderTracker,
}

impl AccountIndex {
    fn get_or_legacy(&mut self, id: i64) -> Result<&Account> {
        let idx = match self.by_id.get(&id).copied() {
            Some(idx) => idx,
            None => {
                let order = self.orders.next_or_last();
                let account =
                    Account::new(id, &format!("LEGACY{:02}", id), Some(order), &mut self.orders)?
                        .legacy();
                self.accounts.push(account);
                self.by_id.insert(id, self.accounts.len() - 1);
                self.accounts.len() - 1
            }
        };
        Ok(&self.accounts[idx])
    }
}

struct CategoryIndex {
    categories: Vec<Category>,
}

impl CategoryIndex {
    fn by_id(&mut self, kind: EntryType, id: i64) -> Result<&Category> {
        let found = self
            .categories
            .iter()
            .position(|c| c.kind() == kind && c.mwid() == id);
        let idx = match found {
            Some(idx) => idx,
            None => {
                let legacy =
                    Category::new(id, &format!("X{:02}", id.rem_euclid(100)), &format!("LEGACY {}", id), kind)?
                        .legacy();
                self.categories.push(legacy);
                self.categories.len() - 1
            }
        };
        Ok(&self.categories[idx])
    }

    fn transfer_by_repr(&mut self, repr: &str) -> Result<&Category> {
        let found = self
            .categories
            .iter()
            .position(|c| c.kind() == EntryType::Transfer && c.repr_name() == repr);
        let idx = match found {
            Some(idx) => idx,
            None => {
                let existing = self.categories.iter().position(|c| {
                    c.is_legacy && c.kind() == EntryType::Transfer && c.code() == "X00"
                });
                match existing {
                    Some(idx) => idx,
                    None => {
                        let legacy =
                            Category::new(-1, "X00", "LEGACY", EntryType::Transfer)?.legacy();
                        self.categories.push(legacy);
                        self.categories.len() - 1
                    }
                }
            }
        };
        Ok(&self.categories[idx])
    }
}

/// Parses the backup at `path` into a namespace. The file is opened read-only.
pub fn read(path: &Path) -> Result<Namespace> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let mut accounts = AccountIndex {
        accounts: Vec::new(),
        by_id: HashMap::new(),
        orders: OrderTracker::default(),
    };
    {
        // Explicit orders first so that defaults land after them.
        let mut stmt = conn.prepare(&format!("{} ORDER BY acc_order <= 0, acc_id", ACCOUNT_SQL))?;
        let mut rows = stmt.query([])?;
        while let Some(r) = rows.next()? {
            let account = account_from_row(r, &mut accounts.orders)?;
            accounts.by_id.insert(account.mwid(), accounts.accounts.len());
            accounts.accounts.push(account);
        }
    }

    let mut categories = CategoryIndex {
        categories: Vec::new(),
    };
    {
        let mut stmt = conn.prepare(CATEGORY_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(r) = rows.next()? {
            categories.categories.push(category_from_row(r)?);
        }
        let mut stmt = conn.prepare(NOTE_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(r) = rows.next()? {
            let id: i64 = r.get(0)?;
            let text: String = r.get(1)?;
            if text.starts_with('[') && text.ends_with(']') {
                categories
                    .categories
                    .push(transfer_category_from_note(id, &text)?);
            }
        }
    }

    let mut counterparts: Vec<Counterpart> = Vec::new();
    let mut entries = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT exp_id, exp_amount, exp_date, exp_is_debit, exp_acc_id, exp_payee_name,
             exp_cat, exp_note, exp_is_bill FROM tbl_trans WHERE exp_is_paid = 1",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(r) = rows.next()? {
            let id: i64 = r.get(0)?;
            let amount = parse_store_amount(r.get(1)?)?;
            let date = parse_store_date(&r.get::<_, String>(2)?)?;
            let kind = if r.get::<_, bool>(3)? {
                EntryType::Income
            } else {
                EntryType::Expense
            };
            let acc_id: i64 = r.get(4)?;
            let payee: String = r.get(5)?;
            let cat_id: i64 = r.get(6)?;
            let note: String = r.get(7)?;
            let is_bill: bool = r.get(8)?;

            let counterpart = match counterparts.iter().position(|c| c.name() == payee.trim()) {
                Some(idx) => &counterparts[idx],
                None => {
                    counterparts.push(Counterpart::new(&payee)?);
                    &counterparts[counterparts.len() - 1]
                }
            };
            let account = accounts.get_or_legacy(acc_id)?;
            let category = categories.by_id(kind, cat_id)?;
            let (item, details) = split_note(&note);
            let entry = match kind {
                EntryType::Income => Entry::new(id, amount, date, kind, counterpart, account, category),
                _ => Entry::new(id, amount, date, kind, account, counterpart, category),
            }?;
            let mut entry = entry.with_item(&item).with_details(&details);
            entry.is_bill = is_bill;
            entries.push(entry);
        }
    }
    {
        let mut stmt = conn.prepare(
            "SELECT trans_id, trans_from_id, trans_to_id, trans_amount, trans_date, trans_note
             FROM tbl_transfer",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(r) = rows.next()? {
            let id: i64 = r.get(0)?;
            let from_id: i64 = r.get(1)?;
            let to_id: i64 = r.get(2)?;
            let amount = parse_store_amount(r.get(3)?)?;
            let date = parse_store_date(&r.get::<_, String>(4)?)?;
            let note: String = r.get(5)?;

            let (raw_category, rest) = split_note(&note);
            let (item, details) = split_note(&rest);
            let repr = raw_category
                .strip_prefix('[')
                .and_then(|t| t.strip_suffix(']'))
                .unwrap_or(raw_category.as_str())
                .to_string();
            let source = Party::from(accounts.get_or_legacy(from_id)?);
            let target = Party::from(accounts.get_or_legacy(to_id)?);
            let category = categories.transfer_by_repr(&repr)?;
            let entry = Entry::new(id, amount, date, EntryType::Transfer, source, target, category)?
                .with_item(&item)
                .with_details(&details);
            entries.push(entry);
        }
    }

    let mut ns = Namespace {
        accounts: accounts.accounts,
        counterparts,
        categories: categories.categories,
        entries,
    };
    ns.sort();
    Ok(ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_split_on_first_newline() {
        assert_eq!(
            split_note("Groceries \n weekly\nrun "),
            ("Groceries".to_string(), "weekly\nrun".to_string())
        );
        assert_eq!(split_note("Solo"), ("Solo".to_string(), String::new()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert!(row_ids(&conn, Table::Trans).unwrap().is_empty());
    }
}
