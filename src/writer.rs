// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Reconciliation of an in-memory namespace against a backup file.
//!
//! `write` never touches the base file. It copies it next to the destination,
//! replays the model onto the copy inside one transaction and only then moves
//! the copy under its final name. Rows are matched by `mwid`, table by table:
//!
//! | in memory           | in store | outcome                      |
//! |---------------------|----------|------------------------------|
//! | `mwid == -1`        | n/a      | [`Classification::New`]      |
//! | `mwid == k`         | yes      | [`Classification::Updated`]  |
//! | `mwid == k`         | no       | [`Classification::Erroneous`]|
//! | none                | yes      | [`Classification::Deleted`]  |
//!
//! A deletion is held back ([`Classification::Retained`]) while any surviving
//! entry still points at the row.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use rusqlite::Connection;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::db::{self, ExternalRow, Table};
use crate::errors::{MwxError, Result, usage};
use crate::models::{Counterpart, Entity, EntityKind, EntryType, NEW_MWID, Party, Uid};
use crate::utils::render_db_name;
use crate::wallet::Namespace;

/// How much of the reconciliation is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Verbosity {
    Silent = 0,
    Warnings = 1,
    Info = 2,
}

impl Verbosity {
    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Verbosity::Silent),
            1 => Ok(Verbosity::Warnings),
            2 => Ok(Verbosity::Info),
            other => Err(usage(format!("Invalid verbosity {}, expected 0, 1 or 2", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// File name template; see [`render_db_name`].
    pub new_db_name: String,
    pub overwrite: bool,
    /// Ask before every row deletion.
    pub safe_delete: bool,
    pub verbose: Verbosity,
    /// Fail instead of retaining rows that surviving entries still reference.
    pub strict: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            new_db_name: "MWX_{now}_{stem}.sqlite".to_string(),
            overwrite: false,
            safe_delete: false,
            verbose: Verbosity::Info,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    New,
    Updated,
    /// In memory with an id the store does not know; not written.
    Erroneous,
    Deleted,
    /// Deletion blocked by a surviving reference; the row stays.
    Retained,
    /// Deletion not confirmed; the row stays.
    Declined,
    /// Legacy or unpersistable entity, left out on purpose.
    Skipped,
}

impl Classification {
    pub fn is_warning(self) -> bool {
        matches!(
            self,
            Classification::Erroneous | Classification::Retained | Classification::Declined
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Classification::New => "new",
            Classification::Updated => "updated",
            Classification::Erroneous => "erroneous",
            Classification::Deleted => "deleted",
            Classification::Retained => "retained",
            Classification::Declined => "declined",
            Classification::Skipped => "skipped",
        }
    }
}

/// What happened to one entity or row.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub kind: &'static str,
    pub mwid: i64,
    pub label: String,
    pub class: Classification,
    pub reason: Option<String>,
}

impl Outcome {
    fn new(kind: EntityKind, mwid: i64, label: impl Into<String>, class: Classification) -> Self {
        Self {
            kind: kind.as_str(),
            mwid,
            label: label.into(),
            class,
            reason: None,
        }
    }

    fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} '{}' [{}]",
            self.class.label(),
            self.kind,
            self.label,
            self.mwid
        )?;
        if let Some(reason) = &self.reason {
            write!(f, ": {}", reason)?;
        }
        Ok(())
    }
}

/// A stored row about to be removed, as shown to the confirmation callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub table: Table,
    pub mwid: i64,
    pub label: String,
}

impl fmt::Display for Deletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}", self.table.name(), self.mwid, self.label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub path: PathBuf,
    pub outcomes: Vec<Outcome>,
}

impl WriteReport {
    pub fn count(&self, class: Classification) -> usize {
        self.outcomes.iter().filter(|o| o.class == class).count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.class.is_warning())
    }

    pub fn of(&self, class: Classification) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(move |o| o.class == class)
    }
}

/// Path of the new backup for `base`, checked against `overwrite`.
pub fn destination(base: &Path, opts: &WriteOptions) -> Result<PathBuf> {
    let name = render_db_name(&opts.new_db_name, base, Local::now().naive_local())?;
    let dir = base
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let dest = dir.join(name);
    if dest.exists() {
        if fs::canonicalize(&dest)? == fs::canonicalize(base)? {
            return Err(MwxError::Path(format!(
                "{} is the base file and cannot be written over",
                dest.display()
            )));
        }
        if !opts.overwrite {
            return Err(MwxError::Path(format!(
                "{} already exists; pass overwrite to replace it",
                dest.display()
            )));
        }
    }
    Ok(dest)
}

/// Writes `data` as a new backup derived from `base`.
///
/// On success `data` carries the ids assigned to new entities, plus any
/// entity retained because a surviving entry still referenced it. On error
/// `data` is left as it was and no file appears under the final name.
pub fn write(
    base: &Path,
    data: &mut Namespace,
    opts: &WriteOptions,
    confirm: Option<&mut dyn FnMut(&Deletion) -> bool>,
) -> Result<WriteReport> {
    if !base.is_file() {
        return Err(MwxError::Path(format!(
            "Base backup {} does not exist",
            base.display()
        )));
    }
    let dest = destination(base, opts)?;
    let dir = dest
        .parent()
        .ok_or_else(|| MwxError::Path(format!("{} has no parent directory", dest.display())))?;

    let tmp = NamedTempFile::new_in(dir)?;
    fs::copy(base, tmp.path())?;

    let mut staged = data.clone();
    staged.refresh_links();

    let outcomes = {
        let mut conn = Connection::open(tmp.path())?;
        db::init_schema(&conn)?;
        let tx = conn.transaction()?;
        let mut sync = Reconciler {
            conn: &tx,
            opts,
            confirm,
            outcomes: Vec::new(),
            skipped: HashSet::new(),
        };
        sync.run(&mut staged)?;
        let outcomes = sync.outcomes;
        tx.commit()?;
        outcomes
    };

    let persisted = if opts.overwrite {
        tmp.persist(&dest)
    } else {
        tmp.persist_noclobber(&dest)
    };
    persisted.map_err(|e| MwxError::Io(e.error))?;

    staged.sort();
    *data = staged;
    Ok(WriteReport {
        path: dest,
        outcomes,
    })
}

struct Reconciler<'a, 'f> {
    conn: &'a Connection,
    opts: &'a WriteOptions,
    confirm: Option<&'f mut dyn FnMut(&Deletion) -> bool>,
    outcomes: Vec<Outcome>,
    /// Entities left without a row; entries pointing at them are not written
    /// either.
    skipped: HashSet<Uid>,
}

impl Reconciler<'_, '_> {
    fn run(&mut self, ns: &mut Namespace) -> Result<()> {
        let mut pending = Vec::new();

        let store = self.store_ids(Table::Account)?;
        for i in 0..ns.accounts.len() {
            let a = &ns.accounts[i];
            let row = a.to_external();
            let (uid, legacy, label) = (a.uid(), a.is_legacy, a.repr_name());
            if let Some(id) = self.upsert(EntityKind::Account, &store, uid, legacy, label, &row)? {
                ns.accounts[i].set_mwid(id);
            }
        }
        let seen: HashSet<i64> = ns.accounts.iter().map(|a| a.mwid()).collect();
        pending.extend(self.retain_referenced(ns, Table::Account, &store, &seen)?);

        for table in [Table::Category, Table::Note] {
            let store = self.store_ids(table)?;
            for i in 0..ns.categories.len() {
                let c = &ns.categories[i];
                if Table::for_category(c.kind()) != table {
                    continue;
                }
                let row = c.to_external();
                let (uid, legacy, label) = (c.uid(), c.is_legacy, c.repr_name());
                if let Some(id) =
                    self.upsert(EntityKind::Category, &store, uid, legacy, label, &row)?
                {
                    ns.categories[i].set_mwid(id);
                }
            }
            let seen: HashSet<i64> = ns
                .categories
                .iter()
                .filter(|c| Table::for_category(c.kind()) == table)
                .map(|c| c.mwid())
                .collect();
            pending.extend(self.retain_referenced(ns, table, &store, &seen)?);
        }

        self.retain_counterparts(ns)?;
        ns.refresh_links();

        for table in [Table::Trans, Table::Transfer] {
            let store = self.store_ids(table)?;
            for i in 0..ns.entries.len() {
                let e = &ns.entries[i];
                if Table::for_entry(e.kind()) != table {
                    continue;
                }
                let broken = [e.source().uid(), e.target().uid(), e.category().uid()]
                    .into_iter()
                    .any(|uid| self.skipped.contains(&uid));
                if broken {
                    let outcome =
                        Outcome::new(EntityKind::Entry, e.mwid(), e.repr_name(), Classification::Erroneous)
                            .because("references an entity that was not written");
                    self.skipped.insert(e.uid());
                    self.record(outcome);
                    continue;
                }
                let row = e.to_external(ns)?;
                let (uid, label) = (e.uid(), e.repr_name());
                if let Some(id) = self.upsert(EntityKind::Entry, &store, uid, false, label, &row)? {
                    ns.entries[i].set_mwid(id);
                }
            }
            let seen: HashSet<i64> = ns
                .entries
                .iter()
                .filter(|e| Table::for_entry(e.kind()) == table)
                .map(|e| e.mwid())
                .collect();
            for id in store.difference(&seen) {
                self.delete(table, *id)?;
            }
        }

        // Entry rows are final now; whatever still points at a pending row
        // was kept back by the store itself (unpaid or declined rows).
        for (table, id) in pending {
            if db::is_referenced(self.conn, table, id)? {
                self.block(table, id, "still referenced by stored entries")?;
            } else {
                self.delete(table, id)?;
            }
        }
        Ok(())
    }

    fn store_ids(&self, table: Table) -> Result<HashSet<i64>> {
        Ok(db::row_ids(self.conn, table)?.into_iter().collect())
    }

    /// Inserts or updates one row; returns the id of an inserted row.
    fn upsert(
        &mut self,
        kind: EntityKind,
        store: &HashSet<i64>,
        uid: Uid,
        legacy: bool,
        label: String,
        row: &ExternalRow,
    ) -> Result<Option<i64>> {
        let mwid = row.id();
        if legacy && !store.contains(&mwid) {
            // Entry rows point at accounts and categories by id; without
            // one there is nothing to point at. Notes are named, not linked.
            if mwid == NEW_MWID && row.table() != Table::Note {
                self.skipped.insert(uid);
            }
            self.record(
                Outcome::new(kind, mwid, label, Classification::Skipped).because("legacy entity"),
            );
            return Ok(None);
        }
        if mwid == NEW_MWID {
            let id = db::save(self.conn, row)?;
            self.record(Outcome::new(kind, id, label, Classification::New));
            return Ok(Some(id));
        }
        if store.contains(&mwid) {
            db::save(self.conn, row)?;
            self.record(Outcome::new(kind, mwid, label, Classification::Updated));
        } else {
            self.skipped.insert(uid);
            self.record(
                Outcome::new(kind, mwid, label, Classification::Erroneous)
                    .because(format!("no row {} in {}", mwid, row.table().name())),
            );
        }
        Ok(None)
    }

    /// Brings back rows that in-memory entries still link to and returns the
    /// other deletion candidates of `table`.
    fn retain_referenced(
        &mut self,
        ns: &mut Namespace,
        table: Table,
        store: &HashSet<i64>,
        seen: &HashSet<i64>,
    ) -> Result<Vec<(Table, i64)>> {
        let orphans = orphan_links(ns, table);
        let mut candidates: Vec<i64> = store.difference(seen).copied().collect();
        candidates.sort_unstable();

        let mut pending = Vec::new();
        for id in candidates {
            let Some(uid) = orphans.get(&id).copied() else {
                pending.push((table, id));
                continue;
            };
            self.block(table, id, "referenced by an entry in memory")?;
            match table {
                Table::Account => {
                    let account = db::load_account(self.conn, id)?
                        .ok_or_else(|| missing_row(table, id))?;
                    ns.accounts.push(account.with_uid(uid));
                }
                Table::Category | Table::Note => {
                    let kind = if table == Table::Note {
                        EntryType::Transfer
                    } else {
                        EntryType::Expense
                    };
                    let category = db::load_category(self.conn, kind, id)?
                        .ok_or_else(|| missing_row(table, id))?;
                    ns.categories.push(category.with_uid(uid));
                }
                Table::Trans | Table::Transfer => {}
            }
        }
        Ok(pending)
    }

    /// Counterparts have no rows; one dropped from memory while entries still
    /// name it is put back, and one no entry names cannot be stored at all.
    fn retain_counterparts(&mut self, ns: &mut Namespace) -> Result<()> {
        let mut orphans: HashMap<Uid, String> = HashMap::new();
        for e in &ns.entries {
            for party in [e.source(), e.target()] {
                if let Party::Counterpart(link) = party {
                    if ns.counterpart(link.uid()).is_none() {
                        orphans.insert(link.uid(), link.label().to_string());
                    }
                }
            }
        }
        let mut orphans: Vec<(Uid, String)> = orphans.into_iter().collect();
        orphans.sort_by(|a, b| a.1.cmp(&b.1));
        for (uid, name) in orphans {
            if self.opts.strict {
                return Err(MwxError::Reference(format!(
                    "counterpart '{}' was removed but entries still reference it",
                    name
                )));
            }
            self.record(
                Outcome::new(EntityKind::Counterpart, 0, name.as_str(), Classification::Retained)
                    .because("referenced by an entry in memory"),
            );
            ns.counterparts.push(Counterpart::new(&name)?.with_uid(uid));
        }

        let referenced: HashSet<Uid> = ns
            .entries
            .iter()
            .flat_map(|e| [e.source().uid(), e.target().uid()])
            .collect();
        let unused: Vec<String> = ns
            .counterparts
            .iter()
            .filter(|c| !referenced.contains(&c.uid()))
            .map(|c| c.repr_name())
            .collect();
        for name in unused {
            self.record(
                Outcome::new(EntityKind::Counterpart, 0, name, Classification::Skipped)
                    .because("not referenced by any entry"),
            );
        }
        Ok(())
    }

    fn block(&mut self, table: Table, id: i64, reason: &str) -> Result<()> {
        let label = db::describe_row(self.conn, table, id)?;
        if self.opts.strict {
            return Err(MwxError::Reference(format!(
                "cannot delete {}[{}] '{}': {}",
                table.name(),
                id,
                label,
                reason
            )));
        }
        self.record(
            Outcome::new(table.entity_kind(), id, label, Classification::Retained).because(reason),
        );
        Ok(())
    }

    fn delete(&mut self, table: Table, id: i64) -> Result<()> {
        let deletion = Deletion {
            table,
            mwid: id,
            label: db::describe_row(self.conn, table, id)?,
        };
        if self.opts.safe_delete {
            let approved = match self.confirm.as_mut() {
                Some(confirm) => confirm(&deletion),
                None => false,
            };
            if !approved {
                self.record(
                    Outcome::new(table.entity_kind(), id, deletion.label, Classification::Declined)
                        .because("deletion not confirmed"),
                );
                return Ok(());
            }
        }
        db::delete_row(self.conn, table, id)?;
        self.record(Outcome::new(
            table.entity_kind(),
            id,
            deletion.label,
            Classification::Deleted,
        ));
        Ok(())
    }

    fn record(&mut self, outcome: Outcome) {
        if outcome.class.is_warning() {
            if self.opts.verbose >= Verbosity::Warnings {
                warn!(kind = outcome.kind, mwid = outcome.mwid, "{}", outcome);
            }
        } else if self.opts.verbose >= Verbosity::Info {
            info!(kind = outcome.kind, mwid = outcome.mwid, "{}", outcome);
        }
        self.outcomes.push(outcome);
    }
}

/// Links of in-memory entries whose target is missing from `table`'s
/// collection, keyed by the stored id they still carry.
fn orphan_links(ns: &Namespace, table: Table) -> HashMap<i64, Uid> {
    let mut orphans = HashMap::new();
    for e in &ns.entries {
        match table {
            Table::Account => {
                for party in [e.source(), e.target()] {
                    if party.is_account() && ns.account(party.uid()).is_none() {
                        orphans.insert(party.link().mwid(), party.uid());
                    }
                }
            }
            Table::Category | Table::Note => {
                let link = e.category();
                if Table::for_category(e.kind()) == table && ns.category(link.uid()).is_none() {
                    orphans.insert(link.mwid(), link.uid());
                }
            }
            Table::Trans | Table::Transfer => {}
        }
    }
    orphans
}

fn missing_row(table: Table, id: i64) -> MwxError {
    MwxError::Reference(format!("row {} vanished from {}", id, table.name()))
}
