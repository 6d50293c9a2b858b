// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;

use crate::daterange::DateSpec;
use crate::db;
use crate::errors::{MwxError, Result};
use crate::models::{
    Account, Category, Counterpart, Entity, EntityRef, Entry, EntryType, NEW_MWID, OrderTracker,
    Party, Uid,
};
use crate::query::{self, Query, Selector};
use crate::writer::{self, Deletion, WriteOptions, WriteReport};

/// The four entity collections of one backup.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    pub accounts: Vec<Account>,
    pub counterparts: Vec<Counterpart>,
    pub categories: Vec<Category>,
    pub entries: Vec<Entry>,
}

impl Namespace {
    pub fn account(&self, uid: Uid) -> Option<&Account> {
        self.accounts.iter().find(|a| a.uid() == uid)
    }

    pub fn counterpart(&self, uid: Uid) -> Option<&Counterpart> {
        self.counterparts.iter().find(|c| c.uid() == uid)
    }

    pub fn category(&self, uid: Uid) -> Option<&Category> {
        self.categories.iter().find(|c| c.uid() == uid)
    }

    /// Accepts `Name` or `@Name`.
    pub fn account_named(&self, name: &str) -> Option<&Account> {
        let name = name.strip_prefix('@').unwrap_or(name);
        self.accounts.iter().find(|a| a.name() == name)
    }

    pub fn counterpart_named(&self, name: &str) -> Option<&Counterpart> {
        self.counterparts.iter().find(|c| c.name() == name)
    }

    pub fn category_coded(&self, code: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.code() == code)
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityRef<'_>> {
        self.accounts
            .iter()
            .map(EntityRef::Account)
            .chain(self.counterparts.iter().map(EntityRef::Counterpart))
            .chain(self.categories.iter().map(EntityRef::Category))
            .chain(self.entries.iter().map(EntityRef::Entry))
    }

    /// Display name of a live endpoint.
    pub fn party_name(&self, party: &Party) -> Result<String> {
        let uid = party.uid();
        let name = match party {
            Party::Account(_) => self.account(uid).map(|a| a.repr_name()),
            Party::Counterpart(_) => self.counterpart(uid).map(|c| c.repr_name()),
        };
        name.ok_or_else(|| {
            MwxError::Reference(format!(
                "'{}' is not a member of its collection",
                party.repr_name()
            ))
        })
    }

    pub fn category_of(&self, entry: &Entry) -> Result<&Category> {
        self.category(entry.category().uid()).ok_or_else(|| {
            MwxError::Reference(format!(
                "category '{}' of {} is not a member of its collection",
                entry.category().label(),
                entry
            ))
        })
    }

    /// Fails on the first entry whose links do not resolve.
    pub fn check_references(&self) -> Result<()> {
        for entry in &self.entries {
            self.party_name(entry.source())?;
            self.party_name(entry.target())?;
            self.category_of(entry)?;
        }
        Ok(())
    }

    /// Copies current ids and names of linked entities into entry links.
    pub fn refresh_links(&mut self) {
        let mut live: HashMap<Uid, (i64, String)> = HashMap::new();
        for a in &self.accounts {
            live.insert(a.uid(), (a.mwid(), a.name().to_string()));
        }
        for c in &self.counterparts {
            live.insert(c.uid(), (0, c.name().to_string()));
        }
        for c in &self.categories {
            live.insert(c.uid(), (c.mwid(), c.code().to_string()));
        }
        for entry in &mut self.entries {
            for link in entry.links_mut() {
                if let Some((mwid, label)) = live.get(&link.uid()) {
                    link.mwid = *mwid;
                    link.label.clone_from(label);
                }
            }
        }
    }

    pub fn sort(&mut self) {
        self.accounts.sort();
        self.counterparts.sort();
        self.categories.sort();
        self.entries.sort();
    }
}

/// Orchestrates read, query and write over one loaded backup.
#[derive(Debug, Default)]
pub struct Wallet {
    data: Namespace,
    pub orders: OrderTracker,
    source_path: Option<PathBuf>,
    target_path: Option<PathBuf>,
}

impl Deref for Wallet {
    type Target = Namespace;

    fn deref(&self) -> &Namespace {
        &self.data
    }
}

impl DerefMut for Wallet {
    fn deref_mut(&mut self) -> &mut Namespace {
        &mut self.data
    }
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut wallet = Self::new();
        wallet.read(path)?;
        Ok(wallet)
    }

    /// Replaces the collections with the content of the backup at `path`.
    pub fn read(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.data = db::read(path)?;
        self.orders = OrderTracker::default();
        for a in &self.data.accounts {
            self.orders.observe(a.order());
        }
        self.source_path = Some(path.to_path_buf());
        self.target_path = None;
        Ok(())
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn target_path(&self) -> Option<&Path> {
        self.target_path.as_deref()
    }

    fn baseline(&self, path: Option<&Path>) -> Result<PathBuf> {
        path.map(Path::to_path_buf)
            .or_else(|| self.target_path.clone())
            .or_else(|| self.source_path.clone())
            .ok_or_else(|| {
                MwxError::Path(
                    "No target path given, and no source or previous target path available"
                        .into(),
                )
            })
    }

    /// Writes a new backup, diffing against `path`, else the last written
    /// file, else the file read.
    pub fn write(&mut self, path: Option<&Path>, opts: &WriteOptions) -> Result<WriteReport> {
        let base = self.baseline(path)?;
        let report = writer::write(&base, &mut self.data, opts, None)?;
        self.target_path = Some(report.path.clone());
        Ok(report)
    }

    /// [`Wallet::write`] asking `confirm` before each deletion when
    /// `safe_delete` is set.
    pub fn write_confirmed(
        &mut self,
        path: Option<&Path>,
        opts: &WriteOptions,
        confirm: &mut dyn FnMut(&Deletion) -> bool,
    ) -> Result<WriteReport> {
        let base = self.baseline(path)?;
        let report = writer::write(&base, &mut self.data, opts, Some(confirm))?;
        self.target_path = Some(report.path.clone());
        Ok(report)
    }

    /// Adds an unpersisted account; without `order` it goes after every other.
    pub fn create_account(&mut self, name: &str, order: Option<u32>) -> Result<&mut Account> {
        for a in &self.data.accounts {
            self.orders.observe(a.order());
        }
        let account = Account::new(NEW_MWID, name, order, &mut self.orders)?;
        self.data.accounts.push(account);
        let idx = self.data.accounts.len() - 1;
        Ok(&mut self.data.accounts[idx])
    }

    /// Returns the counterpart with this name, adding it when missing.
    pub fn counterpart_or_create(&mut self, name: &str) -> Result<&Counterpart> {
        let idx = match self.data.counterparts.iter().position(|c| c.name() == name.trim()) {
            Some(idx) => idx,
            None => {
                self.data.counterparts.push(Counterpart::new(name)?);
                self.data.counterparts.len() - 1
            }
        };
        Ok(&self.data.counterparts[idx])
    }

    pub fn incomes(&self) -> Vec<&Entry> {
        self.entries_of(EntryType::Income)
    }

    pub fn expenses(&self) -> Vec<&Entry> {
        self.entries_of(EntryType::Expense)
    }

    pub fn transfers(&self) -> Vec<&Entry> {
        self.entries_of(EntryType::Transfer)
    }

    fn entries_of(&self, kind: EntryType) -> Vec<&Entry> {
        self.data.entries.iter().filter(|e| e.kind() == kind).collect()
    }

    pub fn find(&self, query: &Query<'_>) -> Result<Vec<EntityRef<'_>>> {
        query::find(&self.data, query)
    }

    pub fn find_entries(&self, query: &Query<'_>) -> Result<Vec<&Entry>> {
        query::find_entries(&self.data, query)
    }

    pub fn sum(
        &self,
        account: impl Into<Selector>,
        date: impl Into<DateSpec>,
        query: Query<'_>,
    ) -> Result<Decimal> {
        query::sum(&self.data, account, date, query)
    }

    pub fn budget(
        &self,
        account: impl Into<Selector>,
        date: impl Into<DateSpec>,
        query: Query<'_>,
    ) -> Result<Decimal> {
        query::budget(&self.data, account, date, query)
    }
}
