// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Entities of a wallet: accounts, counterparts, categories and entries.
//!
//! Every entity carries a process-unique [`Uid`] (its identity inside the
//! in-memory model) and an `mwid`, the id of its row in the backup file.
//! Entries point at the other kinds through [`Link`]s, which are plain
//! back-references resolved against the owning [`Namespace`].

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::errors::{Result, validation};
use crate::wallet::Namespace;

/// Not yet persisted; a row is inserted on write.
pub const NEW_MWID: i64 = -1;
/// Highest UI order an account may take.
pub const MAX_ORDER: u32 = 999;
/// Label stored for entries without a description.
pub const NO_ITEM: &str = "Sin concepto";
pub const DEFAULT_COLOR: &str = "#000000";
pub const MAX_ICON_ID: u8 = 99;

static RGB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap());
static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][0-9]{2}$").unwrap());
static CATEGORY_REPR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][0-9]{2})\. (.+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(Uuid);

impl Uid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::new()
    }
}

/// Direction of an entry, shared by categories: -1 expense, 0 transfer, +1 income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Expense,
    Transfer,
    Income,
}

impl EntryType {
    pub fn sign(self) -> i8 {
        match self {
            EntryType::Expense => -1,
            EntryType::Transfer => 0,
            EntryType::Income => 1,
        }
    }

    pub fn from_sign(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(EntryType::Expense),
            0 => Ok(EntryType::Transfer),
            1 => Ok(EntryType::Income),
            other => Err(validation(format!(
                "Invalid entry type {}, expected -1, 0 or +1",
                other
            ))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryType::Expense => "Expense",
            EntryType::Transfer => "Transfer",
            EntryType::Income => "Income",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Counterpart,
    Category,
    Entry,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Counterpart => "counterpart",
            EntityKind::Category => "category",
            EntityKind::Entry => "entry",
        }
    }
}

/// Total order over every entity of a wallet, whatever its kind.
///
/// Accounts and counterparts share the `Party` axis so that both can be
/// sorted in a single view; counterparts sit at order 999 and after any
/// account of the same order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortingKey {
    Party { order: u32, rank: u8, name: String },
    Category { code: String },
    Entry { date: NaiveDate, mwid: i64, tiebreak: u128 },
}

/// Capabilities shared by the four entity kinds.
pub trait Entity {
    fn kind(&self) -> EntityKind;
    fn uid(&self) -> Uid;
    fn mwid(&self) -> i64;
    fn sorting_key(&self) -> SortingKey;
    fn repr_name(&self) -> String;
    /// Kind-tagged plain mapping; entries resolve their links through `ns`.
    fn to_dict(&self, ns: &Namespace) -> Result<Value>;
}

macro_rules! order_by_sorting_key {
    ($($ty:ty),*) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    self.sorting_key() == other.sorting_key()
                }
            }

            impl Eq for $ty {}

            impl PartialOrd for $ty {
                fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                    Some(self.cmp(other))
                }
            }

            impl Ord for $ty {
                fn cmp(&self, other: &Self) -> Ordering {
                    self.sorting_key().cmp(&other.sorting_key())
                }
            }
        )*
    };
}

order_by_sorting_key!(Account, Counterpart, Category, Entry);

fn check_mwid(mwid: i64, what: &str) -> Result<()> {
    if mwid == NEW_MWID || mwid > 0 {
        Ok(())
    } else {
        Err(validation(format!(
            "{} mwid must be -1 or positive, got {}",
            what, mwid
        )))
    }
}

fn check_color(color: &str, what: &str) -> Result<()> {
    if RGB_RE.is_match(color) {
        Ok(())
    } else {
        Err(validation(format!(
            "{} color '{}' is not in #RRGGBB format",
            what, color
        )))
    }
}

/// High-water mark of account orders, owned by one wallet.
#[derive(Debug, Clone, Default)]
pub struct OrderTracker {
    highest: u32,
}

impl OrderTracker {
    pub fn observe(&mut self, order: u32) {
        self.highest = self.highest.max(order);
    }

    pub fn next(&mut self) -> Result<u32> {
        let next = self.highest + 1;
        if next > MAX_ORDER {
            return Err(validation(format!(
                "No account order left above {}",
                self.highest
            )));
        }
        self.highest = next;
        Ok(next)
    }

    /// Like `next`, but once the slots run out every caller shares the
    /// last one. Used for accounts synthesized from stored rows.
    pub fn next_or_last(&mut self) -> u32 {
        self.next().unwrap_or(MAX_ORDER)
    }
}

// Account

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    uid: Uid,
    mwid: i64,
    name: String,
    order: u32,
    color: String,
    pub is_visible: bool,
    pub is_legacy: bool,
}

impl Account {
    /// Creates an account; without `order` it takes the tracker's next slot.
    pub fn new(
        mwid: i64,
        name: &str,
        order: Option<u32>,
        orders: &mut OrderTracker,
    ) -> Result<Self> {
        check_mwid(mwid, "Account")?;
        check_account_name(name)?;
        let order = match order {
            Some(o) => {
                check_order(o)?;
                orders.observe(o);
                o
            }
            None => orders.next()?,
        };
        Ok(Self {
            uid: Uid::new(),
            mwid,
            name: name.to_string(),
            order,
            color: DEFAULT_COLOR.to_string(),
            is_visible: true,
            is_legacy: false,
        })
    }

    pub fn with_color(mut self, color: &str) -> Result<Self> {
        self.set_color(color)?;
        Ok(self)
    }

    pub fn hidden(mut self) -> Self {
        self.is_visible = false;
        self
    }

    pub fn legacy(mut self) -> Self {
        self.is_legacy = true;
        self
    }

    pub(crate) fn with_uid(mut self, uid: Uid) -> Self {
        self.uid = uid;
        self
    }

    pub(crate) fn set_mwid(&mut self, mwid: i64) {
        self.mwid = mwid;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        check_account_name(name)?;
        self.name = name.to_string();
        Ok(())
    }

    pub fn set_order(&mut self, order: u32) -> Result<()> {
        check_order(order)?;
        self.order = order;
        Ok(())
    }

    pub fn set_color(&mut self, color: &str) -> Result<()> {
        check_color(color, "Account")?;
        self.color = color.to_string();
        Ok(())
    }
}

fn check_account_name(name: &str) -> Result<()> {
    let Some(first) = name.chars().next() else {
        return Err(validation("Account name cannot be empty"));
    };
    if name.chars().any(char::is_whitespace) {
        return Err(validation(format!(
            "Account name '{}' contains whitespace",
            name
        )));
    }
    if !first.is_uppercase() {
        return Err(validation(format!(
            "Account name '{}' must start with an uppercase letter",
            name
        )));
    }
    Ok(())
}

fn check_order(order: u32) -> Result<()> {
    if (1..=MAX_ORDER).contains(&order) {
        Ok(())
    } else {
        Err(validation(format!(
            "Account order {} out of range 1..={}",
            order, MAX_ORDER
        )))
    }
}

impl Entity for Account {
    fn kind(&self) -> EntityKind {
        EntityKind::Account
    }

    fn uid(&self) -> Uid {
        self.uid
    }

    fn mwid(&self) -> i64 {
        self.mwid
    }

    fn sorting_key(&self) -> SortingKey {
        SortingKey::Party {
            order: self.order,
            rank: 0,
            name: self.name.clone(),
        }
    }

    fn repr_name(&self) -> String {
        format!("@{}", self.name)
    }

    fn to_dict(&self, _ns: &Namespace) -> Result<Value> {
        Ok(json!({
            "kind": "account",
            "mwid": self.mwid,
            "name": self.name,
            "order": self.order,
            "color": self.color,
            "is_visible": self.is_visible,
            "is_legacy": self.is_legacy,
        }))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_legacy {
            write!(f, "Legacy")?;
        }
        write!(
            f,
            "Account[{:0>4}]('{}', '{}', {}, {})",
            self.mwid,
            self.name,
            self.color,
            self.order,
            u8::from(self.is_visible)
        )
    }
}

// Counterpart

/// An external payer or payee. It has no row of its own in the backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counterpart {
    uid: Uid,
    name: String,
}

impl Counterpart {
    /// Backups carry rows with an empty payee, so an empty name is valid.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        Ok(Self {
            uid: Uid::new(),
            name: name.to_string(),
        })
    }

    pub(crate) fn with_uid(mut self, uid: Uid) -> Self {
        self.uid = uid;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.name = name.trim().to_string();
        Ok(())
    }
}

impl Entity for Counterpart {
    fn kind(&self) -> EntityKind {
        EntityKind::Counterpart
    }

    fn uid(&self) -> Uid {
        self.uid
    }

    fn mwid(&self) -> i64 {
        0
    }

    fn sorting_key(&self) -> SortingKey {
        SortingKey::Party {
            order: MAX_ORDER,
            rank: 1,
            name: self.name.clone(),
        }
    }

    fn repr_name(&self) -> String {
        self.name.clone()
    }

    fn to_dict(&self, _ns: &Namespace) -> Result<Value> {
        Ok(json!({
            "kind": "counterpart",
            "mwid": 0,
            "name": self.name,
        }))
    }
}

impl fmt::Display for Counterpart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Counterpart('{}')", self.name)
    }
}

// Category

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    uid: Uid,
    mwid: i64,
    code: String,
    name: String,
    kind: EntryType,
    icon_id: u8,
    color: String,
    pub is_legacy: bool,
}

impl Category {
    pub fn new(mwid: i64, code: &str, name: &str, kind: EntryType) -> Result<Self> {
        check_mwid(mwid, "Category")?;
        check_code(code)?;
        check_category_name(name)?;
        Ok(Self {
            uid: Uid::new(),
            mwid,
            code: code.to_string(),
            name: name.to_string(),
            kind,
            icon_id: 0,
            color: DEFAULT_COLOR.to_string(),
            is_legacy: false,
        })
    }

    /// Builds a category from its stored form, `"A01. Name"`.
    pub fn from_repr(mwid: i64, repr: &str, kind: EntryType) -> Result<Self> {
        let (code, name) = split_category_repr(repr)?;
        Self::new(mwid, &code, &name, kind)
    }

    pub fn with_color(mut self, color: &str) -> Result<Self> {
        self.set_color(color)?;
        Ok(self)
    }

    pub fn with_icon(mut self, icon_id: u8) -> Result<Self> {
        self.set_icon_id(icon_id)?;
        Ok(self)
    }

    pub fn legacy(mut self) -> Self {
        self.is_legacy = true;
        self
    }

    pub(crate) fn with_uid(mut self, uid: Uid) -> Self {
        self.uid = uid;
        self
    }

    pub(crate) fn set_mwid(&mut self, mwid: i64) {
        self.mwid = mwid;
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryType {
        self.kind
    }

    pub fn icon_id(&self) -> u8 {
        self.icon_id
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_code(&mut self, code: &str) -> Result<()> {
        check_code(code)?;
        self.code = code.to_string();
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        check_category_name(name)?;
        self.name = name.to_string();
        Ok(())
    }

    pub fn set_icon_id(&mut self, icon_id: u8) -> Result<()> {
        if icon_id > MAX_ICON_ID {
            return Err(validation(format!(
                "Category icon {} out of range 0..={}",
                icon_id, MAX_ICON_ID
            )));
        }
        self.icon_id = icon_id;
        Ok(())
    }

    pub fn set_color(&mut self, color: &str) -> Result<()> {
        check_color(color, "Category")?;
        self.color = color.to_string();
        Ok(())
    }
}

fn check_code(code: &str) -> Result<()> {
    if CODE_RE.is_match(code) {
        Ok(())
    } else {
        Err(validation(format!(
            "Category code '{}' must be an uppercase letter followed by two digits",
            code
        )))
    }
}

fn check_category_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains('\n') {
        return Err(validation(format!("Invalid category name '{}'", name)));
    }
    Ok(())
}

pub fn split_category_repr(repr: &str) -> Result<(String, String)> {
    let caps = CATEGORY_REPR_RE
        .captures(repr.trim())
        .ok_or_else(|| validation(format!("Invalid category name format '{}'", repr)))?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

impl Entity for Category {
    fn kind(&self) -> EntityKind {
        EntityKind::Category
    }

    fn uid(&self) -> Uid {
        self.uid
    }

    fn mwid(&self) -> i64 {
        self.mwid
    }

    fn sorting_key(&self) -> SortingKey {
        SortingKey::Category {
            code: self.code.clone(),
        }
    }

    fn repr_name(&self) -> String {
        format!("{}. {}", self.code, self.name)
    }

    fn to_dict(&self, _ns: &Namespace) -> Result<Value> {
        Ok(json!({
            "kind": "category",
            "mwid": self.mwid,
            "code": self.code,
            "name": self.name,
            "type": self.kind.sign(),
            "icon_id": self.icon_id,
            "color": self.color,
            "is_legacy": self.is_legacy,
        }))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_legacy {
            write!(f, "Legacy")?;
        }
        write!(
            f,
            "Category[{:0>4}]('{}. {}', {}, '{}', {})",
            self.mwid,
            self.code,
            self.name,
            self.kind.label(),
            self.color,
            self.icon_id
        )
    }
}

// Links

/// Back-reference from an entry to an entity owned by another collection.
///
/// `mwid` and `label` are snapshots refreshed by the namespace; identity is
/// the `uid` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    uid: Uid,
    pub(crate) mwid: i64,
    pub(crate) label: String,
}

impl Link {
    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn mwid(&self) -> i64 {
        self.mwid
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for Link {}

impl From<&Category> for Link {
    fn from(c: &Category) -> Self {
        Link {
            uid: c.uid,
            mwid: c.mwid,
            label: c.code.clone(),
        }
    }
}

/// Endpoint of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    Account(Link),
    Counterpart(Link),
}

impl Party {
    pub fn link(&self) -> &Link {
        match self {
            Party::Account(l) | Party::Counterpart(l) => l,
        }
    }

    pub(crate) fn link_mut(&mut self) -> &mut Link {
        match self {
            Party::Account(l) | Party::Counterpart(l) => l,
        }
    }

    pub fn uid(&self) -> Uid {
        self.link().uid
    }

    pub fn is_account(&self) -> bool {
        matches!(self, Party::Account(_))
    }

    pub fn repr_name(&self) -> String {
        match self {
            Party::Account(l) => format!("@{}", l.label),
            Party::Counterpart(l) => l.label.clone(),
        }
    }
}

impl From<&Account> for Party {
    fn from(a: &Account) -> Self {
        Party::Account(Link {
            uid: a.uid,
            mwid: a.mwid,
            label: a.name.clone(),
        })
    }
}

impl From<&Counterpart> for Party {
    fn from(c: &Counterpart) -> Self {
        Party::Counterpart(Link {
            uid: c.uid,
            mwid: 0,
            label: c.name.clone(),
        })
    }
}

// Entry

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    uid: Uid,
    mwid: i64,
    amount: Decimal,
    date: NaiveDate,
    kind: EntryType,
    source: Party,
    target: Party,
    category: Link,
    item: String,
    details: String,
    pub is_bill: bool,
}

impl Entry {
    pub fn new(
        mwid: i64,
        amount: Decimal,
        date: NaiveDate,
        kind: EntryType,
        source: impl Into<Party>,
        target: impl Into<Party>,
        category: &Category,
    ) -> Result<Self> {
        check_mwid(mwid, "Entry")?;
        let amount = normalize_amount(amount)?;
        let source = source.into();
        let target = target.into();
        check_endpoints(kind, &source, &target)?;
        check_category(kind, category)?;
        Ok(Self {
            uid: Uid::new(),
            mwid,
            amount,
            date,
            kind,
            source,
            target,
            category: Link::from(category),
            item: NO_ITEM.to_string(),
            details: String::new(),
            is_bill: false,
        })
    }

    pub fn with_item(mut self, item: &str) -> Self {
        self.set_item(item);
        self
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.set_details(details);
        self
    }

    pub fn bill(mut self) -> Self {
        self.is_bill = true;
        self
    }

    pub(crate) fn set_mwid(&mut self, mwid: i64) {
        self.mwid = mwid;
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn kind(&self) -> EntryType {
        self.kind
    }

    pub fn source(&self) -> &Party {
        &self.source
    }

    pub fn target(&self) -> &Party {
        &self.target
    }

    pub fn category(&self) -> &Link {
        &self.category
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn set_amount(&mut self, amount: Decimal) -> Result<()> {
        self.amount = normalize_amount(amount)?;
        Ok(())
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
    }

    /// The item is stored as the first line of the note, so line breaks
    /// are folded into single spaces.
    pub fn set_item(&mut self, item: &str) {
        let item = item
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        self.item = if item.is_empty() {
            NO_ITEM.to_string()
        } else {
            item
        };
    }

    /// Details are read back trimmed, so they are kept trimmed.
    pub fn set_details(&mut self, details: &str) {
        self.details = details.trim().to_string();
    }

    pub fn set_source(&mut self, source: impl Into<Party>) -> Result<()> {
        let source = source.into();
        check_endpoints(self.kind, &source, &self.target)?;
        self.source = source;
        Ok(())
    }

    pub fn set_target(&mut self, target: impl Into<Party>) -> Result<()> {
        let target = target.into();
        check_endpoints(self.kind, &self.source, &target)?;
        self.target = target;
        Ok(())
    }

    /// Replaces both endpoints at once, for swaps that no single setter allows.
    pub fn set_endpoints(
        &mut self,
        source: impl Into<Party>,
        target: impl Into<Party>,
    ) -> Result<()> {
        let source = source.into();
        let target = target.into();
        check_endpoints(self.kind, &source, &target)?;
        self.source = source;
        self.target = target;
        Ok(())
    }

    pub fn set_category(&mut self, category: &Category) -> Result<()> {
        check_category(self.kind, category)?;
        self.category = Link::from(category);
        Ok(())
    }

    pub fn has_account(&self, account: &Account) -> bool {
        self.source.uid() == account.uid || self.target.uid() == account.uid
    }

    /// Name-based variant of [`Entry::has_account`]; accepts `Name` or `@Name`.
    pub fn has_account_named(&self, name: &str) -> bool {
        let name = name.strip_prefix('@').unwrap_or(name);
        [&self.source, &self.target]
            .into_iter()
            .any(|p| p.is_account() && p.link().label == name)
    }

    /// -1 when money leaves `who`, +1 when it arrives, 0 when not involved.
    pub fn flow<E: Entity + ?Sized>(&self, who: &E) -> i8 {
        self.flow_of(who.uid())
    }

    pub fn flow_of(&self, uid: Uid) -> i8 {
        if self.source.uid() == uid {
            -1
        } else if self.target.uid() == uid {
            1
        } else {
            0
        }
    }

    pub(crate) fn links_mut(&mut self) -> [&mut Link; 3] {
        [
            self.source.link_mut(),
            self.target.link_mut(),
            &mut self.category,
        ]
    }
}

fn normalize_amount(amount: Decimal) -> Result<Decimal> {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    if rounded <= Decimal::ZERO {
        return Err(validation(format!(
            "Entry amount must be positive, got {}",
            amount
        )));
    }
    Ok(rounded)
}

fn check_endpoints(kind: EntryType, source: &Party, target: &Party) -> Result<()> {
    if source.uid() == target.uid() {
        return Err(validation(format!(
            "Entry source and target are the same party '{}'",
            source.repr_name()
        )));
    }
    let ok = match (kind, source.is_account(), target.is_account()) {
        (_, false, false) => {
            return Err(validation(
                "Entry source and target cannot both be counterparts",
            ));
        }
        (EntryType::Transfer, true, true) => true,
        (EntryType::Expense, true, false) => true,
        (EntryType::Income, false, true) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(validation(format!(
            "{} entry cannot go from '{}' to '{}'",
            kind.label(),
            source.repr_name(),
            target.repr_name()
        )))
    }
}

fn check_category(kind: EntryType, category: &Category) -> Result<()> {
    if category.kind() == kind {
        Ok(())
    } else {
        Err(validation(format!(
            "{} entry cannot have {} category '{}'",
            kind.label(),
            category.kind().label(),
            category.code()
        )))
    }
}

impl Entity for Entry {
    fn kind(&self) -> EntityKind {
        EntityKind::Entry
    }

    fn uid(&self) -> Uid {
        self.uid
    }

    fn mwid(&self) -> i64 {
        self.mwid
    }

    fn sorting_key(&self) -> SortingKey {
        SortingKey::Entry {
            date: self.date,
            mwid: self.mwid,
            tiebreak: self.uid.as_u128(),
        }
    }

    fn repr_name(&self) -> String {
        format!("{}:{}", self.date.format("%Y%m%d"), self.item)
    }

    fn to_dict(&self, ns: &Namespace) -> Result<Value> {
        let source = ns.party_name(&self.source)?;
        let target = ns.party_name(&self.target)?;
        let category = ns.category_of(self)?;
        Ok(json!({
            "kind": "entry",
            "mwid": self.mwid,
            "amount": format!("{:.2}", self.amount),
            "date": self.date.to_string(),
            "type": self.kind.sign(),
            "source": source,
            "target": target,
            "category": category.code(),
            "item": self.item,
            "details": self.details,
            "is_bill": self.is_bill,
        }))
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entry[{:0>4}]({:>8.2} {} {} --> {} [{}] '{}')",
            self.mwid,
            self.amount,
            self.date,
            self.source.repr_name(),
            self.target.repr_name(),
            self.category.label,
            self.item
        )
    }
}

/// Borrowed view over any entity of a wallet.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Account(&'a Account),
    Counterpart(&'a Counterpart),
    Category(&'a Category),
    Entry(&'a Entry),
}

impl<'a> EntityRef<'a> {
    fn inner(&self) -> &'a dyn Entity {
        match *self {
            EntityRef::Account(a) => a,
            EntityRef::Counterpart(c) => c,
            EntityRef::Category(c) => c,
            EntityRef::Entry(e) => e,
        }
    }

    pub fn as_account(&self) -> Option<&'a Account> {
        match *self {
            EntityRef::Account(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_counterpart(&self) -> Option<&'a Counterpart> {
        match *self {
            EntityRef::Counterpart(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&'a Category> {
        match *self {
            EntityRef::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&'a Entry> {
        match *self {
            EntityRef::Entry(e) => Some(e),
            _ => None,
        }
    }
}

impl Entity for EntityRef<'_> {
    fn kind(&self) -> EntityKind {
        self.inner().kind()
    }

    fn uid(&self) -> Uid {
        self.inner().uid()
    }

    fn mwid(&self) -> i64 {
        self.inner().mwid()
    }

    fn sorting_key(&self) -> SortingKey {
        self.inner().sorting_key()
    }

    fn repr_name(&self) -> String {
        self.inner().repr_name()
    }

    fn to_dict(&self, ns: &Namespace) -> Result<Value> {
        self.inner().to_dict(ns)
    }
}

impl PartialEq for EntityRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.sorting_key() == other.sorting_key()
    }
}

impl Eq for EntityRef<'_> {}

impl PartialOrd for EntityRef<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityRef<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorting_key().cmp(&other.sorting_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_round_half_away_from_zero() {
        assert_eq!(
            normalize_amount(Decimal::new(10005, 3)).unwrap().to_string(),
            "10.01"
        );
        assert_eq!(normalize_amount(Decimal::new(7, 0)).unwrap().to_string(), "7.00");
        assert!(normalize_amount(Decimal::new(4, 3)).is_err());
    }

    #[test]
    fn category_repr_splits_code_and_name() {
        let (code, name) = split_category_repr("B20. Supermercados").unwrap();
        assert_eq!(code, "B20");
        assert_eq!(name, "Supermercados");
        assert!(split_category_repr("B20 Supermercados").is_err());
    }

    #[test]
    fn entry_dict_resolves_links() {
        let mut orders = OrderTracker::default();
        let mut ns = Namespace::default();
        ns.accounts
            .push(Account::new(3, "Cash", Some(1), &mut orders).unwrap());
        ns.counterparts.push(Counterpart::new("Employer").unwrap());
        ns.categories
            .push(Category::new(1, "A01", "Salary", EntryType::Income).unwrap());
        let entry = Entry::new(
            NEW_MWID,
            Decimal::new(50, 0),
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            EntryType::Income,
            &ns.counterparts[0],
            &ns.accounts[0],
            &ns.categories[0],
        )
        .unwrap();

        let dict = entry.to_dict(&ns).unwrap();
        assert_eq!(dict["kind"], "entry");
        assert_eq!(dict["amount"], "50.00");
        assert_eq!(dict["source"], "Employer");
        assert_eq!(dict["target"], "@Cash");
        assert_eq!(dict["category"], "A01");
        assert_eq!(dict["type"], 1);
        assert_eq!(ns.accounts[0].to_dict(&ns).unwrap()["order"], 1);

        ns.counterparts.clear();
        assert!(matches!(
            entry.to_dict(&ns),
            Err(crate::errors::MwxError::Reference(_))
        ));
    }

    #[test]
    fn order_tracker_stops_at_max() {
        let mut orders = OrderTracker::default();
        orders.observe(MAX_ORDER - 1);
        assert_eq!(orders.next().unwrap(), MAX_ORDER);
        assert!(orders.next().is_err());
        assert_eq!(orders.next_or_last(), MAX_ORDER);
    }
}
