// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! `find`, `sum` and `budget` over the in-memory collections.
//!
//! A [`Query`] is a conjunction of predicates and keyword filters. Each
//! keyword holds one or more values; the values of one keyword are OR-ed.
//! Selectors (objects, names, codes, ids) are resolved to entity identities
//! once per call before any entity is tested.

use std::collections::HashSet;
use std::ops::{Bound, RangeBounds};

use chrono::Datelike;
use rust_decimal::Decimal;

use crate::daterange::{DateRange, DateSpec, PartialDate};
use crate::errors::{Result, usage};
use crate::models::{Account, Category, Counterpart, Entity, EntityRef, Entry, EntryType, Party, Uid};
use crate::wallet::Namespace;

/// Points at an entity by object identity, name/code or external id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Uid(Uid),
    Name(String),
    Mwid(i64),
}

impl From<Uid> for Selector {
    fn from(uid: Uid) -> Self {
        Selector::Uid(uid)
    }
}

impl From<&Account> for Selector {
    fn from(a: &Account) -> Self {
        Selector::Uid(a.uid())
    }
}

impl From<&Counterpart> for Selector {
    fn from(c: &Counterpart) -> Self {
        Selector::Uid(c.uid())
    }
}

impl From<&Category> for Selector {
    fn from(c: &Category) -> Self {
        Selector::Uid(c.uid())
    }
}

impl From<&Party> for Selector {
    fn from(p: &Party) -> Self {
        Selector::Uid(p.uid())
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        Selector::Name(s.to_string())
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::Name(s)
    }
}

impl From<i64> for Selector {
    fn from(id: i64) -> Self {
        Selector::Mwid(id)
    }
}

/// Resolves a selector to accounts or counterparts.
///
/// `@Name` only matches accounts; a bare name matches counterparts first and
/// falls back to accounts.
pub fn resolve_parties(ns: &Namespace, sel: &Selector) -> Result<Vec<Uid>> {
    let found: Vec<Uid> = match sel {
        Selector::Uid(uid) => ns
            .account(*uid)
            .map(|a| a.uid())
            .or_else(|| ns.counterpart(*uid).map(|c| c.uid()))
            .into_iter()
            .collect(),
        Selector::Name(name) => match name.strip_prefix('@') {
            Some(bare) => ns.account_named(bare).map(|a| a.uid()).into_iter().collect(),
            None => ns
                .counterpart_named(name)
                .map(|c| c.uid())
                .or_else(|| ns.account_named(name).map(|a| a.uid()))
                .into_iter()
                .collect(),
        },
        Selector::Mwid(id) => ns
            .accounts
            .iter()
            .filter(|a| a.mwid() == *id)
            .map(|a| a.uid())
            .collect(),
    };
    if found.is_empty() {
        return Err(usage(format!(
            "{:?} does not match any account or counterpart",
            sel
        )));
    }
    Ok(found)
}

/// Resolves a selector to categories, by identity, code, name, `"A01. Name"` or id.
pub fn resolve_categories(ns: &Namespace, sel: &Selector) -> Result<Vec<Uid>> {
    let found: Vec<Uid> = ns
        .categories
        .iter()
        .filter(|c| match sel {
            Selector::Uid(uid) => c.uid() == *uid,
            Selector::Name(s) => c.code() == s || c.name() == s || c.repr_name() == *s,
            Selector::Mwid(id) => c.mwid() == *id,
        })
        .map(|c| c.uid())
        .collect();
    if found.is_empty() {
        return Err(usage(format!("{:?} does not match any category", sel)));
    }
    Ok(found)
}

/// Resolves a selector that must designate exactly one account or counterpart.
pub fn resolve_single_party(ns: &Namespace, sel: &Selector) -> Result<Uid> {
    match resolve_parties(ns, sel)?.as_slice() {
        [uid] => Ok(*uid),
        many => Err(usage(format!(
            "{:?} is ambiguous, it matches {} parties",
            sel,
            many.len()
        ))),
    }
}

/// Collection a query scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Account,
    Counterpart,
    Category,
    Entry,
    Income,
    Expense,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountSpec {
    Exact(Decimal),
    Range(Bound<Decimal>, Bound<Decimal>),
}

impl AmountSpec {
    /// `[min, max)`; a missing side is unbounded.
    pub fn between(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        AmountSpec::Range(
            min.map_or(Bound::Unbounded, Bound::Included),
            max.map_or(Bound::Unbounded, Bound::Excluded),
        )
    }

    pub fn contains(&self, amount: Decimal) -> bool {
        match self {
            AmountSpec::Exact(v) => *v == amount,
            AmountSpec::Range(lo, hi) => (*lo, *hi).contains(&amount),
        }
    }
}

impl From<Decimal> for AmountSpec {
    fn from(d: Decimal) -> Self {
        AmountSpec::Exact(d)
    }
}

#[derive(Debug, Clone)]
enum Keyword {
    Date(Vec<DateSpec>),
    Year(Vec<i32>),
    Month(Vec<u32>),
    Day(Vec<u32>),
    Amount(Vec<AmountSpec>),
    Source(Vec<Selector>),
    Target(Vec<Selector>),
    Category(Vec<Selector>),
    Account(Vec<Selector>),
    Counterpart(Vec<Selector>),
    Item(String),
    Details(String),
    Name(Vec<String>),
    Mwid(Vec<i64>),
    Kind(Vec<EntryType>),
}

type Predicate<'q> = Box<dyn Fn(EntityRef<'_>) -> anyhow::Result<bool> + 'q>;

/// Conjunction of predicates and keyword filters.
///
/// ```
/// use mwx::query::Query;
/// let q = Query::new().date("2024-01").account("@Cash").category_any(["A01", "B02"]);
/// # let _ = q;
/// ```
pub struct Query<'q> {
    scope: Scope,
    predicates: Vec<Predicate<'q>>,
    keywords: Vec<Keyword>,
    flow: Option<i8>,
}

impl Default for Query<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'q> Query<'q> {
    pub fn new() -> Self {
        Query {
            scope: Scope::Entry,
            predicates: Vec::new(),
            keywords: Vec::new(),
            flow: None,
        }
    }

    pub fn entity(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn filter(mut self, f: impl Fn(EntityRef<'_>) -> bool + 'q) -> Self {
        self.predicates
            .push(Box::new(move |e: EntityRef<'_>| -> anyhow::Result<bool> { Ok(f(e)) }));
        self
    }

    /// A predicate that may fail; its error aborts the query as a usage error.
    pub fn try_filter(mut self, f: impl Fn(EntityRef<'_>) -> anyhow::Result<bool> + 'q) -> Self {
        self.predicates.push(Box::new(f));
        self
    }

    fn push(mut self, kw: Keyword) -> Self {
        self.keywords.push(kw);
        self
    }

    pub fn date(self, date: impl Into<DateSpec>) -> Self {
        self.push(Keyword::Date(vec![date.into()]))
    }

    pub fn date_any<D: Into<DateSpec>>(self, dates: impl IntoIterator<Item = D>) -> Self {
        self.push(Keyword::Date(dates.into_iter().map(Into::into).collect()))
    }

    pub fn year(self, year: i32) -> Self {
        self.push(Keyword::Year(vec![year]))
    }

    pub fn month(self, month: u32) -> Self {
        self.push(Keyword::Month(vec![month]))
    }

    pub fn day(self, day: u32) -> Self {
        self.push(Keyword::Day(vec![day]))
    }

    pub fn amount(self, amount: impl Into<AmountSpec>) -> Self {
        self.push(Keyword::Amount(vec![amount.into()]))
    }

    pub fn amount_any<A: Into<AmountSpec>>(self, amounts: impl IntoIterator<Item = A>) -> Self {
        self.push(Keyword::Amount(amounts.into_iter().map(Into::into).collect()))
    }

    pub fn source(self, sel: impl Into<Selector>) -> Self {
        self.push(Keyword::Source(vec![sel.into()]))
    }

    pub fn source_any<S: Into<Selector>>(self, sels: impl IntoIterator<Item = S>) -> Self {
        self.push(Keyword::Source(sels.into_iter().map(Into::into).collect()))
    }

    pub fn target(self, sel: impl Into<Selector>) -> Self {
        self.push(Keyword::Target(vec![sel.into()]))
    }

    pub fn target_any<S: Into<Selector>>(self, sels: impl IntoIterator<Item = S>) -> Self {
        self.push(Keyword::Target(sels.into_iter().map(Into::into).collect()))
    }

    pub fn category(self, sel: impl Into<Selector>) -> Self {
        self.push(Keyword::Category(vec![sel.into()]))
    }

    pub fn category_any<S: Into<Selector>>(self, sels: impl IntoIterator<Item = S>) -> Self {
        self.push(Keyword::Category(sels.into_iter().map(Into::into).collect()))
    }

    /// Matches entries whose source or target is the selected party.
    pub fn account(self, sel: impl Into<Selector>) -> Self {
        self.push(Keyword::Account(vec![sel.into()]))
    }

    pub fn account_any<S: Into<Selector>>(self, sels: impl IntoIterator<Item = S>) -> Self {
        self.push(Keyword::Account(sels.into_iter().map(Into::into).collect()))
    }

    pub fn counterpart(self, sel: impl Into<Selector>) -> Self {
        self.push(Keyword::Counterpart(vec![sel.into()]))
    }

    pub fn counterpart_any<S: Into<Selector>>(self, sels: impl IntoIterator<Item = S>) -> Self {
        self.push(Keyword::Counterpart(sels.into_iter().map(Into::into).collect()))
    }

    /// Keeps entries whose flow relative to the `account` (else `source`,
    /// else `target`) selector equals `sign`.
    pub fn flow(mut self, sign: i8) -> Self {
        self.flow = Some(sign);
        self
    }

    /// Case-insensitive substring, or exact match when prefixed with `!`.
    pub fn item(self, text: &str) -> Self {
        self.push(Keyword::Item(text.to_string()))
    }

    pub fn details(self, text: &str) -> Self {
        self.push(Keyword::Details(text.to_string()))
    }

    pub fn name(self, name: &str) -> Self {
        self.push(Keyword::Name(vec![name.to_string()]))
    }

    pub fn name_any<S: Into<String>>(self, names: impl IntoIterator<Item = S>) -> Self {
        self.push(Keyword::Name(names.into_iter().map(Into::into).collect()))
    }

    pub fn mwid(self, mwid: i64) -> Self {
        self.push(Keyword::Mwid(vec![mwid]))
    }

    pub fn kind(self, kind: EntryType) -> Self {
        self.push(Keyword::Kind(vec![kind]))
    }

    fn compile(&self, ns: &Namespace) -> Result<Vec<Cond>> {
        let mut conds = Vec::with_capacity(self.keywords.len() + 1);
        let mut flow_anchor: [Option<&Vec<Selector>>; 3] = [None, None, None];

        for kw in &self.keywords {
            let cond = match kw {
                Keyword::Date(specs) => Cond::Date(
                    specs
                        .iter()
                        .map(DateSpec::normalize)
                        .collect::<Result<Vec<_>>>()?,
                ),
                Keyword::Year(v) => Cond::Year(v.clone()),
                Keyword::Month(v) => Cond::Month(v.clone()),
                Keyword::Day(v) => Cond::Day(v.clone()),
                Keyword::Amount(v) => Cond::Amount(v.clone()),
                Keyword::Source(sels) => {
                    flow_anchor[1] = flow_anchor[1].or(Some(sels));
                    Cond::Source(resolve_all(ns, sels, resolve_parties)?)
                }
                Keyword::Target(sels) => {
                    flow_anchor[2] = flow_anchor[2].or(Some(sels));
                    Cond::Target(resolve_all(ns, sels, resolve_parties)?)
                }
                Keyword::Account(sels) => {
                    flow_anchor[0] = flow_anchor[0].or(Some(sels));
                    Cond::Either(resolve_all(ns, sels, resolve_parties)?)
                }
                Keyword::Counterpart(sels) => Cond::Either(resolve_all(ns, sels, resolve_parties)?),
                Keyword::Category(sels) => Cond::Category(resolve_all(ns, sels, resolve_categories)?),
                Keyword::Item(t) => Cond::Item(TextMatch::new(t)),
                Keyword::Details(t) => Cond::Details(TextMatch::new(t)),
                Keyword::Name(v) => Cond::Name(v.clone()),
                Keyword::Mwid(v) => Cond::Mwid(v.clone()),
                Keyword::Kind(v) => Cond::Kind(v.clone()),
            };
            conds.push(cond);
        }

        if let Some(sign) = self.flow {
            let sels = flow_anchor
                .into_iter()
                .flatten()
                .next()
                .ok_or_else(|| usage("'flow' needs an account, source or target filter"))?;
            let [sel] = sels.as_slice() else {
                return Err(usage("'flow' needs exactly one account to be relative to"));
            };
            conds.push(Cond::Flow(resolve_single_party(ns, sel)?, sign));
        }
        Ok(conds)
    }
}

fn resolve_all(
    ns: &Namespace,
    sels: &[Selector],
    resolve: fn(&Namespace, &Selector) -> Result<Vec<Uid>>,
) -> Result<HashSet<Uid>> {
    let mut out = HashSet::new();
    for sel in sels {
        out.extend(resolve(ns, sel)?);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
enum TextMatch {
    Exact(String),
    Contains(String),
}

impl TextMatch {
    fn new(raw: &str) -> Self {
        match raw.strip_prefix('!') {
            Some(exact) => TextMatch::Exact(exact.to_string()),
            None => TextMatch::Contains(raw.to_lowercase()),
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            TextMatch::Exact(v) => v == text,
            TextMatch::Contains(v) => text.to_lowercase().contains(v.as_str()),
        }
    }
}

#[derive(Debug)]
enum Cond {
    Date(Vec<DateRange>),
    Year(Vec<i32>),
    Month(Vec<u32>),
    Day(Vec<u32>),
    Amount(Vec<AmountSpec>),
    Source(HashSet<Uid>),
    Target(HashSet<Uid>),
    Either(HashSet<Uid>),
    Category(HashSet<Uid>),
    Flow(Uid, i8),
    Item(TextMatch),
    Details(TextMatch),
    Name(Vec<String>),
    Mwid(Vec<i64>),
    Kind(Vec<EntryType>),
}

impl Cond {
    fn matches(&self, entity: EntityRef<'_>) -> bool {
        match entity {
            EntityRef::Entry(e) => self.matches_entry(e),
            EntityRef::Account(a) => match self {
                Cond::Either(uids) | Cond::Source(uids) | Cond::Target(uids) => {
                    uids.contains(&a.uid())
                }
                Cond::Name(names) => names.iter().any(|n| n == a.name()),
                Cond::Mwid(ids) => ids.contains(&a.mwid()),
                _ => false,
            },
            EntityRef::Counterpart(c) => match self {
                Cond::Either(uids) | Cond::Source(uids) | Cond::Target(uids) => {
                    uids.contains(&c.uid())
                }
                Cond::Name(names) => names.iter().any(|n| n == c.name()),
                Cond::Mwid(ids) => ids.contains(&0),
                _ => false,
            },
            EntityRef::Category(c) => match self {
                Cond::Category(uids) => uids.contains(&c.uid()),
                Cond::Name(names) => names.iter().any(|n| n == c.name()),
                Cond::Mwid(ids) => ids.contains(&c.mwid()),
                Cond::Kind(kinds) => kinds.contains(&c.kind()),
                _ => false,
            },
        }
    }

    fn matches_entry(&self, e: &Entry) -> bool {
        match self {
            Cond::Date(ranges) => ranges.iter().any(|r| r.contains(e.date())),
            Cond::Year(v) => v.contains(&e.date().year()),
            Cond::Month(v) => v.contains(&e.date().month()),
            Cond::Day(v) => v.contains(&e.date().day()),
            Cond::Amount(specs) => specs.iter().any(|s| s.contains(e.amount())),
            Cond::Source(uids) => uids.contains(&e.source().uid()),
            Cond::Target(uids) => uids.contains(&e.target().uid()),
            Cond::Either(uids) => {
                uids.contains(&e.source().uid()) || uids.contains(&e.target().uid())
            }
            Cond::Category(uids) => uids.contains(&e.category().uid()),
            Cond::Flow(uid, sign) => e.flow_of(*uid) == *sign,
            Cond::Item(m) => m.matches(e.item()),
            Cond::Details(m) => m.matches(e.details()),
            Cond::Name(_) => false,
            Cond::Mwid(ids) => ids.contains(&e.mwid()),
            Cond::Kind(kinds) => kinds.contains(&e.kind()),
        }
    }
}

fn scan<'a>(ns: &'a Namespace, scope: Scope) -> Vec<EntityRef<'a>> {
    let entries_of = |kind: EntryType| {
        ns.entries
            .iter()
            .filter(move |e| e.kind() == kind)
            .map(EntityRef::Entry)
            .collect::<Vec<_>>()
    };
    match scope {
        Scope::All => ns.entities().collect(),
        Scope::Account => ns.accounts.iter().map(EntityRef::Account).collect(),
        Scope::Counterpart => ns.counterparts.iter().map(EntityRef::Counterpart).collect(),
        Scope::Category => ns.categories.iter().map(EntityRef::Category).collect(),
        Scope::Entry => ns.entries.iter().map(EntityRef::Entry).collect(),
        Scope::Income => entries_of(EntryType::Income),
        Scope::Expense => entries_of(EntryType::Expense),
        Scope::Transfer => entries_of(EntryType::Transfer),
    }
}

/// Every entity of the query's scope satisfying all of its conditions.
pub fn find<'a>(ns: &'a Namespace, query: &Query<'_>) -> Result<Vec<EntityRef<'a>>> {
    let conds = query.compile(ns)?;
    let mut out = Vec::new();
    for entity in scan(ns, query.scope) {
        if !conds.iter().all(|c| c.matches(entity)) {
            continue;
        }
        let mut keep = true;
        for pred in &query.predicates {
            let ok = pred(entity).map_err(|err| {
                usage(format!(
                    "predicate failed on {}: {:#}",
                    entity.repr_name(),
                    err
                ))
            })?;
            if !ok {
                keep = false;
                break;
            }
        }
        if keep {
            out.push(entity);
        }
    }
    Ok(out)
}

/// [`find`] restricted to entries.
pub fn find_entries<'a>(ns: &'a Namespace, query: &Query<'_>) -> Result<Vec<&'a Entry>> {
    match query.scope {
        Scope::Entry | Scope::Income | Scope::Expense | Scope::Transfer => {}
        other => {
            return Err(usage(format!("{:?} scope does not yield entries", other)));
        }
    }
    Ok(find(ns, query)?
        .into_iter()
        .filter_map(|e| e.as_entry())
        .collect())
}

/// Signed total of `amount * flow(account)` over the matching entries.
pub fn sum(
    ns: &Namespace,
    account: impl Into<Selector>,
    date: impl Into<DateSpec>,
    query: Query<'_>,
) -> Result<Decimal> {
    let who = resolve_single_party(ns, &account.into())?;
    let query = query.account(who).date(date);
    let total: Decimal = find_entries(ns, &query)?
        .into_iter()
        .map(|e| e.amount() * Decimal::from(e.flow_of(who)))
        .sum();
    Ok(total.round_dp(2))
}

/// Running balance contribution of `account` up to and including `date`.
pub fn budget(
    ns: &Namespace,
    account: impl Into<Selector>,
    date: impl Into<DateSpec>,
    query: Query<'_>,
) -> Result<Decimal> {
    let point = match date.into() {
        DateSpec::Day(d) => PartialDate::from_date(d),
        DateSpec::Text(s) => PartialDate::parse(&s)?,
        other => {
            return Err(usage(format!(
                "budget takes a single date, got {:?}",
                other
            )));
        }
    };
    sum(ns, account, DateRange::through(point), query)
}
