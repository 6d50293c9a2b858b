// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod cli;
pub mod commands;
pub mod daterange;
pub mod db;
pub mod errors;
pub mod models;
pub mod query;
pub mod utils;
pub mod wallet;
pub mod writer;

pub use daterange::{DateRange, DateSpec, PartialDate};
pub use errors::{MwxError, Result};
pub use models::{Account, Category, Counterpart, Entity, Entry, EntryType, Party};
pub use query::{AmountSpec, Query, Scope, Selector};
pub use wallet::{Namespace, Wallet};
pub use writer::{Classification, Deletion, Verbosity, WriteOptions, WriteReport};
