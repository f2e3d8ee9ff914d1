/*
MIT License

Copyright (c) 2026 Raja Lehtihet and Wael El Oraiby

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Variable keys, alias resolution and value substitution for an
//! optimization-modeling layer.
//!
//! This crate provides:
//! - Variable keys ([`VarKey`]) for scalars, vectors and vector elements,
//!   each reachable by a short name, a lineage-qualified name, or the key.
//! - An alias index that maps every lookup form to canonical keys and
//!   detects when a short name is ambiguous.
//! - A value store with dense, copy-on-write array storage, sweep
//!   placeholders and linked (lazily computed) values.
//! - A substitution classifier splitting raw mappings into constants, sweeps
//!   and linked values, plus a driver expanding sweeps into iterations.
//! - Rich lookup diagnostics with line/column/caret output.
//!
//! # Lookups
//!
//! Any API taking `impl Into<Lookup>` accepts a key, a `&VarKey`, or a string.
//! Strings may carry an index: `"y[1]"`, `"y_Beam[0, 2]"`.
//!
//! # Array collapsing
//!
//! With [`StoreConfig::collapse_arrays`] on, every element of a vector lives
//! in one array stored under the vector key and element lookups index into
//! it. With it off, each element is stored on its own.

mod config;
mod diagnostics;
mod key;
mod lookup;
mod parser;
mod store;
mod substitution;
mod sweep;
mod value;

pub use config::StoreConfig;
pub use diagnostics::AliasParseError;
pub use key::{KeyKind, Quantity, Unit, VarKey};
pub use lookup::{Lookup, SourceSpan};
pub use store::{
    Alias, AliasIndex, KeyError, PresenceIndex, Resolved, SNAPSHOT_VERSION, Snapshot,
    SnapshotEntry, SnapshotValue, Tagged, ValueStore,
};
pub use substitution::{Classified, Substitutions, parse_subs};
pub use sweep::{SweepPlan, evaluate_linked};
pub use value::{ArrayData, Element, Linked, Value, fmt_index, fmt_shape, split_sweep};

#[cfg(test)]
mod tests;
