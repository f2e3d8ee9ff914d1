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

//! Alias resolution and value storage.
//!
//! [`AliasIndex`] maps every lookup object to the canonical keys it denotes.
//! [`ValueStore`] keeps one value per canonical key on top of it, and
//! [`PresenceIndex`] answers membership questions for a model's variables
//! without storing values.

mod alias_index;
mod errors;
mod presence;
mod snapshot;
mod value_store;

pub use alias_index::{Alias, AliasIndex, Resolved};
pub use errors::KeyError;
pub use presence::PresenceIndex;
pub use snapshot::{SNAPSHOT_VERSION, Snapshot, SnapshotEntry, SnapshotValue};
pub use value_store::{Tagged, ValueStore};
