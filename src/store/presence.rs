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

//! Membership index over a model's variables.

use super::KeyError;
use super::alias_index::{Alias, AliasIndex, pick_indexed};
use crate::key::{KeyKind, VarKey};
use crate::lookup::Lookup;
use indexmap::IndexSet;

/// Which variables a model references, and what each alias could mean.
///
/// Holds no values. Vector keys are tracked element by element, so the
/// bucket of a vector key lists its elements.
#[derive(Debug, Clone)]
pub struct PresenceIndex {
    index: AliasIndex,
    keys: IndexSet<VarKey>,
}

impl Default for PresenceIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceIndex {
    pub fn new() -> Self {
        Self {
            index: AliasIndex::new(false),
            keys: IndexSet::new(),
        }
    }

    pub fn from_keys(keys: impl IntoIterator<Item = VarKey>) -> Self {
        let mut presence = Self::new();
        presence.extend(keys);
        presence
    }

    /// Adds a key; a vector key adds each of its elements.
    pub fn insert(&mut self, key: VarKey) {
        let members = match key.kind() {
            KeyKind::Array => key.elements(),
            KeyKind::Scalar | KeyKind::ArrayElement => vec![key],
        };
        let fresh: Vec<VarKey> = members
            .into_iter()
            .filter(|k| self.keys.insert(k.clone()))
            .collect();
        self.index.register(fresh);
    }

    pub fn extend(&mut self, keys: impl IntoIterator<Item = VarKey>) {
        for key in keys {
            self.insert(key);
        }
    }

    /// Removes a key (or every element of a vector key).
    pub fn remove(&mut self, key: &VarKey) {
        let members = match key.kind() {
            KeyKind::Array => key.elements(),
            KeyKind::Scalar | KeyKind::ArrayElement => vec![key.clone()],
        };
        for member in members {
            if self.keys.shift_remove(&member) {
                self.index.remove(&member);
            }
        }
    }

    /// Returns whether the lookup denotes at least one tracked variable.
    ///
    /// An alias shared by unrelated variables counts as present.
    pub fn contains(&self, lookup: impl Into<Lookup>) -> bool {
        match lookup.into() {
            Lookup::Key(key) => self.index.contains_alias(&Alias::Key(key)),
            Lookup::Alias { name, index: None } => self.index.contains_alias(&Alias::Name(name)),
            indexed => self
                .resolve(&indexed)
                .is_ok_and(|key| self.keys.contains(&key)),
        }
    }

    /// Every tracked key the lookup could mean, in registration order.
    pub fn candidates(&self, lookup: &Lookup) -> Vec<VarKey> {
        let found = match lookup {
            Lookup::Key(key) => self.index.bucket(&Alias::Key(key.clone())),
            Lookup::Alias { name, index: None } => self.named(name),
            Lookup::Alias { .. } => self.resolve(lookup).ok().map(|key| vec![key]),
        };
        found.unwrap_or_default()
    }

    /// Tracked keys filed under a short or qualified name.
    pub(crate) fn named(&self, name: &str) -> Option<Vec<VarKey>> {
        self.index.bucket(&Alias::Name(name.to_string()))
    }

    /// Resolves a lookup to exactly one key.
    ///
    /// Elements of one vector resolve to the vector key; an indexed alias
    /// resolves to the element key.
    pub fn resolve(&self, lookup: &Lookup) -> Result<VarKey, KeyError> {
        match lookup {
            Lookup::Key(key) if self.index.contains_alias(&Alias::Key(key.clone())) => {
                Ok(key.clone())
            }
            Lookup::Key(key) => Err(KeyError::UnknownKey(key.to_string())),
            Lookup::Alias { name, index } => {
                let candidates = self
                    .named(name)
                    .ok_or_else(|| KeyError::UnknownKey(lookup.to_string()))?;
                pick_indexed(name, index.as_deref(), candidates)
            }
        }
    }

    /// Tracked keys in insertion order; vectors appear as their elements.
    pub fn keys(&self) -> impl Iterator<Item = &VarKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns whether any alias bucket exists with no member.
    pub fn has_empty_bucket(&self) -> bool {
        self.index.has_empty_bucket()
    }
}
