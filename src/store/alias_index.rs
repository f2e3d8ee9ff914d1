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

//! Alias buckets: which canonical keys each lookup object denotes.

use super::KeyError;
use crate::key::{KeyKind, VarKey};
use crate::lookup::Lookup;
use crate::value::fmt_index;
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::rc::Rc;

/// An object a bucket is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Alias {
    /// A key, filed under itself and (for elements) under its veckey.
    Key(VarKey),
    /// A short or qualified name.
    Name(String),
}

// Buckets are shared between indexes after a bulk merge; `Rc::make_mut`
// copies one before it is mutated.
type Bucket = Rc<IndexSet<VarKey>>;

#[derive(Debug, Clone, Default)]
struct Buckets {
    map: IndexMap<Alias, Bucket>,
    pending: IndexSet<VarKey>,
}

impl Buckets {
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        log::trace!("populating alias buckets for {} keys", pending.len());
        for key in pending {
            for alias in alias_forms(&key) {
                let bucket = self.map.entry(alias).or_default();
                Rc::make_mut(bucket).insert(key.clone());
            }
        }
    }
}

/// Every alias object `key` is filed under.
fn alias_forms(key: &VarKey) -> Vec<Alias> {
    let mut forms = vec![Alias::Key(key.clone())];
    if let Some(veckey) = key.veckey() {
        forms.push(Alias::Key(veckey.clone()));
    }
    forms.extend(key.aliases().into_iter().map(Alias::Name));
    forms
}

/// Resolved storage location: canonical key plus optional element index.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub key: VarKey,
    pub idx: Option<Vec<usize>>,
}

/// Maps lookup objects to the set of canonical keys they denote.
///
/// Registration is lazy: keys are queued and only filed into buckets when a
/// lookup needs them. A bucket never exists empty.
#[derive(Debug, Clone)]
pub struct AliasIndex {
    collapse_arrays: bool,
    state: RefCell<Buckets>,
}

impl AliasIndex {
    pub fn new(collapse_arrays: bool) -> Self {
        Self {
            collapse_arrays,
            state: RefCell::new(Buckets::default()),
        }
    }

    pub fn collapse_arrays(&self) -> bool {
        self.collapse_arrays
    }

    /// Queues keys for bucket population.
    pub fn register(&mut self, keys: impl IntoIterator<Item = VarKey>) {
        let state = self.state.get_mut();
        for key in keys {
            // Filed under itself right away so membership by key needs no flush.
            let own = state.map.entry(Alias::Key(key.clone())).or_default();
            if !own.contains(&key) {
                Rc::make_mut(own).insert(key.clone());
            }
            state.pending.insert(key);
        }
    }

    /// Files every queued key into its buckets.
    pub fn flush(&self) {
        self.state.borrow_mut().flush();
    }

    /// Canonical keys filed under `alias`, or `None` when nothing is.
    pub fn bucket(&self, alias: &Alias) -> Option<Vec<VarKey>> {
        let mut state = self.state.borrow_mut();
        state.flush();
        state.map.get(alias).map(|bucket| bucket.iter().cloned().collect())
    }

    /// Returns whether any key is filed under `alias`.
    pub fn contains_alias(&self, alias: &Alias) -> bool {
        let mut state = self.state.borrow_mut();
        state.flush();
        state.map.contains_key(alias)
    }

    /// Storage location of a key lookup.
    pub fn canonical(&self, key: &VarKey) -> Resolved {
        match (self.collapse_arrays, key.veckey(), key.idx()) {
            (true, Some(veckey), Some(idx)) => Resolved {
                key: veckey.clone(),
                idx: Some(idx.to_vec()),
            },
            _ => Resolved {
                key: key.clone(),
                idx: None,
            },
        }
    }

    /// Resolves a lookup to exactly one storage location.
    ///
    /// Several candidates resolve to their shared veckey; candidates with
    /// different parents are ambiguous.
    pub fn resolve(&self, lookup: &Lookup) -> Result<Resolved, KeyError> {
        let (name, index) = match lookup {
            Lookup::Key(key) => return Ok(self.canonical(key)),
            Lookup::Alias { name, index } => (name, index),
        };
        let candidates = self
            .bucket(&Alias::Name(name.clone()))
            .ok_or_else(|| KeyError::UnknownKey(lookup.to_string()))?;
        Ok(self.canonical(&pick_indexed(name, index.as_deref(), candidates)?))
    }

    /// Removes `key` from every bucket it is filed under, dropping emptied buckets.
    pub fn remove(&mut self, key: &VarKey) {
        let state = self.state.get_mut();
        state.flush();
        for alias in alias_forms(key) {
            let Some(bucket) = state.map.get_mut(&alias) else {
                continue;
            };
            if !bucket.contains(key) {
                continue;
            }
            if bucket.len() == 1 {
                state.map.shift_remove(&alias);
            } else {
                Rc::make_mut(bucket).shift_remove(key);
            }
        }
    }

    /// Unions another index's buckets and queued keys into this one.
    ///
    /// Buckets absent here are shared, not copied.
    pub fn merge_from(&mut self, other: &AliasIndex) {
        let other = other.state.borrow();
        let state = self.state.get_mut();
        for (alias, bucket) in &other.map {
            match state.map.get_mut(alias) {
                Some(mine) => Rc::make_mut(mine).extend(bucket.iter().cloned()),
                None => {
                    state.map.insert(alias.clone(), Rc::clone(bucket));
                }
            }
        }
        state.pending.extend(other.pending.iter().cloned());
    }

    /// Number of buckets, after populating queued keys.
    pub fn bucket_count(&self) -> usize {
        let mut state = self.state.borrow_mut();
        state.flush();
        state.map.len()
    }

    /// Returns whether any bucket exists with no member.
    pub fn has_empty_bucket(&self) -> bool {
        let mut state = self.state.borrow_mut();
        state.flush();
        state.map.values().any(|bucket| bucket.is_empty())
    }
}

/// Picks the single key a name denotes among its candidates.
///
/// Element keys of one vector, even a lone one, denote the vector.
pub(crate) fn pick_candidate(name: &str, mut candidates: Vec<VarKey>) -> Result<VarKey, KeyError> {
    let first_parent = candidates.first().and_then(VarKey::veckey);
    if let Some(parent) = first_parent {
        if candidates.iter().all(|k| k.veckey() == Some(parent)) {
            return Ok(parent.clone());
        }
    }
    if candidates.len() <= 1 {
        return candidates.pop().ok_or_else(|| KeyError::UnknownKey(name.to_string()));
    }
    let mut names: Vec<String> = candidates.iter().map(VarKey::to_string).collect();
    names.sort();
    Err(KeyError::AmbiguousKey {
        alias: name.to_string(),
        candidates: names,
    })
}

/// Picks the key a name denotes, then addresses `index` within it.
pub(crate) fn pick_indexed(
    name: &str,
    index: Option<&[usize]>,
    candidates: Vec<VarKey>,
) -> Result<VarKey, KeyError> {
    let picked = pick_candidate(name, candidates)?;
    match index {
        None => Ok(picked),
        Some(idx) if picked.kind() == KeyKind::Array => picked.element(idx),
        Some(idx) => Err(KeyError::NotAnArray(format!("{name}{}", fmt_index(idx)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_deferred_until_lookup() {
        let mut index = AliasIndex::new(true);
        let x = VarKey::scalar("x").with_lineage(&[("Model", 0)]);
        index.register([x.clone()]);
        assert_eq!(index.state.borrow().pending.len(), 1);
        let found = index.bucket(&Alias::Name("x_Model".into())).expect("filed");
        assert_eq!(found, vec![x]);
        assert!(index.state.borrow().pending.is_empty());
    }

    #[test]
    fn removing_last_member_drops_bucket() {
        let mut index = AliasIndex::new(true);
        let a = VarKey::scalar("x");
        let b = VarKey::scalar("x");
        index.register([a.clone(), b.clone()]);
        index.remove(&a);
        assert_eq!(index.bucket(&Alias::Name("x".into())), Some(vec![b.clone()]));
        index.remove(&b);
        assert_eq!(index.bucket(&Alias::Name("x".into())), None);
        assert_eq!(index.bucket_count(), 0);
        assert!(!index.has_empty_bucket());
    }

    #[test]
    fn merged_buckets_are_copied_before_mutation() {
        let mut source = AliasIndex::new(true);
        let a = VarKey::scalar("x");
        let b = VarKey::scalar("x");
        source.register([a.clone(), b.clone()]);
        source.flush();

        let mut merged = AliasIndex::new(true);
        merged.merge_from(&source);
        merged.remove(&a);

        assert_eq!(merged.bucket(&Alias::Name("x".into())), Some(vec![b.clone()]));
        assert_eq!(source.bucket(&Alias::Name("x".into())), Some(vec![a, b]));
    }

    #[test]
    fn element_candidates_resolve_to_parent() {
        let mut index = AliasIndex::new(false);
        let y = VarKey::vector("y", &[2]);
        index.register(y.elements());
        let resolved = index.resolve(&Lookup::alias("y")).expect("shared parent");
        assert_eq!(resolved.key, y);
        assert_eq!(resolved.idx, None);
    }

    #[test]
    fn lone_element_candidate_resolves_to_parent() {
        let mut index = AliasIndex::new(false);
        let y = VarKey::vector("y", &[1]);
        index.register(y.elements());
        let whole = index.resolve(&Lookup::alias("y")).expect("parent");
        assert_eq!(whole.key, y);
        let slot = index.resolve(&Lookup::parse("y[0]").expect("parse")).expect("slot");
        assert_eq!(Some(slot.key), y.element(&[0]).ok());
    }

    #[test]
    fn unrelated_candidates_are_ambiguous() {
        let mut index = AliasIndex::new(true);
        index.register([VarKey::scalar("x"), VarKey::scalar("x")]);
        let err = index.resolve(&Lookup::alias("x")).expect_err("ambiguous");
        assert!(matches!(err, KeyError::AmbiguousKey { ref candidates, .. } if candidates.len() == 2));
        let err = index.resolve(&Lookup::alias("nope")).expect_err("unknown");
        assert_eq!(err, KeyError::UnknownKey("nope".into()));
    }
}
