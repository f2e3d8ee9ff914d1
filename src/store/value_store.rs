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

//! Value storage keyed through an alias index.

use super::alias_index::{Alias, AliasIndex, Resolved, pick_candidate, pick_indexed};
use super::{KeyError, PresenceIndex};
use crate::config::StoreConfig;
use crate::key::{KeyKind, Unit, VarKey};
use crate::lookup::Lookup;
use crate::value::{ArrayData, Element, Value, fmt_index, fmt_shape, row_major_indices};
use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn};
use std::collections::HashSet;
use std::rc::Rc;

/// A value paired with the unit of the variable it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    pub value: Value,
    pub unit: Unit,
}

/// One value per canonical key, reachable through any of the key's aliases.
///
/// With `collapse_arrays` on, every element of a vector lives in one array
/// stored under the vector key. Arrays handed in by callers are stored shared
/// and copied on the first in-place write; `owned` records which stored
/// arrays this store may write directly.
#[derive(Debug)]
pub struct ValueStore {
    config: StoreConfig,
    index: AliasIndex,
    values: IndexMap<VarKey, Value>,
    owned: HashSet<VarKey>,
    scope: Option<Rc<PresenceIndex>>,
}

impl Default for ValueStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Clones share every array with the original; neither side owns them.
impl Clone for ValueStore {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            index: self.index.clone(),
            values: self.values.clone(),
            owned: HashSet::new(),
            scope: self.scope.clone(),
        }
    }
}

impl ValueStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            index: AliasIndex::new(config.collapse_arrays),
            values: IndexMap::new(),
            owned: HashSet::new(),
            scope: None,
        }
    }

    /// A store whose string lookups resolve against a model's variables.
    ///
    /// Names resolve even before anything is stored under them, and an alias
    /// shared by unrelated model variables is ambiguous here even if only one
    /// of them holds a value.
    pub fn with_scope(config: StoreConfig, scope: PresenceIndex) -> Self {
        Self {
            scope: Some(Rc::new(scope)),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    pub fn scope(&self) -> Option<&PresenceIndex> {
        self.scope.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Canonical keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &VarKey> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VarKey, &Value)> {
        self.values.iter()
    }

    /// Returns whether the stored array under `key` may be written in place.
    pub fn is_owned(&self, key: &VarKey) -> bool {
        self.owned.contains(key)
    }

    pub(crate) fn mark_owned(&mut self, key: &VarKey) {
        if matches!(self.values.get(key), Some(Value::Array(_))) {
            self.owned.insert(key.clone());
        }
    }

    /// Number of alias buckets backing this store.
    pub fn bucket_count(&self) -> usize {
        self.index.bucket_count()
    }

    /// Returns whether any alias bucket exists with no member.
    pub fn has_empty_bucket(&self) -> bool {
        self.index.has_empty_bucket()
    }

    fn candidates(&self, name: &str) -> Option<Vec<VarKey>> {
        match &self.scope {
            Some(scope) => scope.named(name),
            None => self.index.bucket(&Alias::Name(name.to_string())),
        }
    }

    /// Resolves a lookup to one storage location.
    fn resolve(&self, lookup: &Lookup) -> Result<Resolved, KeyError> {
        match lookup {
            Lookup::Key(key) => Ok(self.index.canonical(key)),
            Lookup::Alias { name, index } => {
                let candidates = self
                    .candidates(name)
                    .ok_or_else(|| KeyError::UnknownKey(lookup.to_string()))?;
                let key = pick_indexed(name, index.as_deref(), candidates)?;
                Ok(self.index.canonical(&key))
            }
        }
    }

    /// Every storage location a lookup reaches.
    ///
    /// With collapsing off, a lookup naming a whole vector reaches each of
    /// its element entries.
    fn locations(&self, lookup: &Lookup) -> Result<Vec<Resolved>, KeyError> {
        if !self.config.collapse_arrays {
            match lookup {
                Lookup::Alias { name, index: None } => {
                    let candidates = self
                        .candidates(name)
                        .ok_or_else(|| KeyError::UnknownKey(lookup.to_string()))?;
                    if pick_candidate(name, candidates.clone())?.kind() == KeyKind::Array {
                        return Ok(candidates.iter().map(|k| self.index.canonical(k)).collect());
                    }
                }
                Lookup::Key(key) if key.kind() == KeyKind::Array => {
                    return Ok(key.elements().iter().map(|k| self.index.canonical(k)).collect());
                }
                _ => {}
            }
        }
        self.resolve(lookup).map(|found| vec![found])
    }

    fn read(&self, at: &Resolved, lookup: &Lookup) -> Result<Value, KeyError> {
        let value = self
            .values
            .get(&at.key)
            .ok_or_else(|| KeyError::UnknownKey(lookup.to_string()))?;
        let Some(idx) = &at.idx else {
            return Ok(value.clone());
        };
        match value {
            Value::Array(data) => data.value_at(idx).ok_or_else(|| KeyError::IndexOutOfRange {
                key: at.key.to_string(),
                index: fmt_index(idx),
                shape: data.shape().to_vec(),
            }),
            Value::Sweep(_) | Value::Linked(_) => Ok(value.clone()),
            _ => Err(KeyError::NotAnArray(format!("{}{}", at.key, fmt_index(idx)))),
        }
    }

    /// Returns the value a lookup denotes.
    ///
    /// A whole array comes back as a shared handle; writing through the store
    /// afterwards copies it first, so the handle never changes.
    ///
    /// With collapsing off, a whole vector is stored element by element and
    /// comes back padded: slots with no entry read as NaN, exactly like a
    /// cleared slot. Use [`ValueStore::get_matches`] to see only the elements
    /// actually stored.
    pub fn get(&self, lookup: impl Into<Lookup>) -> Result<Value, KeyError> {
        let lookup = lookup.into();
        let found = self.locations(&lookup)?;
        let spread = found.iter().any(|at| at.key.kind() == KeyKind::ArrayElement)
            && names_whole_vector(&lookup);
        match found.as_slice() {
            [one] if !spread => self.read(one, &lookup),
            _ => self.padded_vector(&lookup, &found),
        }
    }

    /// Element entries of one vector as a dense array, NaN where none is stored.
    fn padded_vector(&self, lookup: &Lookup, found: &[Resolved]) -> Result<Value, KeyError> {
        let parent = found
            .first()
            .and_then(|r| r.key.veckey())
            .ok_or_else(|| KeyError::UnknownKey(lookup.to_string()))?;
        let shape = parent.shape().unwrap_or_default();
        let mut slots = ArrayD::from_elem(IxDyn(shape), Element::Number(f64::NAN));
        let mut any = false;
        for at in found {
            let (Some(value), Some(idx)) = (self.values.get(&at.key), at.key.idx()) else {
                continue;
            };
            let element = Element::from_value(value.clone()).ok_or_else(|| {
                KeyError::shape_mismatch(&at.key, &[], &value.shape().unwrap_or_default())
            })?;
            if let Some(slot) = slots.get_mut(idx) {
                *slot = element;
                any = true;
            }
        }
        if !any {
            return Err(KeyError::UnknownKey(lookup.to_string()));
        }
        ArrayData::from_elements(shape, slots.iter().cloned().collect())
            .map(|data| Value::Array(Rc::new(data)))
            .ok_or_else(|| KeyError::shape_mismatch(parent, shape, &[found.len()]))
    }

    /// Returns each stored key the lookup reaches with its value.
    pub fn get_matches(
        &self,
        lookup: impl Into<Lookup>,
    ) -> Result<IndexMap<VarKey, Value>, KeyError> {
        let lookup = lookup.into();
        let mut out = IndexMap::new();
        for at in self.locations(&lookup)? {
            if !self.values.contains_key(&at.key) {
                continue;
            }
            let value = self.read(&at, &lookup)?;
            let key = match &at.idx {
                Some(idx) => at.key.element(idx)?,
                None => at.key.clone(),
            };
            out.insert(key, value);
        }
        if out.is_empty() {
            return Err(KeyError::UnknownKey(lookup.to_string()));
        }
        Ok(out)
    }

    /// Returns whether the lookup denotes a stored, non-NaN value.
    ///
    /// An alias shared by unrelated variables counts as present.
    pub fn contains(&self, lookup: impl Into<Lookup>) -> bool {
        match self.locations(&lookup.into()) {
            Ok(found) => found.iter().any(|at| self.is_present(at)),
            Err(KeyError::AmbiguousKey { .. }) => true,
            Err(_) => false,
        }
    }

    fn is_present(&self, at: &Resolved) -> bool {
        let Some(value) = self.values.get(&at.key) else {
            return false;
        };
        match (&at.idx, value) {
            (None, _) => true,
            (Some(idx), Value::Array(data)) => data.is_present(idx).unwrap_or(false),
            (Some(_), Value::Sweep(_) | Value::Linked(_)) => true,
            (Some(_), _) => false,
        }
    }

    /// Unit-tagged value of a lookup.
    pub fn quantity(&self, lookup: impl Into<Lookup>) -> Result<Tagged, KeyError> {
        let lookup = lookup.into();
        let value = self.get(lookup.clone())?;
        let unit = self
            .locations(&lookup)?
            .first()
            .map(|at| unit_of(&at.key))
            .unwrap_or_else(Unit::dimensionless);
        Ok(Tagged { value, unit })
    }

    /// Unit-tagged value of every stored key the lookup reaches.
    pub fn quantities(
        &self,
        lookup: impl Into<Lookup>,
    ) -> Result<IndexMap<VarKey, Tagged>, KeyError> {
        Ok(self
            .get_matches(lookup)?
            .into_iter()
            .map(|(key, value)| {
                let unit = unit_of(&key);
                (key, Tagged { value, unit })
            })
            .collect())
    }

    /// Stores a value under the location a lookup denotes.
    ///
    /// Keys are registered on first write. String lookups must already
    /// resolve: they never create variables.
    pub fn set(
        &mut self,
        lookup: impl Into<Lookup>,
        value: impl Into<Value>,
    ) -> Result<(), KeyError> {
        let lookup = lookup.into();
        let at = self.resolve(&lookup)?;
        let value = value.into().normalized(&at.key)?;
        match (at.idx, at.key.kind()) {
            (Some(idx), _) => self.set_slot(&at.key, &idx, value),
            (None, KeyKind::Array) if !self.config.collapse_arrays => {
                self.set_elementwise(&at.key, value)
            }
            (None, KeyKind::Array) => self.set_array(&at.key, value),
            (None, _) => self.set_plain(&at.key, value),
        }
    }

    /// Sets several entries in order, stopping at the first error.
    pub fn update<L, V>(
        &mut self,
        entries: impl IntoIterator<Item = (L, V)>,
    ) -> Result<(), KeyError>
    where
        L: Into<Lookup>,
        V: Into<Value>,
    {
        for (lookup, value) in entries {
            self.set(lookup, value)?;
        }
        Ok(())
    }

    fn insert_value(&mut self, key: &VarKey, value: Value) {
        if self.values.insert(key.clone(), value).is_none() {
            self.index.register([key.clone()]);
        }
    }

    /// Mutable access to the array under `key`, copying it first unless owned.
    fn array_mut(&mut self, key: &VarKey) -> Result<&mut ArrayData, KeyError> {
        let Some(Value::Array(data)) = self.values.get_mut(key) else {
            return Err(KeyError::NotAnArray(key.to_string()));
        };
        if !self.owned.contains(key) {
            log::trace!("copying shared array for {key} before writing");
            let copy = ArrayData::clone(&**data);
            *data = Rc::new(copy);
            self.owned.insert(key.clone());
        }
        // Handles returned by `get` may still hold the array.
        Ok(Rc::make_mut(data))
    }

    fn replace_owned(&mut self, key: &VarKey, data: ArrayData) {
        self.insert_value(key, Value::Array(Rc::new(data)));
        self.owned.insert(key.clone());
    }

    fn set_slot(&mut self, key: &VarKey, idx: &[usize], value: Value) -> Result<(), KeyError> {
        let element = match Element::from_value(value) {
            Some(element) => element,
            None => {
                return Err(KeyError::ShapeMismatch {
                    key: format!("{key}{}", fmt_index(idx)),
                    expected: fmt_shape(&[]),
                    found: "an array".to_string(),
                });
            }
        };
        if !self.values.contains_key(key) {
            let shape = key.shape().ok_or_else(|| KeyError::NotAnArray(key.to_string()))?;
            let object = !matches!(element, Element::Number(_));
            self.replace_owned(key, ArrayData::nan(shape, object));
        }
        let data = self.array_mut(key)?;
        if data.assign(idx, element) {
            Ok(())
        } else {
            Err(KeyError::IndexOutOfRange {
                key: key.to_string(),
                index: fmt_index(idx),
                shape: data.shape().to_vec(),
            })
        }
    }

    /// Whole-vector write with collapsing off: one entry per element.
    fn set_elementwise(&mut self, key: &VarKey, value: Value) -> Result<(), KeyError> {
        let elements = key.elements();
        match value {
            Value::Linked(f) => {
                for element in elements {
                    let thunk = f.element(element.idx().unwrap_or_default().to_vec());
                    self.set_plain(&element, Value::Linked(thunk))?;
                }
            }
            shaped if shaped.is_shaped() => {
                let data = dense(key, &shaped)?;
                let expected = key.shape().unwrap_or_default();
                if data.shape() != expected {
                    return Err(KeyError::shape_mismatch(key, expected, data.shape()));
                }
                for (element, slot) in elements.into_iter().zip(data.elements()) {
                    self.set_plain(&element, slot.into_value())?;
                }
            }
            scalar => {
                for element in elements {
                    self.set_plain(&element, scalar.clone())?;
                }
            }
        }
        Ok(())
    }

    /// Whole-vector write with collapsing on.
    fn set_array(&mut self, key: &VarKey, value: Value) -> Result<(), KeyError> {
        let shape = key.shape().unwrap_or_default().to_vec();
        match value {
            Value::Linked(f) => {
                let slots = row_major_indices(&shape)
                    .into_iter()
                    .map(|idx| Element::Linked(f.element(idx)))
                    .collect();
                let data = ArrayData::from_elements(&shape, slots)
                    .ok_or_else(|| KeyError::shape_mismatch(key, &shape, &[]))?;
                self.merge_array(key, &data)
            }
            Value::Number(v) => {
                self.replace_owned(key, ArrayData::Numeric(ArrayD::from_elem(IxDyn(&shape), v)));
                Ok(())
            }
            Value::Sequence(_) => {
                let data = dense(key, &value)?;
                check_shape(key, &shape, data.shape())?;
                self.replace_owned(key, data);
                Ok(())
            }
            Value::Array(data) => {
                check_shape(key, &shape, data.shape())?;
                let same_shape = matches!(
                    self.values.get(key),
                    Some(Value::Array(existing)) if existing.shape() == data.shape()
                );
                if same_shape {
                    self.merge_array(key, &data)
                } else {
                    self.insert_value(key, Value::Array(data));
                    self.owned.remove(key);
                    Ok(())
                }
            }
            other => {
                self.insert_value(key, other);
                self.owned.remove(key);
                Ok(())
            }
        }
    }

    /// Copies the non-NaN slots of `incoming` over the stored array.
    fn merge_array(&mut self, key: &VarKey, incoming: &ArrayData) -> Result<(), KeyError> {
        let same_shape = matches!(
            self.values.get(key),
            Some(Value::Array(existing)) if existing.shape() == incoming.shape()
        );
        if same_shape {
            self.array_mut(key)?.overwrite_present(incoming);
        } else {
            self.replace_owned(key, incoming.clone());
        }
        Ok(())
    }

    fn set_plain(&mut self, key: &VarKey, value: Value) -> Result<(), KeyError> {
        match value {
            Value::Sequence(_) => {
                let data = dense(key, &value)?;
                self.replace_owned(key, data);
            }
            other => {
                self.insert_value(key, other);
                self.owned.remove(key);
            }
        }
        Ok(())
    }

    /// Removes what a lookup denotes.
    ///
    /// An unindexed name removes every key stored under it. Removing an
    /// element clears its slot; the vector goes away once every slot is clear.
    pub fn delete(&mut self, lookup: impl Into<Lookup>) -> Result<(), KeyError> {
        let lookup = lookup.into();
        let targets = match &lookup {
            Lookup::Alias { name, index: None } => self
                .index
                .bucket(&Alias::Name(name.clone()))
                .ok_or_else(|| KeyError::UnknownKey(lookup.to_string()))?
                .into_iter()
                .map(|key| Resolved { key, idx: None })
                .collect(),
            _ => self.locations(&lookup)?,
        };
        let mut removed = false;
        for at in targets {
            removed |= self.delete_at(at)?;
        }
        if removed {
            Ok(())
        } else {
            Err(KeyError::UnknownKey(lookup.to_string()))
        }
    }

    fn delete_at(&mut self, at: Resolved) -> Result<bool, KeyError> {
        let Some(idx) = at.idx else {
            return Ok(self.remove_key(&at.key));
        };
        if !self.values.contains_key(&at.key) {
            return Ok(false);
        }
        let data = self.array_mut(&at.key)?;
        if !data.assign(&idx, Element::Number(f64::NAN)) {
            return Err(KeyError::IndexOutOfRange {
                key: at.key.to_string(),
                index: fmt_index(&idx),
                shape: data.shape().to_vec(),
            });
        }
        if data.all_nan() {
            log::trace!("every slot of {} is clear, removing it", at.key);
            self.remove_key(&at.key);
        }
        Ok(true)
    }

    fn remove_key(&mut self, key: &VarKey) -> bool {
        if self.values.shift_remove(key).is_none() {
            return false;
        }
        self.owned.remove(key);
        self.index.remove(key);
        true
    }

    /// Copies every entry of `other` into this store.
    ///
    /// An empty store with the same configuration takes over `other`'s
    /// buckets and arrays as shared storage; otherwise entries are set one by
    /// one.
    pub fn merge(&mut self, other: &ValueStore) -> Result<(), KeyError> {
        if self.values.is_empty() && self.config == other.config {
            log::debug!("bulk merging {} entries", other.len());
            self.values = other.values.clone();
            self.owned.clear();
            self.index.merge_from(&other.index);
            return Ok(());
        }
        log::debug!("merging {} entries one by one", other.len());
        for (key, value) in &other.values {
            self.set(key, value.clone())?;
        }
        Ok(())
    }

    /// Canonical entries without alias metadata.
    pub fn to_plain(&self) -> IndexMap<VarKey, Value> {
        self.values.clone()
    }

    /// Rebuilds a store from canonical entries.
    pub fn from_plain(
        config: StoreConfig,
        entries: impl IntoIterator<Item = (VarKey, Value)>,
    ) -> Result<Self, KeyError> {
        let mut store = Self::new(config);
        store.update(entries)?;
        Ok(store)
    }
}

fn unit_of(key: &VarKey) -> Unit {
    key.units().cloned().unwrap_or_else(Unit::dimensionless)
}

/// Dense form of a shaped value; ragged sequences are a shape mismatch.
fn dense(key: &VarKey, value: &Value) -> Result<ArrayData, KeyError> {
    value.to_array_data().ok_or_else(|| KeyError::ShapeMismatch {
        key: key.to_string(),
        expected: fmt_shape(key.shape().unwrap_or_default()),
        found: "a ragged sequence".to_string(),
    })
}

/// Accepts the key's shape, or the key's shape behind a leading sweep axis.
fn check_shape(key: &VarKey, expected: &[usize], found: &[usize]) -> Result<(), KeyError> {
    let swept = found.len() == expected.len() + 1 && found[1..] == *expected;
    if found == expected || swept {
        Ok(())
    } else {
        Err(KeyError::shape_mismatch(key, expected, found))
    }
}

/// An unindexed name, or the key of a whole vector.
fn names_whole_vector(lookup: &Lookup) -> bool {
    match lookup {
        Lookup::Alias { index, .. } => index.is_none(),
        Lookup::Key(key) => key.kind() == KeyKind::Array,
    }
}
