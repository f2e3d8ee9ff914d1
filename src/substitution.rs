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

//! Substitution mappings and their classification.
//!
//! A raw mapping pairs lookups with heterogeneous values. Classifying it
//! against a model's variables splits it into fixed constants, candidate
//! arrays for an external sweep, and linked callables.

use crate::config::StoreConfig;
use crate::key::{KeyKind, VarKey};
use crate::lookup::Lookup;
use crate::store::{KeyError, PresenceIndex, ValueStore};
use crate::value::{Linked, Value, fmt_shape, split_sweep};
use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn};
use std::rc::Rc;

/// Raw substitutions in insertion order.
///
/// Later entries for the same lookup replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    entries: IndexMap<Lookup, Value>,
}

impl Substitutions {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes a variable to a value.
    pub fn constant(mut self, lookup: impl Into<Lookup>, value: impl Into<Value>) -> Self {
        self.insert(lookup, value);
        self
    }

    /// Sweeps a variable over candidate values.
    pub fn sweep(
        mut self,
        lookup: impl Into<Lookup>,
        candidates: impl IntoIterator<Item = f64>,
    ) -> Self {
        self.insert(lookup, Value::sweep(candidates));
        self
    }

    /// Computes a variable from the other substituted values of each iteration.
    pub fn linked<F>(mut self, lookup: impl Into<Lookup>, f: F) -> Self
    where
        F: Fn(&ValueStore) -> Result<Value, KeyError> + 'static,
    {
        self.insert(lookup, Value::linked(f));
        self
    }

    pub fn insert(
        &mut self,
        lookup: impl Into<Lookup>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.entries.insert(lookup.into(), value.into())
    }

    pub fn get(&self, lookup: &Lookup) -> Option<&Value> {
        self.entries.get(lookup)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Lookup, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Into<Lookup>, V: Into<Value>> FromIterator<(L, V)> for Substitutions {
    fn from_iter<T: IntoIterator<Item = (L, V)>>(iter: T) -> Self {
        let mut subs = Self::new();
        for (lookup, value) in iter {
            subs.insert(lookup, value);
        }
        subs
    }
}

/// Every stored entry, keyed by canonical key.
impl From<&ValueStore> for Substitutions {
    fn from(store: &ValueStore) -> Self {
        store
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Substitutions split by how they are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    /// Fixed values: numbers, or arrays for scalar-keyed entries.
    pub constants: IndexMap<VarKey, Value>,
    /// One-dimensional candidate arrays.
    pub sweep: IndexMap<VarKey, ArrayD<f64>>,
    /// Callables evaluated once per sweep iteration.
    pub linked: IndexMap<VarKey, Linked>,
}

impl Classified {
    /// A value store holding the constants.
    pub fn constants_store(&self, config: StoreConfig) -> Result<ValueStore, KeyError> {
        ValueStore::from_plain(
            config,
            self.constants.iter().map(|(k, v)| (k.clone(), v.clone())),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty() && self.sweep.is_empty() && self.linked.is_empty()
    }
}

/// Classifies `subs` against the variables in `vars`.
///
/// Entries whose lookup denotes no variable in `vars` are skipped, and NaN
/// values mean "no substitution". In `clean` mode both sides are assumed to
/// use keys only: entries are matched by exact key, without alias lookups.
pub fn parse_subs(
    vars: &PresenceIndex,
    subs: &Substitutions,
    clean: bool,
) -> Result<Classified, KeyError> {
    let mut out = Classified::default();
    if clean {
        for key in vars.keys() {
            let raw = subs.get(&Lookup::Key(key.clone())).or_else(|| {
                key.veckey()
                    .and_then(|vk| subs.get(&Lookup::Key(vk.clone())))
            });
            if let Some(raw) = raw {
                append_sub(raw, std::slice::from_ref(key), &mut out)?;
            }
        }
    } else {
        for (lookup, raw) in subs.iter() {
            let keys = vars.candidates(lookup);
            if keys.is_empty() {
                log::trace!("no variable for substitution '{lookup}', skipping");
                continue;
            }
            append_sub(raw, &keys, &mut out)?;
        }
    }
    log::debug!(
        "classified {} substitutions: {} constant, {} swept, {} linked",
        subs.len(),
        out.constants.len(),
        out.sweep.len(),
        out.linked.len()
    );
    Ok(out)
}

fn append_sub(raw: &Value, keys: &[VarKey], out: &mut Classified) -> Result<(), KeyError> {
    let (swept, sub) = split_sweep(raw);
    for key in keys {
        // Each element takes its own slot of a vector-valued callable.
        if let (Some(idx), Value::Linked(f)) = (key.idx(), &sub) {
            classify(key, Value::Linked(f.element(idx.to_vec())), swept, out)?;
            continue;
        }
        let value = match (key.kind(), sub.shape()) {
            (KeyKind::Scalar, _) | (_, None) => sub.clone(),
            (_, Some(found)) => {
                let expected = key.shape().unwrap_or_default();
                let idx = key.idx().unwrap_or_default();
                let value = if found == expected {
                    sub.value_at(idx)
                } else if swept && found.len() == expected.len() + 1 && found[1..] == *expected {
                    sub.value_at(idx)
                } else {
                    None
                };
                let value = value.ok_or_else(|| KeyError::ShapeMismatch {
                    key: key.veckey().unwrap_or(key).to_string(),
                    expected: fmt_shape(expected),
                    found: fmt_shape(&found),
                })?;
                // A single swept element sweeps that element only.
                if let Value::Sweep(candidates) = value {
                    out.sweep.insert(key.clone(), candidates);
                    continue;
                }
                value
            }
        };
        classify(key, value, swept, out)?;
    }
    Ok(())
}

fn classify(key: &VarKey, value: Value, swept: bool, out: &mut Classified) -> Result<(), KeyError> {
    let value = value.normalized(key)?;
    if let Value::Linked(f) = value {
        out.linked.insert(key.clone(), f);
    } else if swept {
        out.sweep.insert(key.clone(), candidates(key, &value)?);
    } else if value.is_nan() {
        log::trace!("NaN substitution for {key} dropped");
    } else {
        let value = match value {
            Value::Sequence(_) => value
                .to_array_data()
                .map(|data| Value::Array(Rc::new(data)))
                .ok_or_else(|| KeyError::ShapeMismatch {
                    key: key.to_string(),
                    expected: fmt_shape(key.shape().unwrap_or_default()),
                    found: "a ragged sequence".to_string(),
                })?,
            other => other,
        };
        out.constants.insert(key.clone(), value);
    }
    Ok(())
}

/// Sweep candidates as a numeric array; a lone number sweeps over itself.
fn candidates(key: &VarKey, value: &Value) -> Result<ArrayD<f64>, KeyError> {
    let numeric = match value {
        Value::Number(v) => Some(ArrayD::from_elem(IxDyn(&[1]), *v)),
        Value::Sweep(a) => Some(a.clone()),
        shaped => shaped.to_array_data().and_then(|data| data.to_numeric()),
    };
    numeric.ok_or_else(|| KeyError::ShapeMismatch {
        key: key.to_string(),
        expected: "numeric sweep candidates".to_string(),
        found: format!("{value:?}"),
    })
}
