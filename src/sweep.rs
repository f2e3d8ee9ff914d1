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

//! Expansion of classified substitutions into per-iteration value stores.

use crate::config::StoreConfig;
use crate::key::VarKey;
use crate::store::{KeyError, ValueStore};
use crate::substitution::Classified;
use crate::value::{Linked, Value, fmt_shape};
use indexmap::IndexMap;

/// The cross product of every swept variable's candidates.
///
/// Points are numbered with the last swept variable varying fastest. Each
/// iteration starts from the constants, adds the point's swept values, then
/// evaluates linked values in insertion order, so a linked value sees every
/// constant, every swept value, and the linked values before it.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    base: ValueStore,
    axes: Vec<(VarKey, Vec<f64>)>,
    linked: IndexMap<VarKey, Linked>,
}

impl SweepPlan {
    pub fn new(config: StoreConfig, classified: &Classified) -> Result<Self, KeyError> {
        let base = classified.constants_store(config)?;
        let axes = classified
            .sweep
            .iter()
            .map(|(key, candidates)| {
                if candidates.ndim() != 1 {
                    return Err(KeyError::ShapeMismatch {
                        key: key.to_string(),
                        expected: "(n,)".to_string(),
                        found: fmt_shape(candidates.shape()),
                    });
                }
                Ok((key.clone(), candidates.iter().copied().collect()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let plan = Self {
            base,
            axes,
            linked: classified.linked.clone(),
        };
        log::debug!(
            "sweep over {} variables: {} points, {} linked",
            plan.axes.len(),
            plan.len(),
            plan.linked.len()
        );
        Ok(plan)
    }

    /// Number of iterations; one when nothing is swept.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|(_, c)| c.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swept values of iteration `i`.
    pub fn point(&self, i: usize) -> Option<IndexMap<VarKey, f64>> {
        if i >= self.len() {
            return None;
        }
        let mut rest = i;
        let mut picks = vec![0.0; self.axes.len()];
        for (slot, (_, candidates)) in picks.iter_mut().zip(&self.axes).rev() {
            *slot = candidates[rest % candidates.len()];
            rest /= candidates.len();
        }
        Some(
            self.axes
                .iter()
                .map(|(key, _)| key.clone())
                .zip(picks)
                .collect(),
        )
    }

    /// Writes iteration `i`'s swept and linked values into `store`.
    pub fn apply(&self, i: usize, store: &mut ValueStore) -> Result<(), KeyError> {
        let point = self.point(i).ok_or_else(|| KeyError::IndexOutOfRange {
            key: "sweep".to_string(),
            index: format!("[{i}]"),
            shape: vec![self.len()],
        })?;
        for (key, value) in point {
            store.set(key, value)?;
        }
        for (key, f) in &self.linked {
            let value = f.call(store).map_err(|err| KeyError::Linked {
                key: key.to_string(),
                message: err.to_string(),
            })?;
            store.set(key, value)?;
        }
        Ok(())
    }

    /// Constants plus iteration `i`'s swept and linked values.
    pub fn store_at(&self, i: usize) -> Result<ValueStore, KeyError> {
        let mut store = self.base.clone();
        self.apply(i, &mut store)?;
        Ok(store)
    }

    /// Every iteration's store, in point order.
    pub fn iter(&self) -> impl Iterator<Item = Result<ValueStore, KeyError>> + '_ {
        (0..self.len()).map(|i| self.store_at(i))
    }
}

/// Linked values evaluated against a fixed store, without sweeping.
pub fn evaluate_linked(
    linked: &IndexMap<VarKey, Linked>,
    store: &ValueStore,
) -> Result<IndexMap<VarKey, Value>, KeyError> {
    linked
        .iter()
        .map(|(key, f)| {
            f.call(store)
                .map(|value| (key.clone(), value))
                .map_err(|err| KeyError::Linked {
                    key: key.to_string(),
                    message: err.to_string(),
                })
        })
        .collect()
}
