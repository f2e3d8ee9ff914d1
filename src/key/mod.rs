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

//! Variable identities (`VarKey`) and the alias strings they answer to.
//!
//! A `VarKey` names either a scalar variable, a whole vector variable, or one
//! element of a vector variable. Element keys keep a handle to their parent
//! vector key (the "veckey") and their index tuple.
//!
//! Each key can be looked up through several strings:
//! - the short name: `x`
//! - the qualified name including model lineage: `x_Aircraft.Wing`
//!
//! Model numbers other than zero are appended to the model name
//! (`x_Wing1`), so two instances of one model stay distinguishable.

mod units;

pub use units::{Quantity, Unit};

use crate::store::KeyError;
use crate::value::{fmt_index, row_major_indices};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Structural role of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// A scalar variable.
    Scalar,
    /// A whole vector variable.
    Array,
    /// One element of a vector variable.
    ArrayElement,
}

#[derive(Debug, Clone)]
struct KeyData {
    serial: u64,
    name: String,
    lineage: Vec<(String, usize)>,
    units: Option<Unit>,
    shape: Option<Vec<usize>>,
    idx: Option<Vec<usize>>,
    veckey: Option<VarKey>,
}

/// Immutable variable identity.
///
/// Cloning is cheap. Equality follows the denoted variable: two element keys
/// built from the same vector key with the same index are equal.
#[derive(Clone)]
pub struct VarKey(Rc<KeyData>);

impl VarKey {
    /// Creates a scalar variable key.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self(Rc::new(KeyData {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            lineage: Vec::new(),
            units: None,
            shape: None,
            idx: None,
            veckey: None,
        }))
    }

    /// Creates a vector variable key. An empty shape yields a scalar key.
    pub fn vector(name: impl Into<String>, shape: &[usize]) -> Self {
        let key = Self::scalar(name);
        if shape.is_empty() {
            return key;
        }
        let shape = shape.to_vec();
        key.rebuild(|data| data.shape = Some(shape))
    }

    /// Sets the model lineage, outermost model first.
    ///
    /// The result is a new variable; keys and elements derived from `self`
    /// do not compare equal to it.
    pub fn with_lineage(self, lineage: &[(&str, usize)]) -> Self {
        let lineage = lineage
            .iter()
            .map(|(model, num)| (model.to_string(), *num))
            .collect();
        self.rebuild(|data| data.lineage = lineage)
    }

    /// Sets the declared unit.
    pub fn with_units(self, unit: Unit) -> Self {
        self.rebuild(|data| data.units = Some(unit))
    }

    /// A key with edited data and a fresh identity.
    fn rebuild(self, edit: impl FnOnce(&mut KeyData)) -> Self {
        let mut data = Rc::unwrap_or_clone(self.0);
        edit(&mut data);
        data.serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        Self(Rc::new(data))
    }

    /// Returns the element key at `idx` of a vector key.
    pub fn element(&self, idx: &[usize]) -> Result<VarKey, KeyError> {
        let shape = match (self.kind(), self.shape()) {
            (KeyKind::Array, Some(shape)) => shape,
            _ => return Err(KeyError::NotAnArray(self.to_string())),
        };
        let in_range = idx.len() == shape.len() && idx.iter().zip(shape).all(|(i, n)| i < n);
        if !in_range {
            return Err(KeyError::IndexOutOfRange {
                key: self.to_string(),
                index: fmt_index(idx),
                shape: shape.to_vec(),
            });
        }
        Ok(Self(Rc::new(KeyData {
            serial: self.0.serial,
            name: self.0.name.clone(),
            lineage: self.0.lineage.clone(),
            units: self.0.units.clone(),
            shape: self.0.shape.clone(),
            idx: Some(idx.to_vec()),
            veckey: Some(self.clone()),
        })))
    }

    /// Returns every element key of a vector key in row-major order.
    ///
    /// Non-vector keys have no elements.
    pub fn elements(&self) -> Vec<VarKey> {
        match (self.kind(), self.shape()) {
            (KeyKind::Array, Some(shape)) => row_major_indices(shape)
                .into_iter()
                .filter_map(|idx| self.element(&idx).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the structural role of this key.
    pub fn kind(&self) -> KeyKind {
        match (&self.0.shape, &self.0.idx) {
            (None, _) => KeyKind::Scalar,
            (Some(_), None) => KeyKind::Array,
            (Some(_), Some(_)) => KeyKind::ArrayElement,
        }
    }

    /// Short (unqualified) name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Declared shape of the vector this key belongs to.
    pub fn shape(&self) -> Option<&[usize]> {
        self.0.shape.as_deref()
    }

    /// Element index, for element keys.
    pub fn idx(&self) -> Option<&[usize]> {
        self.0.idx.as_deref()
    }

    /// Parent vector key, for element keys.
    pub fn veckey(&self) -> Option<&VarKey> {
        self.0.veckey.as_ref()
    }

    /// Declared unit, if any.
    pub fn units(&self) -> Option<&Unit> {
        self.0.units.as_ref()
    }

    /// Lineage rendered as `Outer.Inner1`, or `None` outside any model.
    pub fn lineage_str(&self) -> Option<String> {
        if self.0.lineage.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .0
            .lineage
            .iter()
            .map(|(model, num)| {
                if *num == 0 {
                    model.clone()
                } else {
                    format!("{model}{num}")
                }
            })
            .collect();
        Some(parts.join("."))
    }

    /// Name including lineage (`x_Model`), or the short name outside models.
    pub fn qualified_name(&self) -> String {
        match self.lineage_str() {
            Some(lineage) => format!("{}_{}", self.0.name, lineage),
            None => self.0.name.clone(),
        }
    }

    /// Every string this key can be looked up by.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases = vec![self.0.name.clone()];
        let qualified = self.qualified_name();
        if qualified != self.0.name {
            aliases.push(qualified);
        }
        aliases
    }
}

impl PartialEq for VarKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.serial == other.0.serial && self.0.idx == other.0.idx
    }
}

impl Eq for VarKey {}

impl Hash for VarKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.serial.hash(state);
        self.0.idx.hash(state);
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())?;
        if let Some(idx) = &self.0.idx {
            write!(f, "{}", fmt_index(idx))?;
        }
        Ok(())
    }
}

impl fmt::Debug for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarKey({self})")
    }
}
