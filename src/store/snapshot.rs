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

//! Schema-versioned snapshots of a value store.
//!
//! Version 1 documents predate ownership tracking and carry no `owned`
//! list; they load with every array shared.

use super::{KeyError, PresenceIndex, ValueStore};
use crate::config::StoreConfig;
use crate::lookup::Lookup;
use crate::value::{ArrayData, Value};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Serializable form of a store's canonical entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default = "default_collapse_arrays")]
    pub collapse_arrays: bool,
    pub entries: Vec<SnapshotEntry>,
    #[serde(default)]
    pub owned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Qualified name, with an index suffix for element entries.
    pub key: String,
    pub value: SnapshotValue,
}

/// Stored values that survive serialization. NaN is written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotValue {
    Number {
        value: Option<f64>,
    },
    Array {
        shape: Vec<usize>,
        data: Vec<Option<f64>>,
    },
    Sweep {
        shape: Vec<usize>,
        data: Vec<f64>,
    },
}

fn default_collapse_arrays() -> bool {
    StoreConfig::default().collapse_arrays
}

fn present(v: f64) -> Option<f64> {
    (!v.is_nan()).then_some(v)
}

impl SnapshotValue {
    fn capture(value: &Value) -> Option<Self> {
        match value {
            Value::Number(v) => Some(SnapshotValue::Number { value: present(*v) }),
            Value::Quantity(q) => Some(SnapshotValue::Number {
                value: present(q.magnitude),
            }),
            Value::Array(_) | Value::Sequence(_) => {
                let numbers = value.to_array_data()?.to_numeric()?;
                Some(SnapshotValue::Array {
                    shape: numbers.shape().to_vec(),
                    data: numbers.iter().copied().map(present).collect(),
                })
            }
            Value::Sweep(candidates) => Some(SnapshotValue::Sweep {
                shape: candidates.shape().to_vec(),
                data: candidates.iter().copied().collect(),
            }),
            Value::Linked(_) => None,
        }
    }

    fn restore(self, key: &str) -> Result<Value, KeyError> {
        let malformed = |err: ndarray::ShapeError| {
            KeyError::Snapshot(format!("entry '{key}' does not match its shape: {err}"))
        };
        Ok(match self {
            SnapshotValue::Number { value } => Value::Number(value.unwrap_or(f64::NAN)),
            SnapshotValue::Array { shape, data } => {
                let data = data.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
                let array = ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(malformed)?;
                Value::Array(Rc::new(ArrayData::Numeric(array)))
            }
            SnapshotValue::Sweep { shape, data } => {
                Value::Sweep(ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(malformed)?)
            }
        })
    }
}

impl ValueStore {
    /// Captures every serializable entry.
    ///
    /// Linked callables and arrays holding placeholders are left out.
    pub fn snapshot(&self) -> Snapshot {
        let mut entries = Vec::new();
        let mut owned = Vec::new();
        for (key, value) in self.iter() {
            let Some(captured) = SnapshotValue::capture(value) else {
                log::warn!("leaving {key} out of the snapshot: value is not serializable");
                continue;
            };
            if self.is_owned(key) {
                owned.push(key.to_string());
            }
            entries.push(SnapshotEntry {
                key: key.to_string(),
                value: captured,
            });
        }
        Snapshot {
            version: SNAPSHOT_VERSION,
            collapse_arrays: self.config().collapse_arrays,
            entries,
            owned,
        }
    }

    /// Rebuilds a store, resolving entry names against a model's variables.
    pub fn restore(snapshot: Snapshot, vars: &PresenceIndex) -> Result<Self, KeyError> {
        if !(1..=SNAPSHOT_VERSION).contains(&snapshot.version) {
            return Err(KeyError::Snapshot(format!(
                "unsupported version {} (newest known is {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        log::debug!(
            "restoring {} snapshot entries (version {})",
            snapshot.entries.len(),
            snapshot.version
        );
        let mut store = ValueStore::new(StoreConfig {
            collapse_arrays: snapshot.collapse_arrays,
        });
        for entry in snapshot.entries {
            let key = vars.resolve(&Lookup::parse(&entry.key)?)?;
            let value = entry.value.restore(&entry.key)?;
            store.set(key, value)?;
        }
        for name in &snapshot.owned {
            let key = vars.resolve(&Lookup::parse(name)?)?;
            store.mark_owned(&key);
        }
        Ok(store)
    }
}
