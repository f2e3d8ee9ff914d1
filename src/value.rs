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

//! Values held by stores and substitution mappings.
//!
//! Arrays come in two storage types. Numeric arrays hold plain `f64` and
//! mark an empty slot with NaN. Object arrays hold [`Element`]s so a single
//! slot can carry a sweep placeholder or a linked callable next to numbers.

use crate::key::{Quantity, Unit, VarKey};
use crate::store::{KeyError, ValueStore};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis, Dimension, IxDyn, Zip};
use std::fmt;
use std::rc::Rc;

type LinkedFn = dyn Fn(&ValueStore) -> Result<Value, KeyError>;

/// A value computed from the other substituted values of a sweep iteration.
#[derive(Clone)]
pub struct Linked(Rc<LinkedFn>);

impl Linked {
    /// Wraps a callable evaluated against the current iteration's values.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ValueStore) -> Result<Value, KeyError> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Evaluates the callable.
    pub fn call(&self, ctx: &ValueStore) -> Result<Value, KeyError> {
        (self.0)(ctx)
    }

    /// Returns whether both handles wrap the same callable.
    pub fn ptr_eq(&self, other: &Linked) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Per-element thunk of a vector-valued callable.
    ///
    /// An unshaped result is taken as is, so a number fills every element.
    pub(crate) fn element(&self, idx: Vec<usize>) -> Linked {
        let whole = self.clone();
        Linked::new(move |ctx| {
            let value = whole.call(ctx)?;
            if value.shape().is_none() {
                return Ok(value);
            }
            value.value_at(&idx).ok_or_else(|| KeyError::IndexOutOfRange {
                key: "<linked value>".to_string(),
                index: fmt_index(&idx),
                shape: value.shape().unwrap_or_default(),
            })
        })
    }
}

impl PartialEq for Linked {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Linked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Linked(<fn>)")
    }
}

/// One slot of an object array.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A plain number; NaN marks an empty slot.
    Number(f64),
    /// Candidate values swept for this slot only.
    Sweep(ArrayD<f64>),
    /// A lazily computed slot.
    Linked(Linked),
}

impl Element {
    /// Returns whether this slot is empty.
    pub fn is_nan(&self) -> bool {
        matches!(self, Element::Number(v) if v.is_nan())
    }

    /// Converts a scalar-like value into a slot; shaped values have no slot form.
    pub fn from_value(value: Value) -> Option<Element> {
        match value {
            Value::Number(v) => Some(Element::Number(v)),
            Value::Quantity(q) => Some(Element::Number(q.magnitude)),
            Value::Sweep(candidates) => Some(Element::Sweep(candidates)),
            Value::Linked(f) => Some(Element::Linked(f)),
            Value::Array(_) | Value::Sequence(_) => None,
        }
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            Element::Number(v) => Value::Number(v),
            Element::Sweep(candidates) => Value::Sweep(candidates),
            Element::Linked(f) => Value::Linked(f),
        }
    }
}

/// Dense array storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// Plain numbers.
    Numeric(ArrayD<f64>),
    /// Numbers mixed with sweep placeholders and linked callables.
    Object(ArrayD<Element>),
}

impl ArrayData {
    /// A numeric or object array of the given shape with every slot empty.
    pub fn nan(shape: &[usize], object: bool) -> Self {
        if object {
            ArrayData::Object(ArrayD::from_elem(IxDyn(shape), Element::Number(f64::NAN)))
        } else {
            ArrayData::Numeric(ArrayD::from_elem(IxDyn(shape), f64::NAN))
        }
    }

    /// Builds an array from row-major elements; numeric when every element is a number.
    pub fn from_elements(shape: &[usize], elements: Vec<Element>) -> Option<Self> {
        if elements.iter().all(|e| matches!(e, Element::Number(_))) {
            let numbers = elements
                .into_iter()
                .map(|e| match e {
                    Element::Number(v) => v,
                    _ => f64::NAN,
                })
                .collect();
            ArrayD::from_shape_vec(IxDyn(shape), numbers)
                .ok()
                .map(ArrayData::Numeric)
        } else {
            ArrayD::from_shape_vec(IxDyn(shape), elements)
                .ok()
                .map(ArrayData::Object)
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            ArrayData::Numeric(a) => a.shape(),
            ArrayData::Object(a) => a.shape(),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ArrayData::Object(_))
    }

    /// Returns the numeric form, if every slot is a number.
    pub fn to_numeric(&self) -> Option<ArrayD<f64>> {
        match self {
            ArrayData::Numeric(a) => Some(a.clone()),
            ArrayData::Object(a) => {
                let numbers: Option<Vec<f64>> = a
                    .iter()
                    .map(|e| match e {
                        Element::Number(v) => Some(*v),
                        _ => None,
                    })
                    .collect();
                numbers.and_then(|n| ArrayD::from_shape_vec(a.raw_dim(), n).ok())
            }
        }
    }

    /// Switches numeric storage to object storage, keeping every value.
    pub(crate) fn promote(&mut self) {
        if let ArrayData::Numeric(a) = self {
            let promoted = a.mapv(Element::Number);
            *self = ArrayData::Object(promoted);
        }
    }

    fn index_fits(&self, idx: &[usize]) -> bool {
        let shape = self.shape();
        if idx.len() > shape.len() {
            return false;
        }
        let offset = shape.len() - idx.len();
        idx.iter().zip(&shape[offset..]).all(|(i, n)| i < n)
    }

    /// Reads the slot or sub-array at `idx`.
    ///
    /// An index shorter than the array rank addresses the trailing axes; the
    /// leading axis is the sweep axis and is returned whole.
    pub fn value_at(&self, idx: &[usize]) -> Option<Value> {
        if !self.index_fits(idx) {
            return None;
        }
        let whole_slot = idx.len() == self.shape().len();
        Some(match self {
            ArrayData::Numeric(a) => {
                let view = trailing(a.view(), idx);
                if whole_slot {
                    Value::Number(view.iter().next().copied()?)
                } else {
                    Value::Array(Rc::new(ArrayData::Numeric(view.to_owned())))
                }
            }
            ArrayData::Object(a) => {
                let view = trailing(a.view(), idx);
                if whole_slot {
                    view.iter().next().cloned()?.into_value()
                } else {
                    Value::Array(Rc::new(ArrayData::Object(view.to_owned())))
                }
            }
        })
    }

    /// Returns whether the slot at `idx` holds no NaN; `None` when out of range.
    pub fn is_present(&self, idx: &[usize]) -> Option<bool> {
        if !self.index_fits(idx) {
            return None;
        }
        Some(match self {
            ArrayData::Numeric(a) => trailing(a.view(), idx).iter().all(|v| !v.is_nan()),
            ArrayData::Object(a) => trailing(a.view(), idx).iter().all(|e| !e.is_nan()),
        })
    }

    /// Writes `element` at `idx`, promoting numeric storage when needed.
    ///
    /// Returns `false` without writing when `idx` is out of range.
    pub(crate) fn assign(&mut self, idx: &[usize], element: Element) -> bool {
        if !self.index_fits(idx) {
            return false;
        }
        if !matches!(element, Element::Number(_)) {
            self.promote();
        }
        match self {
            ArrayData::Numeric(a) => {
                if let Element::Number(v) = element {
                    trailing_mut(a.view_mut(), idx).fill(v);
                }
            }
            ArrayData::Object(a) => trailing_mut(a.view_mut(), idx).fill(element),
        }
        true
    }

    /// Returns whether every slot is empty.
    pub fn all_nan(&self) -> bool {
        match self {
            ArrayData::Numeric(a) => a.iter().all(|v| v.is_nan()),
            ArrayData::Object(a) => a.iter().all(Element::is_nan),
        }
    }

    /// Copies every non-empty slot of `incoming` over `self`.
    ///
    /// Both arrays must have the same shape.
    pub(crate) fn overwrite_present(&mut self, incoming: &ArrayData) {
        match incoming {
            ArrayData::Numeric(b) => match self {
                ArrayData::Numeric(a) => Zip::from(a).and(b).for_each(|x, &y| {
                    if !y.is_nan() {
                        *x = y;
                    }
                }),
                ArrayData::Object(a) => Zip::from(a).and(b).for_each(|x, &y| {
                    if !y.is_nan() {
                        *x = Element::Number(y);
                    }
                }),
            },
            ArrayData::Object(b) => {
                self.promote();
                if let ArrayData::Object(a) = self {
                    Zip::from(a).and(b).for_each(|x, y| {
                        if !y.is_nan() {
                            *x = y.clone();
                        }
                    });
                }
            }
        }
    }

    /// Iterates the slots in row-major order.
    pub fn elements(&self) -> Vec<Element> {
        match self {
            ArrayData::Numeric(a) => a.iter().map(|v| Element::Number(*v)).collect(),
            ArrayData::Object(a) => a.iter().cloned().collect(),
        }
    }
}

fn trailing<'a, A>(mut view: ArrayViewD<'a, A>, idx: &[usize]) -> ArrayViewD<'a, A> {
    let offset = view.ndim() - idx.len();
    for (j, &i) in idx.iter().enumerate().rev() {
        view = view.index_axis_move(Axis(offset + j), i);
    }
    view
}

fn trailing_mut<'a, A>(mut view: ArrayViewMutD<'a, A>, idx: &[usize]) -> ArrayViewMutD<'a, A> {
    let offset = view.ndim() - idx.len();
    for (j, &i) in idx.iter().enumerate().rev() {
        view = view.index_axis_move(Axis(offset + j), i);
    }
    view
}

/// A value as supplied by callers or held by a store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A plain number; NaN means "no value".
    Number(f64),
    /// A number with a unit, converted to the variable's unit on insertion.
    Quantity(Quantity),
    /// A dense array, shared until the store copies it for writing.
    Array(Rc<ArrayData>),
    /// A bare sequence of values, converted to a dense array on insertion.
    Sequence(Vec<Value>),
    /// Candidate values for an external sweep; never used as a number.
    Sweep(ArrayD<f64>),
    /// A lazily computed value.
    Linked(Linked),
}

impl Value {
    /// Wraps a numeric array.
    pub fn array(a: ArrayD<f64>) -> Self {
        Value::Array(Rc::new(ArrayData::Numeric(a)))
    }

    /// A one-dimensional numeric array.
    pub fn vector(values: Vec<f64>) -> Self {
        let n = values.len();
        match ArrayD::from_shape_vec(IxDyn(&[n]), values) {
            Ok(a) => Value::array(a),
            Err(_) => Value::Sequence(Vec::new()),
        }
    }

    /// Marks a list of candidates as swept.
    pub fn sweep(candidates: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = candidates.into_iter().collect();
        let n = values.len();
        Value::Sweep(
            ArrayD::from_shape_vec(IxDyn(&[n]), values)
                .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0]))),
        )
    }

    /// Wraps a callable as a linked value.
    pub fn linked<F>(f: F) -> Self
    where
        F: Fn(&ValueStore) -> Result<Value, KeyError> + 'static,
    {
        Value::Linked(Linked::new(f))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayData> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns whether this is the "no substitution" number.
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(v) if v.is_nan())
    }

    /// Returns whether this value carries a shape (arrays and sequences).
    pub fn is_shaped(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Sequence(_))
    }

    /// Shape of array-like values.
    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            Value::Array(a) => Some(a.shape().to_vec()),
            Value::Sweep(a) => Some(a.shape().to_vec()),
            Value::Sequence(_) => self.to_array_data().map(|a| a.shape().to_vec()),
            _ => None,
        }
    }

    /// Dense form of arrays and (possibly nested) sequences.
    ///
    /// Returns `None` for scalar-like values and ragged sequences.
    pub fn to_array_data(&self) -> Option<ArrayData> {
        match self {
            Value::Array(a) => Some(ArrayData::clone(a)),
            Value::Sequence(items) => {
                let mut elements = Vec::new();
                let shape = collect_elements(items, &mut elements)?;
                ArrayData::from_elements(&shape, elements)
            }
            _ => None,
        }
    }

    /// Reads the slot at `idx` of an array-like value; scalars broadcast.
    pub fn value_at(&self, idx: &[usize]) -> Option<Value> {
        match self {
            Value::Number(_) | Value::Quantity(_) | Value::Linked(_) => Some(self.clone()),
            Value::Sweep(_) => Some(self.clone()),
            Value::Array(a) => a.value_at(idx),
            Value::Sequence(_) => self.to_array_data()?.value_at(idx),
        }
    }

    /// Converts quantities to `key`'s declared unit, recursing into sequences.
    pub(crate) fn normalized(self, key: &VarKey) -> Result<Value, KeyError> {
        match self {
            Value::Quantity(q) => {
                let target = key.units().cloned().unwrap_or_else(Unit::dimensionless);
                q.to(&target)
                    .map(Value::Number)
                    .ok_or_else(|| KeyError::UnitMismatch {
                        key: key.to_string(),
                        from: q.unit.to_string(),
                        to: target.to_string(),
                    })
            }
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| item.normalized(key))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }
}

fn collect_elements(items: &[Value], out: &mut Vec<Element>) -> Option<Vec<usize>> {
    let mut inner: Option<Vec<usize>> = None;
    for item in items {
        let shape = match item {
            Value::Sequence(sub) => collect_elements(sub, out)?,
            Value::Array(a) => {
                out.extend(a.elements());
                a.shape().to_vec()
            }
            other => {
                out.push(Element::from_value(other.clone())?);
                Vec::new()
            }
        };
        match &inner {
            Some(expected) if *expected != shape => return None,
            Some(_) => {}
            None => inner = Some(shape),
        }
    }
    let mut shape = vec![items.len()];
    shape.extend(inner.unwrap_or_default());
    Some(shape)
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<Quantity> for Value {
    fn from(q: Quantity) -> Self {
        Value::Quantity(q)
    }
}

impl From<ArrayD<f64>> for Value {
    fn from(a: ArrayD<f64>) -> Self {
        Value::array(a)
    }
}

impl From<Rc<ArrayData>> for Value {
    fn from(a: Rc<ArrayData>) -> Self {
        Value::Array(a)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::Sequence(values.into_iter().map(Value::Number).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Sequence(values)
    }
}

impl From<Linked> for Value {
    fn from(f: Linked) -> Self {
        Value::Linked(f)
    }
}

/// Splits a raw value into (whole-entry swept, underlying value).
pub fn split_sweep(value: &Value) -> (bool, Value) {
    match value {
        Value::Sweep(candidates) => (true, Value::array(candidates.clone())),
        other => (false, other.clone()),
    }
}

/// Formats an index tuple as `[1]` or `[0, 2]`.
pub fn fmt_index(idx: &[usize]) -> String {
    let parts: Vec<String> = idx.iter().map(usize::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// Formats a shape the way tuples print: `(3,)`, `(2, 3)`.
pub fn fmt_shape(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        _ => {
            let parts: Vec<String> = shape.iter().map(usize::to_string).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Every index tuple of `shape`, last axis fastest.
pub(crate) fn row_major_indices(shape: &[usize]) -> Vec<Vec<usize>> {
    ndarray::indices(IxDyn(shape))
        .into_iter()
        .map(|idx| idx.slice().to_vec())
        .collect()
}
