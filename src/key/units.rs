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

//! Minimal unit tags attached to variable identities.
//!
//! Units arithmetic lives outside this crate. The store only needs to know
//! which dimension a unit measures and how to rescale a magnitude into the
//! unit a variable was declared with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named unit with a dimension label and a scale relative to that
/// dimension's base unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    symbol: String,
    dimension: String,
    scale: f64,
}

impl Unit {
    /// Creates a unit; `scale` is the number of base units per one of this unit.
    pub fn new(symbol: impl Into<String>, dimension: impl Into<String>, scale: f64) -> Self {
        Self {
            symbol: symbol.into(),
            dimension: dimension.into(),
            scale,
        }
    }

    /// The dimensionless unit.
    pub fn dimensionless() -> Self {
        Self::new("", "", 1.0)
    }

    /// Returns the display symbol (`""` when dimensionless).
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the dimension label.
    pub fn dimension(&self) -> &str {
        &self.dimension
    }

    /// Returns whether this unit carries no dimension.
    pub fn is_dimensionless(&self) -> bool {
        self.dimension.is_empty()
    }

    /// Conversion factor from `self` into `target`, or `None` across dimensions.
    pub fn factor_to(&self, target: &Unit) -> Option<f64> {
        (self.dimension == target.dimension).then(|| self.scale / target.scale)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            write!(f, "dimensionless")
        } else {
            write!(f, "{}", self.symbol)
        }
    }
}

/// A magnitude tagged with a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    /// Numeric magnitude expressed in `unit`.
    pub magnitude: f64,
    /// Unit of `magnitude`.
    pub unit: Unit,
}

impl Quantity {
    /// Creates a quantity.
    pub fn new(magnitude: f64, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    /// Returns the magnitude expressed in `target`, or `None` across dimensions.
    pub fn to(&self, target: &Unit) -> Option<f64> {
        self.unit.factor_to(target).map(|k| self.magnitude * k)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_dimensionless() {
            write!(f, "{}", self.magnitude)
        } else {
            write!(f, "{} {}", self.magnitude, self.unit.symbol)
        }
    }
}
