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

//! Error types surfaced by key resolution and value storage.

use crate::diagnostics::AliasParseError;
use crate::value::fmt_shape;
use thiserror::Error;

/// Errors produced while resolving keys or storing values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeyError {
    /// The lookup matched no variable.
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    /// The lookup matched several unrelated variables.
    #[error(
        "'{alias}' refers to multiple keys ({}); use a qualified name or the key itself",
        .candidates.join(", ")
    )]
    AmbiguousKey {
        alias: String,
        candidates: Vec<String>,
    },
    /// An assigned or swept array does not fit the variable's shape.
    #[error("cannot use array of shape {found} for variable {key} of shape {expected}")]
    ShapeMismatch {
        key: String,
        expected: String,
        found: String,
    },
    /// An explicit index lies outside the variable's declared shape.
    #[error("index {index} is out of range for {key} of shape {}", fmt_shape(.shape))]
    IndexOutOfRange {
        key: String,
        index: String,
        shape: Vec<usize>,
    },
    /// A quantity could not be converted into the variable's unit.
    #[error("cannot convert {from} to {to} for variable {key}")]
    UnitMismatch { key: String, from: String, to: String },
    /// An indexed access hit a stored value that is not an array.
    #[error("{0} has an index, but its stored value is not an array")]
    NotAnArray(String),
    /// A string lookup could not be parsed.
    #[error("{0}")]
    Parse(AliasParseError),
    /// A snapshot could not be loaded.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
    /// A linked callable failed.
    #[error("linked value for {key} failed: {message}")]
    Linked { key: String, message: String },
}

impl From<AliasParseError> for KeyError {
    fn from(value: AliasParseError) -> Self {
        KeyError::Parse(value)
    }
}

impl KeyError {
    /// Shape mismatch between a variable's shape and an offered array's shape.
    pub(crate) fn shape_mismatch(key: impl ToString, expected: &[usize], found: &[usize]) -> Self {
        KeyError::ShapeMismatch {
            key: key.to_string(),
            expected: fmt_shape(expected),
            found: fmt_shape(found),
        }
    }
}
