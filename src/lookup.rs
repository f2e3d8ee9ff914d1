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

//! Lookup forms accepted by stores and indexes.
//!
//! A lookup is either a key or a string alias. String aliases may carry an
//! explicit element index (`"y[1]"`, `"m_Model[0, 2]"`), which is parsed once
//! at the API boundary.

use crate::diagnostics::AliasParseError;
use crate::key::VarKey;
use crate::parser::parse_lookup;
use crate::value::fmt_index;
use nom_locate::LocatedSpan;
use std::fmt;

/// Parser input span type carrying byte offsets and line/column info.
pub type Span<'a> = LocatedSpan<&'a str>;

/// Source range and anchor position for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based UTF-8 column.
    pub column: usize,
}

impl SourceSpan {
    /// Creates a source span from parser start/end positions.
    pub fn from_bounds(start: Span<'_>, end: Span<'_>) -> Self {
        Self {
            start: start.location_offset(),
            end: end.location_offset(),
            line: start.location_line() as usize,
            column: start.get_utf8_column(),
        }
    }

    /// Returns span length in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Anything a value can be looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// A key: scalar, whole vector, or vector element.
    Key(VarKey),
    /// A short or qualified name, optionally indexed.
    Alias {
        name: String,
        index: Option<Vec<usize>>,
    },
}

impl Lookup {
    /// An unindexed name lookup, matched verbatim.
    pub fn alias(name: impl Into<String>) -> Self {
        Lookup::Alias {
            name: name.into(),
            index: None,
        }
    }

    /// Parses `name` or `name[i, j, ...]`.
    pub fn parse(text: &str) -> Result<Self, AliasParseError> {
        parse_lookup(text)
    }

    /// Returns the key, for key lookups.
    pub fn as_key(&self) -> Option<&VarKey> {
        match self {
            Lookup::Key(key) => Some(key),
            Lookup::Alias { .. } => None,
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Key(key) => write!(f, "{key}"),
            Lookup::Alias { name, index: None } => write!(f, "{name}"),
            Lookup::Alias {
                name,
                index: Some(idx),
            } => write!(f, "{name}{}", fmt_index(idx)),
        }
    }
}

impl From<VarKey> for Lookup {
    fn from(key: VarKey) -> Self {
        Lookup::Key(key)
    }
}

impl From<&VarKey> for Lookup {
    fn from(key: &VarKey) -> Self {
        Lookup::Key(key.clone())
    }
}

/// Strings that do not parse as `name[index]` are matched verbatim.
impl From<&str> for Lookup {
    fn from(text: &str) -> Self {
        Lookup::parse(text).unwrap_or_else(|_| Lookup::alias(text))
    }
}

impl From<String> for Lookup {
    fn from(text: String) -> Self {
        Lookup::from(text.as_str())
    }
}

impl From<&Lookup> for Lookup {
    fn from(lookup: &Lookup) -> Self {
        lookup.clone()
    }
}
