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

//! `nom` parser for string lookups.
//!
//! The grammar is `name` or `name[i, j, ...]` with optional whitespace around
//! the brackets and separators. Indices are non-negative integers.

mod utils;

use crate::diagnostics::AliasParseError;
use crate::lookup::{Lookup, SourceSpan, Span};
use nom::Parser;
use nom::{
    IResult,
    combinator::{all_consuming, cut, map, opt},
    error::{VerboseError, VerboseErrorKind, context},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated},
};

use self::utils::{alias_name, index_literal, ws_char, ws0};

type PResult<'a, O> = IResult<Span<'a>, O, VerboseError<Span<'a>>>;

/// Parses a lookup string into a [`Lookup::Alias`].
pub(crate) fn parse_lookup(source: &str) -> Result<Lookup, AliasParseError> {
    let input = Span::new(source);
    // Trailing text after the closing bracket is a syntax error.
    match all_consuming(delimited(ws0, lookup, ws0))(input) {
        Ok((_, lookup)) => Ok(lookup),
        Err(err) => Err(parse_error_to_diagnostic(err, source)),
    }
}

fn lookup(input: Span<'_>) -> PResult<'_, Lookup> {
    map(pair(alias_name, opt(index_suffix)), |(name, index)| {
        Lookup::Alias { name, index }
    })
    .parse(input)
}

/// Parses `[i, j, ...]`. Once the bracket opens, errors are not backtracked.
fn index_suffix(input: Span<'_>) -> PResult<'_, Vec<usize>> {
    preceded(
        ws_char('['),
        cut(terminated(
            separated_list1(ws_char(','), index_literal),
            context("closing bracket", ws_char(']')),
        )),
    )
    .parse(input)
}

/// Converts a `nom` verbose error to a lookup diagnostic.
fn parse_error_to_diagnostic(err: nom::Err<VerboseError<Span<'_>>>, source: &str) -> AliasParseError {
    match err {
        nom::Err::Incomplete(_) => AliasParseError::message_only("Incomplete lookup"),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            // Anchor on the deepest recorded error.
            if let Some((span, kind)) = e.errors.last() {
                let span = SourceSpan::from_bounds(*span, *span);
                let detail = match kind {
                    VerboseErrorKind::Context(ctx) => format!("Syntax error: expected {ctx}"),
                    VerboseErrorKind::Char(c) => format!("Syntax error: expected '{c}'"),
                    VerboseErrorKind::Nom(kind) => format!("Syntax error near {kind:?}"),
                };
                AliasParseError::from_span(detail, source, &span)
            } else {
                AliasParseError::message_only("Syntax error")
            }
        }
    }
}
