use std::fmt;

use miette::{Diagnostic, LabeledSpan, SourceSpan};
use nom::{IResult, error::ErrorKind, error::ParseError};
use thiserror::Error;

use crate::Monosaccharide;

pub type ParseResult<'a, O> = IResult<&'a str, O, ParseFailure<'a>>;

// NOTE: Public so that other parsers using `composition` or `structure` as building blocks can inspect errors
#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum CompositionErrorKind {
    #[error("expected a monosaccharide name (like Hex or HexNAc) followed by a count in parentheses")]
    ExpectedResidue,

    #[diagnostic(help(
        "double-check for typos: the recognised names are Hex, HexNAc, NeuAc, NeuGc, Fuc, Phospho, Sulfo, Na, Ac, \
        Xylose and Kdn"
    ))]
    #[error("the monosaccharide {0:?} is not recognised")]
    UnknownMonosaccharide(String),

    #[diagnostic(help("merge the repeated entries into a single count"))]
    #[error("{0:?} has already been counted in this composition")]
    RepeatedMonosaccharide(Monosaccharide),

    #[error("expected '(' to open a monosaccharide count")]
    ExpectedCountStart,

    #[error("expected a monosaccharide count")]
    ExpectedCount,

    #[diagnostic(help("you've probably forgotten to close an earlier '(' bracket"))]
    #[error("expected ')' to close a monosaccharide count")]
    ExpectedCountEnd,

    #[error("expected '(' to open a structure node")]
    ExpectedNodeStart,

    #[diagnostic(help("the recognised codes are H, N, A, G, F, P, S, Y, C, X and K"))]
    #[error("expected a one-letter monosaccharide code")]
    ExpectedCode,

    #[diagnostic(help("you've probably forgotten to close an earlier '(' bracket"))]
    #[error("expected ')' to close a structure node")]
    ExpectedNodeEnd,

    #[error("expected the end of input")]
    ExpectedEoi,

    #[diagnostic(help(
        "this is an internal error that you shouldn't ever see! If you have gotten this error, then please report \
        it as a bug!"
    ))]
    #[error("internal `nom` error: {0:?}")]
    NomError(ErrorKind),
}

impl CompositionErrorKind {
    const fn label(&self) -> Option<&'static str> {
        Some(match self {
            Self::ExpectedResidue => "expected monosaccharide",
            Self::UnknownMonosaccharide(_) => "unknown monosaccharide",
            Self::RepeatedMonosaccharide(_) => "repeated monosaccharide",
            Self::ExpectedCountStart | Self::ExpectedNodeStart => "expected '('",
            Self::ExpectedCount => "expected count",
            Self::ExpectedCountEnd | Self::ExpectedNodeEnd => "expected ')'",
            Self::ExpectedCode => "expected code",
            Self::ExpectedEoi => "input was expected to end here",
            Self::NomError(_) => return None,
        })
    }

    const fn is_internal(&self) -> bool {
        matches!(self, Self::NomError(_))
    }
}

// ---------------------------------------------------------------------------------------------------------------------

/// The error produced by the parsers in this module, pointing back into the text being parsed
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParseFailure<'a> {
    input: &'a str,
    length: usize,
    kind: CompositionErrorKind,
}

impl<'a> ParseFailure<'a> {
    pub(crate) const fn new(input: &'a str, kind: CompositionErrorKind) -> Self {
        Self {
            input,
            length: 0,
            kind,
        }
    }

    pub(crate) fn spanning(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> &CompositionErrorKind {
        &self.kind
    }

    pub(crate) fn into_final_error(self, full_input: &str) -> CompositionError {
        let offset = full_input.len() - self.input.len();
        // NOTE: The additional space is added so that Diagnostic labels can point to the end of an input
        let source_code = format!("{full_input} ");
        CompositionError {
            source_code,
            span: (offset, self.length).into(),
            kind: self.kind,
        }
    }
}

impl<'a> ParseError<&'a str> for ParseFailure<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self::new(input, CompositionErrorKind::NomError(kind))
    }

    // NOTE: The innermost error is the most specific, so that's the one that's kept
    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

/// Replaces internal `nom` errors produced by `parser` with a more descriptive `kind`
pub(crate) fn expect<'a, O>(
    mut parser: impl FnMut(&'a str) -> ParseResult<'a, O>,
    kind: CompositionErrorKind,
) -> impl FnMut(&'a str) -> ParseResult<'a, O> {
    move |i| {
        parser(i).map_err(|e| {
            e.map(|failure| {
                if failure.kind.is_internal() {
                    ParseFailure {
                        kind: kind.clone(),
                        ..failure
                    }
                } else {
                    failure
                }
            })
        })
    }
}

// ---------------------------------------------------------------------------------------------------------------------

/// A fully resolved parsing error, carrying its own copy of the text that failed to parse
#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("{kind}")]
pub struct CompositionError {
    source_code: String,
    span: SourceSpan,
    kind: CompositionErrorKind,
}

impl CompositionError {
    #[must_use]
    pub const fn kind(&self) -> &CompositionErrorKind {
        &self.kind
    }

    #[must_use]
    pub const fn span(&self) -> SourceSpan {
        self.span
    }
}

// NOTE: This is manually implemented because the label text depends on `self.kind`
impl Diagnostic for CompositionError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind.help()
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = self.kind.label()?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(label.to_owned()),
            self.span,
        ))))
    }
}
