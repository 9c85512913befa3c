use miette::Diagnostic;
use thiserror::Error;

use crate::{GlycanId, parsers::errors::CompositionError};

pub type Result<T, E = Box<GlycochemError>> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum GlycochemError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Composition {
        #[from]
        error: CompositionError,
    },

    #[diagnostic(help("glycan identifiers are indices into the glycan database they were taken from"))]
    #[error("the glycan {id} could not be found in the supplied glycan database ({entries} entries)")]
    GlycanLookup { id: GlycanId, entries: usize },

    #[diagnostic(help("every glycan must contain at least one monosaccharide"))]
    #[error("the glycan composition is empty")]
    EmptyComposition,
}

impl GlycochemError {
    pub(crate) const fn glycan_lookup(id: GlycanId, entries: usize) -> Self {
        Self::GlycanLookup { id, entries }
    }
}
