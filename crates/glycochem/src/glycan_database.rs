// Standard Library Imports
use std::collections::hash_map::Entry;

// External Crate Imports
use ahash::{HashMap, HashMapExt};
use derive_more::{Display, From, Into};
use knuffel::{
    Decode,
    span::{Span, Spanned},
};
use miette::{Diagnostic, LabeledSpan, NamedSource, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

// Local Crate Imports
use crate::{Composition, Mass, errors::GlycochemError};

// Public API ==========================================================================================================

pub const DEFAULT_KDL: &str = include_str!("../data/glycan_database.kdl");

/// An index into a [`GlycanDatabase`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From, Into, Serialize)]
pub struct GlycanId(usize);

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Glycan {
    id: GlycanId,
    composition: Composition,
    mass: Mass,
    structure: Option<String>,
    ions: Vec<GlycanIon>,
}

/// A diagnostic fragment of a glycan, left attached to the peptide after the rest of the glycan is lost
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub struct GlycanIon {
    composition: Composition,
    mass: Mass,
    loss: Mass,
}

/// The immutable table of glycans that glycan boxes are assembled from
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct GlycanDatabase {
    glycans: Vec<Glycan>,
}

impl GlycanDatabase {
    pub fn new(file_name: impl AsRef<str>, kdl_text: impl AsRef<str>) -> Result<Self> {
        let parsed_db: GlycanDatabaseKdl = knuffel::parse(file_name.as_ref(), kdl_text.as_ref())?;
        let db = parsed_db
            .validate(())
            .map_err(|e| e.finalize(file_name, kdl_text))?;
        debug!(glycans = db.len(), "loaded glycan database");
        Ok(db)
    }

    /// Builds a database without structures or ions, assigning identifiers in iteration order
    pub fn from_compositions(
        compositions: impl IntoIterator<Item = Composition>,
    ) -> crate::Result<Self> {
        let glycans = compositions
            .into_iter()
            .enumerate()
            .map(|(index, composition)| {
                if composition.is_empty() {
                    return Err(Box::new(GlycochemError::EmptyComposition));
                }
                Ok(Glycan::new(GlycanId(index), composition, None, Vec::new()))
            })
            .collect::<crate::Result<_>>()?;
        Ok(Self { glycans })
    }

    #[must_use]
    pub fn get(&self, id: GlycanId) -> Option<&Glycan> {
        self.glycans.get(id.0)
    }

    pub fn glycan(&self, id: GlycanId) -> crate::Result<&Glycan> {
        self.get(id)
            .ok_or_else(|| Box::new(GlycochemError::glycan_lookup(id, self.len())))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.glycans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glycans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Glycan> {
        self.glycans.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = GlycanId> + use<> {
        (0..self.len()).map(GlycanId)
    }
}

impl Default for GlycanDatabase {
    fn default() -> Self {
        // SAFETY: The built-in database is checked by `default_database_is_valid` below
        Self::new("glycan_database.kdl", DEFAULT_KDL).unwrap()
    }
}

impl Glycan {
    fn new(
        id: GlycanId,
        composition: Composition,
        structure: Option<String>,
        ions: Vec<GlycanIon>,
    ) -> Self {
        let mass = composition.mass();
        Self {
            id,
            composition,
            mass,
            structure,
            ions,
        }
    }

    #[must_use]
    pub const fn id(&self) -> GlycanId {
        self.id
    }

    #[must_use]
    pub const fn composition(&self) -> &Composition {
        &self.composition
    }

    #[must_use]
    pub const fn mass(&self) -> Mass {
        self.mass
    }

    #[must_use]
    pub fn structure(&self) -> Option<&str> {
        self.structure.as_deref()
    }

    #[must_use]
    pub fn ions(&self) -> &[GlycanIon] {
        &self.ions
    }
}

impl GlycanIon {
    #[must_use]
    pub const fn composition(&self) -> &Composition {
        &self.composition
    }

    #[must_use]
    pub const fn mass(&self) -> Mass {
        self.mass
    }

    /// The mass of the part of the glycan that this ion has lost
    #[must_use]
    pub const fn loss(&self) -> Mass {
        self.loss
    }
}

// KDL File Schema =====================================================================================================

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct GlycanDatabaseKdl {
    #[knuffel(child, unwrap(children))]
    glycans: Vec<GlycanKdl>,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct GlycanKdl {
    #[knuffel(span)]
    span: Span,
    #[knuffel(node_name)]
    notation: String,
    #[knuffel(argument)]
    text: CompositionKdl,
    #[knuffel(children(name = "ion"))]
    ions: Vec<IonKdl>,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct IonKdl {
    #[knuffel(argument)]
    composition: CompositionKdl,
}

type CompositionKdl = Spanned<String, Span>;

// Contextual Validation Trait  ========================================================================================

type DbResult<T> = std::result::Result<T, DatabaseErrorKind>;

trait ValidateInto<'c, T> {
    type Context: 'c;

    fn validate(self, ctx: Self::Context) -> DbResult<T>;
}

// Glycan Database Validation ==========================================================================================

impl ValidateInto<'_, GlycanDatabase> for GlycanDatabaseKdl {
    type Context = ();

    fn validate(self, _ctx: Self::Context) -> DbResult<GlycanDatabase> {
        let mut first_seen: HashMap<Composition, Span> = HashMap::new();
        let mut glycans = Vec::with_capacity(self.glycans.len());

        for (index, glycan_kdl) in self.glycans.into_iter().enumerate() {
            let span = glycan_kdl.span;
            let glycan = glycan_kdl.validate(GlycanId(index))?;
            match first_seen.entry(glycan.composition) {
                Entry::Occupied(e) => {
                    return Err(DatabaseErrorKind::DuplicateGlycan(
                        *e.get(),
                        span,
                        glycan.composition.to_string(),
                    ));
                }
                Entry::Vacant(e) => e.insert(span),
            };
            glycans.push(glycan);
        }

        Ok(GlycanDatabase { glycans })
    }
}

// ---------------------------------------------------------------------------------------------------------------------

impl ValidateInto<'_, Glycan> for GlycanKdl {
    type Context = GlycanId;

    fn validate(self, id: Self::Context) -> DbResult<Glycan> {
        let text_span = *self.text.span();
        let (composition, structure) = match self.notation.as_str() {
            "composition" => (Composition::new(&*self.text), None),
            "structure" => (
                Composition::from_structure(&*self.text),
                Some((*self.text).clone()),
            ),
            _ => return Err(DatabaseErrorKind::UnknownNotation(self.span, self.notation)),
        };
        let composition =
            composition.map_err(|e| DatabaseErrorKind::Composition(text_span, *e))?;
        if composition.is_empty() {
            return Err(DatabaseErrorKind::EmptyGlycan(text_span));
        }

        let ions = self
            .ions
            .into_iter()
            .map(|ion| ion.validate((text_span, &composition)))
            .collect::<DbResult<_>>()?;

        Ok(Glycan::new(id, composition, structure, ions))
    }
}

// ---------------------------------------------------------------------------------------------------------------------

impl<'c> ValidateInto<'c, GlycanIon> for IonKdl {
    type Context = (Span, &'c Composition);

    fn validate(self, (glycan_span, glycan): Self::Context) -> DbResult<GlycanIon> {
        let ion_span = *self.composition.span();
        let composition = Composition::new(&*self.composition)
            .map_err(|e| DatabaseErrorKind::Composition(ion_span, *e))?;
        let lost = glycan.checked_sub(composition).ok_or_else(|| {
            DatabaseErrorKind::OversizedIon(
                ion_span,
                glycan_span,
                composition.to_string(),
                glycan.to_string(),
            )
        })?;

        Ok(GlycanIon {
            composition,
            mass: composition.mass(),
            loss: lost.mass(),
        })
    }
}

// Validation Error Types and Trait Implementations  ===================================================================

#[derive(Debug, Error)]
#[error("failed to validate glycan database file")]
struct DatabaseError {
    kdl: NamedSource<String>,
    #[source]
    kind: DatabaseErrorKind,
}

// NOTE: This is manually implemented because the list of labels is dynamic and needs to be extracted from `self.kind`
impl Diagnostic for DatabaseError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.kdl)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(self.kind.labels().into_iter().map(|(s, l)| {
            LabeledSpan::new_with_span(Some(l.to_owned()), *s)
        })))
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        Some(&self.kind)
    }
}

#[derive(Clone, Debug, Diagnostic, Error)]
enum DatabaseErrorKind {
    #[error("the glycan notation {1:?} is not recognised")]
    #[diagnostic(help(
        "glycans are written as either `composition \"HexNAc(1)Hex(1)\"` or `structure \"(N(H))\"`"
    ))]
    UnknownNotation(Span, String),

    #[error("the glycan {2} has already been defined")]
    #[diagnostic(help("remove the duplicate entry, glycans are identified by their composition"))]
    DuplicateGlycan(Span, Span, String),

    #[error("glycans must contain at least one monosaccharide")]
    EmptyGlycan(Span),

    #[error("the ion {2} cannot be a fragment of the glycan {3}")]
    #[diagnostic(help("an ion must not contain more of any monosaccharide than its glycan does"))]
    OversizedIon(Span, Span, String, String),

    #[error("glycan database file contained an invalid glycan composition")]
    Composition(
        Span,
        #[source]
        #[diagnostic_source]
        GlycochemError,
    ),
}

impl DatabaseErrorKind {
    fn labels(&self) -> Vec<(&Span, &'static str)> {
        match self {
            Self::UnknownNotation(s, _) => vec![(s, "unknown notation")],
            Self::DuplicateGlycan(s1, s2, _) => {
                vec![(s1, "first defined here"), (s2, "then again here")]
            }
            Self::EmptyGlycan(s) => vec![(s, "empty glycan")],
            Self::OversizedIon(s1, s2, _, _) => {
                vec![(s1, "this ion"), (s2, "isn't contained in this glycan")]
            }
            Self::Composition(s, _) => vec![(s, "invalid glycan composition")],
        }
    }

    fn finalize(self, file_name: impl AsRef<str>, kdl: impl AsRef<str>) -> DatabaseError {
        let kdl = NamedSource::new(file_name, kdl.as_ref().to_owned());
        DatabaseError { kdl, kind: self }
    }
}

// Module Tests ========================================================================================================
