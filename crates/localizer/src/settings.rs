// Standard Library Imports
use std::{num::NonZeroUsize, thread};

// External Crate Imports
use knuffel::{
    Decode,
    span::{Span, Spanned},
};
use miette::{Diagnostic, LabeledSpan, NamedSource, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

// Local Crate Imports
use crate::Tolerance;

// Public API ==========================================================================================================

/// Everything that stays fixed across a localization run
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct LocalizationSettings {
    /// The most glycans that a single peptide can carry
    pub max_glycans: usize,
    /// Whether a decoy twin should be built for every glycan box
    pub decoys: bool,
    /// Seeds the random decoy mass perturbations
    pub seed: u64,
    pub precursor_tolerance: Tolerance,
    pub product_tolerance: Tolerance,
    /// Placements with a lower site probability demote a [`crate::LocalizationLevel::Level1`] localization
    pub min_site_probability: f64,
    /// Glycan boxes with total scores this close to the best are localized together
    pub score_tie_tolerance: f64,
    /// Skips spectra without a HexNAc oxonium ion, and glycan boxes that lack a sialic acid whose oxonium ions were seen
    pub oxonium_filter: bool,
    pub threads: usize,
}

impl Default for LocalizationSettings {
    fn default() -> Self {
        Self {
            max_glycans: 3,
            decoys: false,
            seed: 0,
            precursor_tolerance: Tolerance::Ppm(10.0),
            product_tolerance: Tolerance::Ppm(20.0),
            min_site_probability: 0.75,
            score_tie_tolerance: 1e-8,
            oxonium_filter: false,
            threads: thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

impl LocalizationSettings {
    /// Reads settings from a KDL document, falling back to the defaults for any missing nodes
    pub fn from_kdl(file_name: impl AsRef<str>, kdl_text: impl AsRef<str>) -> Result<Self> {
        let parsed_settings: SettingsKdl = knuffel::parse(file_name.as_ref(), kdl_text.as_ref())?;
        let settings = parsed_settings
            .validate()
            .map_err(|e| e.finalize(file_name, kdl_text))?;
        debug!(?settings, "loaded localization settings");
        Ok(settings)
    }
}

// KDL File Schema =====================================================================================================

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct SettingsKdl {
    #[knuffel(child, unwrap(argument))]
    max_glycans: Option<Spanned<usize, Span>>,
    #[knuffel(child, unwrap(argument))]
    decoys: Option<bool>,
    #[knuffel(child, unwrap(argument))]
    seed: Option<u64>,
    #[knuffel(child)]
    precursor_tolerance: Option<ToleranceKdl>,
    #[knuffel(child)]
    product_tolerance: Option<ToleranceKdl>,
    #[knuffel(child, unwrap(argument))]
    min_site_probability: Option<Spanned<f64, Span>>,
    #[knuffel(child, unwrap(argument))]
    score_tie_tolerance: Option<Spanned<f64, Span>>,
    #[knuffel(child, unwrap(argument))]
    oxonium_filter: Option<bool>,
    #[knuffel(child, unwrap(argument))]
    threads: Option<Spanned<usize, Span>>,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct ToleranceKdl {
    #[knuffel(span)]
    span: Span,
    #[knuffel(argument)]
    value: f64,
    #[knuffel(property)]
    unit: Option<String>,
}

// Settings Validation =================================================================================================

type SettingsResult<T> = std::result::Result<T, SettingsErrorKind>;

impl SettingsKdl {
    fn validate(self) -> SettingsResult<LocalizationSettings> {
        let defaults = LocalizationSettings::default();

        let max_glycans = match self.max_glycans {
            Some(count) if *count == 0 => return Err(SettingsErrorKind::NoGlycans(*count.span())),
            Some(count) => *count,
            None => defaults.max_glycans,
        };

        let threads = match self.threads {
            Some(count) if *count == 0 => return Err(SettingsErrorKind::NoThreads(*count.span())),
            Some(count) => *count,
            None => defaults.threads,
        };

        let min_site_probability = match self.min_site_probability {
            Some(p) if !(0.0..=1.0).contains(&*p) => {
                return Err(SettingsErrorKind::InvalidProbability(*p.span(), *p));
            }
            Some(p) => *p,
            None => defaults.min_site_probability,
        };

        let score_tie_tolerance = match self.score_tie_tolerance {
            Some(t) if !(*t >= 0.0) => {
                return Err(SettingsErrorKind::NegativeTolerance(*t.span(), *t));
            }
            Some(t) => *t,
            None => defaults.score_tie_tolerance,
        };

        let precursor_tolerance = self
            .precursor_tolerance
            .map_or(Ok(defaults.precursor_tolerance), ToleranceKdl::validate)?;
        let product_tolerance = self
            .product_tolerance
            .map_or(Ok(defaults.product_tolerance), ToleranceKdl::validate)?;

        Ok(LocalizationSettings {
            max_glycans,
            decoys: self.decoys.unwrap_or(defaults.decoys),
            seed: self.seed.unwrap_or(defaults.seed),
            precursor_tolerance,
            product_tolerance,
            min_site_probability,
            score_tie_tolerance,
            oxonium_filter: self.oxonium_filter.unwrap_or(defaults.oxonium_filter),
            threads,
        })
    }
}

impl ToleranceKdl {
    fn validate(self) -> SettingsResult<Tolerance> {
        if !(self.value >= 0.0) {
            return Err(SettingsErrorKind::NegativeTolerance(self.span, self.value));
        }
        match self.unit.as_deref() {
            None | Some("ppm") => Ok(Tolerance::Ppm(self.value)),
            Some("da" | "Da") => Ok(Tolerance::Absolute(self.value)),
            Some(unit) => Err(SettingsErrorKind::UnknownUnit(self.span, unit.to_owned())),
        }
    }
}

// Validation Error Types and Trait Implementations  ===================================================================

#[derive(Debug, Error)]
#[error("failed to validate localization settings")]
struct SettingsError {
    kdl: NamedSource<String>,
    #[source]
    kind: SettingsErrorKind,
}

// NOTE: This is manually implemented because the label needs to be extracted from `self.kind`
impl Diagnostic for SettingsError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.kdl)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        let (span, label) = self.kind.label();
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(label.to_owned()),
            *span,
        ))))
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        Some(&self.kind)
    }
}

#[derive(Clone, Debug, Diagnostic, Error)]
enum SettingsErrorKind {
    #[error("at least one glycan must be allowed per peptide")]
    NoGlycans(Span),

    #[error("at least one worker thread is needed")]
    NoThreads(Span),

    #[error("the site probability {1} must be between 0 and 1")]
    InvalidProbability(Span, f64),

    #[error("the tolerance {1} must not be negative")]
    NegativeTolerance(Span, f64),

    #[error("the tolerance unit {1:?} is not recognised")]
    #[diagnostic(help("tolerances are given in either `unit=\"ppm\"` or `unit=\"da\"`"))]
    UnknownUnit(Span, String),
}

impl SettingsErrorKind {
    const fn label(&self) -> (&Span, &'static str) {
        match self {
            Self::NoGlycans(s) => (s, "expected a positive glycan count"),
            Self::NoThreads(s) => (s, "expected a positive thread count"),
            Self::InvalidProbability(s, _) => (s, "invalid probability"),
            Self::NegativeTolerance(s, _) => (s, "negative tolerance"),
            Self::UnknownUnit(s, _) => (s, "unknown unit"),
        }
    }

    fn finalize(self, file_name: impl AsRef<str>, kdl: impl AsRef<str>) -> SettingsError {
        let kdl = NamedSource::new(file_name, kdl.as_ref().to_owned());
        SettingsError { kdl, kind: self }
    }
}

// Module Tests ========================================================================================================
