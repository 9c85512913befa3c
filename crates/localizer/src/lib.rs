//! Localizing glycans onto the candidate sites of a peptide, using the fragments seen in its spectrum

pub mod errors;
pub mod evidence;
pub mod graph;
pub mod level;
pub mod oxonium;
pub mod probability;
pub mod route;
pub mod search;
pub mod settings;

pub use errors::{LocalizationError, Result};
pub use evidence::{
    CostFn, DeconvolutedScan, Envelope, EnvelopeSource, Fragment, FragmentEvidence,
    FragmentLadder, LocalEvidence, Tolerance,
};
pub use graph::{Cell, LocalizationGraph};
pub use level::{Localization, LocalizationLevel, LocalizedGlycan};
pub use oxonium::{OXONIUM_IONS, OxoniumIntensities};
pub use probability::{RandomMatchModel, SiteGlycanProbabilities, SiteProbabilities};
pub use route::{Route, SiteAssignment};
pub use search::{
    CandidateLocalization, Localizer, PeptideCandidate, SearchOutcome, SpectrumQuery,
};
pub use settings::LocalizationSettings;
