use glycochem::GlycochemError;
use miette::Diagnostic;
use thiserror::Error;

pub type Result<T, E = LocalizationError> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, Error)]
pub enum LocalizationError {
    #[diagnostic(help(
        "a glycan box can only be localized onto a peptide with at least one candidate site"
    ))]
    #[error("the peptide has no candidate modification sites")]
    NoSites,

    #[diagnostic(help("each candidate site can carry at most one glycan"))]
    #[error("{glycans} glycans cannot be distributed across only {sites} candidate sites")]
    TooFewSites { sites: usize, glycans: usize },

    #[diagnostic(help(
        "child boxes must run from the empty box up to the full glycan box, see `glycochem::build_child_boxes`"
    ))]
    #[error("the supplied child boxes never reach the full glycan box")]
    MissingChildBoxes,

    #[error(transparent)]
    Glycochem(#[from] Box<GlycochemError>),

    #[error("failed to start the localization worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
