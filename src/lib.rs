//! Localizing glycans on glycopeptides from their electron-based fragmentation spectra
//!
//! The heavy lifting lives in two crates, which are re-exported here: [`glycochem`] knows about glycans and how they
//! combine into glycan boxes, and [`localizer`] works out where on a peptide each glycan of a box was attached.

pub use glycochem;
pub use localizer;
