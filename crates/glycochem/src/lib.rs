//! Glycan compositions, glycan databases, and the combinatorics of glycan boxes

pub mod composition;
pub mod errors;
pub mod glycan_box;
pub mod glycan_database;
mod mass;
pub mod monosaccharide;
pub mod parsers;

pub use composition::Composition;
pub use errors::{GlycochemError, Result};
pub use glycan_box::{
    GlycanBox, GlycanBoxes, build_boxes, build_boxes_with_decoys, build_child_boxes,
    build_decoy_child_boxes,
};
pub use glycan_database::{Glycan, GlycanDatabase, GlycanId, GlycanIon};
pub use mass::Mass;
pub use monosaccharide::{MONOSACCHARIDE_KINDS, Monosaccharide};
