// Standard Library Imports
use std::ops::Range;

// External Crate Imports
use ahash::{HashSet, HashSetExt};
use itertools::Itertools;
use rand::Rng;
use serde::Serialize;

// Local Crate Imports
use crate::{Composition, Glycan, GlycanDatabase, GlycanId, Mass, Result};

// Public API ==========================================================================================================

/// Mass perturbations (scaled by 10^5) drawn from when building decoy glycan boxes
pub const DECOY_SHIFTS: [Mass; 38] = {
    const SHIFTS: [i64; 19] = [
        7_103_710, 10_300_920, 11_502_690, 12_904_260, 14_706_840, 5_702_150, 13_705_890, 12_809_500,
        11_308_410, 13_104_050, 11_404_290, 9_705_280, 12_805_860, 15_610_110, 8_703_200, 10_104_770,
        9_906_840, 18_607_930, 16_306_330,
    ];
    let mut shifts = [Mass::from_scaled(0); 38];
    let mut i = 0;
    while i < SHIFTS.len() {
        shifts[i] = Mass::from_scaled(SHIFTS[i]);
        shifts[i + SHIFTS.len()] = Mass::from_scaled(-SHIFTS[i]);
        i += 1;
    }
    shifts
};

/// A multiset of glycans that must be distributed, one per site, across the candidate sites of a peptide
///
/// Identifiers are kept sorted, so two boxes holding the same glycans are always equal. Decoy boxes hold the same
/// glycans as their target twin, but have a perturbed mass.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub struct GlycanBox {
    ids: Vec<GlycanId>,
    composition: Composition,
    mass: Mass,
    decoy: bool,
}

impl GlycanBox {
    pub fn new(db: &GlycanDatabase, ids: impl IntoIterator<Item = GlycanId>) -> Result<Self> {
        let glycans: Vec<_> = ids.into_iter().map(|id| db.glycan(id)).collect::<Result<_>>()?;
        Ok(Self::from_glycans(&glycans, false, Mass::default()))
    }

    pub fn new_decoy(
        db: &GlycanDatabase,
        ids: impl IntoIterator<Item = GlycanId>,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let glycans: Vec<_> = ids.into_iter().map(|id| db.glycan(id)).collect::<Result<_>>()?;
        Ok(Self::from_glycans(&glycans, true, random_shift(rng)))
    }

    #[must_use]
    pub fn ids(&self) -> &[GlycanId] {
        &self.ids
    }

    #[must_use]
    pub fn number_of_mods(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub const fn composition(&self) -> &Composition {
        &self.composition
    }

    /// The summed mass of every glycan in the box, plus any decoy perturbation
    #[must_use]
    pub const fn mass(&self) -> Mass {
        self.mass
    }

    #[must_use]
    pub const fn is_decoy(&self) -> bool {
        self.decoy
    }

    /// The canonical identifier string of this box, like `7,7,9`
    #[must_use]
    pub fn id_string(&self) -> String {
        self.ids.iter().join(",")
    }

    /// Returns `true` if `other` is a sub-multiset of this box, respecting repeated identifiers
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        let mut ours = self.ids.iter();
        other.ids.iter().all(|id| ours.any(|our_id| our_id == id))
    }

    /// The identifiers left after removing every identifier of `other` (once per occurrence) from this box
    #[must_use]
    pub fn difference(&self, other: &Self) -> Vec<GlycanId> {
        debug_assert!(self.contains(other));
        let mut removed = other.ids.iter().peekable();
        self.ids
            .iter()
            .filter(|&id| removed.next_if_eq(&id).is_none())
            .copied()
            .collect()
    }

    fn from_glycans(glycans: &[&Glycan], decoy: bool, shift: Mass) -> Self {
        let mut ids: Vec<_> = glycans.iter().map(|g| g.id()).collect();
        ids.sort_unstable();
        let composition = glycans.iter().map(|g| g.composition()).sum();
        let mass = glycans.iter().map(|g| g.mass()).sum::<Mass>() + shift;
        Self {
            ids,
            composition,
            mass,
            decoy,
        }
    }
}

/// Every multiset of 1 to `max_count` glycans from `db`, in order of size and then lexicographically
#[must_use]
pub fn build_boxes(db: &GlycanDatabase, max_count: usize) -> Vec<GlycanBox> {
    glycan_combinations(db, max_count)
        .map(|glycans| GlycanBox::from_glycans(&glycans, false, Mass::default()))
        .collect()
}

/// Like [`build_boxes`], but each target box is immediately followed by its decoy twin
pub fn build_boxes_with_decoys(
    db: &GlycanDatabase,
    max_count: usize,
    rng: &mut impl Rng,
) -> Vec<GlycanBox> {
    glycan_combinations(db, max_count)
        .flat_map(|glycans| {
            let target = GlycanBox::from_glycans(&glycans, false, Mass::default());
            let decoy = GlycanBox::from_glycans(&glycans, true, random_shift(rng));
            [target, decoy]
        })
        .collect()
}

/// Every distinct sub-multiset of `glycan_box`, starting with the empty box and ending with the full box
///
/// Child boxes are ordered by size, then by the order in which their positions are first picked from the full box.
/// Child boxes carry their parent's decoy flag, but never a decoy mass perturbation. Decoy boxes should use
/// [`build_decoy_child_boxes`] instead.
pub fn build_child_boxes(db: &GlycanDatabase, glycan_box: &GlycanBox) -> Result<Vec<GlycanBox>> {
    child_boxes(db, glycan_box, glycan_box.decoy, Mass::default)
}

/// Like [`build_child_boxes`], but every child box is a decoy with its own random mass perturbation
///
/// The empty box and the full box are perturbed too, so the full child box won't share its parent's mass.
pub fn build_decoy_child_boxes(
    db: &GlycanDatabase,
    glycan_box: &GlycanBox,
    rng: &mut impl Rng,
) -> Result<Vec<GlycanBox>> {
    child_boxes(db, glycan_box, true, || random_shift(rng))
}

// ---------------------------------------------------------------------------------------------------------------------

/// Glycan boxes sorted by mass, each paired with its child boxes
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GlycanBoxes {
    boxes: Vec<GlycanBox>,
    children: Vec<Vec<GlycanBox>>,
}

impl GlycanBoxes {
    /// Sorts `boxes` by mass and builds their child boxes with [`build_child_boxes`]
    pub fn new(db: &GlycanDatabase, boxes: Vec<GlycanBox>) -> Result<Self> {
        Self::with_children(boxes, |b| build_child_boxes(db, b))
    }

    /// Like [`GlycanBoxes::new`], but the child boxes of decoys come from [`build_decoy_child_boxes`]
    pub fn with_decoys(
        db: &GlycanDatabase,
        boxes: Vec<GlycanBox>,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        Self::with_children(boxes, |b| {
            if b.is_decoy() {
                build_decoy_child_boxes(db, b, rng)
            } else {
                build_child_boxes(db, b)
            }
        })
    }

    fn with_children(
        mut boxes: Vec<GlycanBox>,
        mut build_children: impl FnMut(&GlycanBox) -> Result<Vec<GlycanBox>>,
    ) -> Result<Self> {
        boxes.sort_by_key(GlycanBox::mass);
        let children = boxes
            .iter()
            .map(&mut build_children)
            .collect::<Result<_>>()?;
        Ok(Self { boxes, children })
    }

    /// The indices of every box with a mass between `low` and `high` (inclusive)
    #[must_use]
    pub fn within(&self, low: Mass, high: Mass) -> Range<usize> {
        let start = self.boxes.partition_point(|b| b.mass < low);
        let end = self.boxes.partition_point(|b| b.mass <= high);
        start..end.max(start)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&GlycanBox> {
        self.boxes.get(index)
    }

    #[must_use]
    pub fn children(&self, index: usize) -> &[GlycanBox] {
        self.children.get(index).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlycanBox> {
        self.boxes.iter()
    }
}

// Private Helper Functions ============================================================================================

fn glycan_combinations(
    db: &GlycanDatabase,
    max_count: usize,
) -> impl Iterator<Item = Vec<&Glycan>> {
    (1..=max_count).flat_map(move |count| db.iter().combinations_with_replacement(count))
}

fn child_boxes(
    db: &GlycanDatabase,
    glycan_box: &GlycanBox,
    decoy: bool,
    mut shift: impl FnMut() -> Mass,
) -> Result<Vec<GlycanBox>> {
    let ids = glycan_box.ids();
    let mut seen = HashSet::new();
    let mut children = Vec::new();

    for length in 0..=ids.len() {
        for positions in (0..ids.len()).combinations(length) {
            let glycans: Vec<_> = positions
                .iter()
                .map(|&p| db.glycan(ids[p]))
                .collect::<Result<_>>()?;
            let mut child = GlycanBox::from_glycans(&glycans, decoy, Mass::default());
            if seen.insert(child.id_string()) {
                child.mass += shift();
                children.push(child);
            }
        }
    }

    Ok(children)
}

fn random_shift(rng: &mut impl Rng) -> Mass {
    DECOY_SHIFTS[rng.gen_range(0..DECOY_SHIFTS.len())]
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use once_cell::sync::Lazy;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    const KDL: &str = include_str!("../tests/data/glycan_database.kdl");

    static DB: Lazy<GlycanDatabase> =
        Lazy::new(|| GlycanDatabase::new("test_glycan_database.kdl", KDL).unwrap());

    fn ids(raw: &[usize]) -> Vec<GlycanId> {
        raw.iter().copied().map(GlycanId::from).collect()
    }

    fn glycan_box(raw: &[usize]) -> GlycanBox {
        GlycanBox::new(&DB, ids(raw)).unwrap()
    }

    fn binomial(n: usize, k: usize) -> usize {
        (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
    }

    #[test]
    fn decoy_shifts_are_mirrored() {
        assert_eq!(DECOY_SHIFTS[0], Mass::from_scaled(7_103_710));
        assert_eq!(DECOY_SHIFTS[18], Mass::from_scaled(16_306_330));
        assert_eq!(DECOY_SHIFTS[19], Mass::from_scaled(-7_103_710));
        assert_eq!(DECOY_SHIFTS[37], Mass::from_scaled(-16_306_330));
        assert!(!DECOY_SHIFTS.contains(&Mass::default()));
    }

    #[test]
    fn box_mass_is_additive() {
        let sialyl_t = DB.get(GlycanId::from(2)).unwrap();
        let tn = DB.get(GlycanId::from(0)).unwrap();

        let glycan_box = glycan_box(&[2, 0, 2]);
        assert_eq!(glycan_box.ids(), ids(&[0, 2, 2]));
        assert_eq!(glycan_box.number_of_mods(), 3);
        assert_eq!(glycan_box.mass(), tn.mass() + sialyl_t.mass() + sialyl_t.mass());
        assert_eq!(glycan_box.mass(), glycan_box.composition().mass());
        assert_snapshot!(glycan_box.composition().to_string(), @"H2N3A2");
        assert_snapshot!(glycan_box.id_string(), @"0,2,2");
        assert!(!glycan_box.is_decoy());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let error = GlycanBox::new(&DB, ids(&[1, 42])).unwrap_err();
        assert_snapshot!(
            error.to_string(),
            @"the glycan 42 could not be found in the supplied glycan database (8 entries)"
        );
    }

    #[test]
    fn multiset_containment() {
        let full = glycan_box(&[7, 7, 2]);
        assert!(full.contains(&glycan_box(&[])));
        assert!(full.contains(&glycan_box(&[7])));
        assert!(full.contains(&glycan_box(&[2, 7])));
        assert!(full.contains(&glycan_box(&[7, 7])));
        assert!(full.contains(&full));
        assert!(!full.contains(&glycan_box(&[2, 2])));
        assert!(!full.contains(&glycan_box(&[3])));
        assert!(!full.contains(&glycan_box(&[7, 7, 7])));
        assert!(!glycan_box(&[7]).contains(&full));
    }

    #[test]
    fn multiset_difference() {
        let full = glycan_box(&[7, 7, 2]);
        assert_eq!(full.difference(&glycan_box(&[7])), ids(&[2, 7]));
        assert_eq!(full.difference(&glycan_box(&[2, 7])), ids(&[7]));
        assert_eq!(full.difference(&glycan_box(&[7, 7])), ids(&[2]));
        assert_eq!(full.difference(&glycan_box(&[])), ids(&[2, 7, 7]));
        assert_eq!(full.difference(&full), ids(&[]));
    }

    #[test]
    fn box_counts_are_multiset_coefficients() {
        let n = DB.len();
        for max_count in 1..=3 {
            let boxes = build_boxes(&DB, max_count);
            let expected: usize = (1..=max_count).map(|c| binomial(n + c - 1, c)).sum();
            assert_eq!(boxes.len(), expected);

            let unique: HashSet<_> = boxes.iter().map(GlycanBox::id_string).collect();
            assert_eq!(unique.len(), expected);
        }
        assert_eq!(build_boxes(&DB, 3).len(), 8 + 36 + 120);
        assert!(build_boxes(&DB, 0).is_empty());
    }

    #[test]
    fn boxes_are_built_in_lexicographic_order() {
        let boxes = build_boxes(&DB, 2);
        let id_strings: Vec<_> = boxes.iter().take(11).map(GlycanBox::id_string).collect();
        assert_eq!(
            id_strings,
            ["0", "1", "2", "3", "4", "5", "6", "7", "0,0", "0,1", "0,2"]
        );
        assert_eq!(boxes.last().unwrap().id_string(), "7,7");
    }

    #[test]
    fn decoys_follow_their_targets() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let boxes = build_boxes_with_decoys(&DB, 2, &mut rng);
        assert_eq!(boxes.len(), 2 * build_boxes(&DB, 2).len());

        for pair in boxes.chunks_exact(2) {
            let [target, decoy] = pair else { unreachable!() };
            assert!(!target.is_decoy());
            assert!(decoy.is_decoy());
            assert_eq!(target.ids(), decoy.ids());
            assert_eq!(target.composition(), decoy.composition());
            assert!(DECOY_SHIFTS.contains(&(decoy.mass() - target.mass())));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(boxes, build_boxes_with_decoys(&DB, 2, &mut rng));
    }

    #[test]
    fn single_decoy_boxes() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let decoy = GlycanBox::new_decoy(&DB, ids(&[1, 0]), &mut rng).unwrap();
        let target = glycan_box(&[0, 1]);
        assert!(decoy.is_decoy());
        assert_eq!(decoy.ids(), target.ids());
        assert!(DECOY_SHIFTS.contains(&(decoy.mass() - target.mass())));
    }

    #[test]
    fn child_boxes_of_distinct_glycans() {
        let full = glycan_box(&[1, 3, 5]);
        let children = build_child_boxes(&DB, &full).unwrap();
        assert_eq!(children.len(), 2_usize.pow(3));

        let id_strings: Vec<_> = children.iter().map(GlycanBox::id_string).collect();
        assert_eq!(id_strings, ["", "1", "3", "5", "1,3", "1,5", "3,5", "1,3,5"]);
        assert_eq!(children.last(), Some(&full));
        assert!(children.iter().all(|c| full.contains(c)));
    }

    #[test]
    fn child_boxes_of_repeated_glycans() {
        let full = glycan_box(&[7, 7, 2]);
        let children = build_child_boxes(&DB, &full).unwrap();

        let id_strings: Vec<_> = children.iter().map(GlycanBox::id_string).collect();
        assert_eq!(id_strings, ["", "2", "7", "2,7", "7,7", "2,7,7"]);
        assert!(children.len() < 2_usize.pow(3));

        let sizes: Vec<_> = children.iter().map(GlycanBox::number_of_mods).collect();
        assert!(sizes.is_sorted());
        assert!(children[0].is_empty());
        assert_eq!(children[0].mass(), Mass::default());
    }

    #[test]
    fn target_child_boxes_are_never_perturbed() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let decoy = GlycanBox::new_decoy(&DB, ids(&[0, 1]), &mut rng).unwrap();
        let children = build_child_boxes(&DB, &decoy).unwrap();
        assert!(children.iter().all(GlycanBox::is_decoy));
        assert!(children.iter().all(|c| c.mass() == c.composition().mass()));
        assert_ne!(children.last().unwrap().mass(), decoy.mass());
    }

    #[test]
    fn decoy_child_boxes_are_perturbed() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let decoy = GlycanBox::new_decoy(&DB, ids(&[0, 0]), &mut rng).unwrap();
        let targets = build_child_boxes(&DB, &glycan_box(&[0, 0])).unwrap();
        let decoys = build_decoy_child_boxes(&DB, &decoy, &mut rng).unwrap();

        assert_eq!(decoys.len(), targets.len());
        for (target, decoy) in targets.iter().zip(&decoys) {
            assert!(decoy.is_decoy());
            assert_eq!(decoy.ids(), target.ids());
            assert_eq!(decoy.composition(), target.composition());
            assert!(DECOY_SHIFTS.contains(&(decoy.mass() - target.mass())));
        }
        assert!(decoys[0].is_empty());
        assert_ne!(decoys[0].mass(), Mass::default());

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let decoy = GlycanBox::new_decoy(&DB, ids(&[0, 0]), &mut rng).unwrap();
        assert_eq!(decoys, build_decoy_child_boxes(&DB, &decoy, &mut rng).unwrap());
    }

    #[test]
    fn decoy_universes_perturb_only_decoy_children() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let boxes = build_boxes_with_decoys(&DB, 2, &mut rng);
        let boxes = GlycanBoxes::with_decoys(&DB, boxes, &mut rng).unwrap();
        assert_eq!(boxes.len(), 2 * (8 + 36));

        for (index, glycan_box) in boxes.iter().enumerate() {
            let children = boxes.children(index);
            assert_eq!(children.last().unwrap().ids(), glycan_box.ids());
            for child in children {
                assert_eq!(child.is_decoy(), glycan_box.is_decoy());
                let shift = child.mass() - child.composition().mass();
                if glycan_box.is_decoy() {
                    assert!(DECOY_SHIFTS.contains(&shift));
                } else {
                    assert_eq!(shift, Mass::default());
                }
            }
        }
    }

    #[test]
    fn glycan_boxes_are_sorted_and_searchable() {
        let boxes = GlycanBoxes::new(&DB, build_boxes(&DB, 2)).unwrap();
        assert_eq!(boxes.len(), 8 + 36);
        assert!(boxes.iter().map(GlycanBox::mass).is_sorted());

        for index in 0..boxes.len() {
            let children = boxes.children(index);
            assert_eq!(children.last(), boxes.get(index));
        }

        // Tn + Tn and T antigen + T antigen
        let tn_tn = Mass::from_scaled(2 * 20_307_937);
        let window = boxes.within(tn_tn, tn_tn);
        assert_eq!(window.len(), 1);
        assert_snapshot!(boxes.get(window.start).unwrap().id_string(), @"0,0");

        let window = boxes.within(Mass::from_scaled(40_000_000), Mass::from_scaled(75_000_000));
        assert!(window.clone().all(|i| {
            let mass = boxes.get(i).unwrap().mass().scaled();
            (40_000_000..=75_000_000).contains(&mass)
        }));
        assert!(!window.is_empty());

        assert!(boxes.within(Mass::from_scaled(10), Mass::from_scaled(20)).is_empty());
        assert!(boxes.within(Mass::from_scaled(20), Mass::from_scaled(10)).is_empty());
        assert!(boxes.children(boxes.len()).is_empty());
    }
}
