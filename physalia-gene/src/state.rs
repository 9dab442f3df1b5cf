//! The state lattice: tagged state classes and growable per-family arenas.
//!
//! Every decoder state belongs to one family, keyed by a [`StateClass`]
//! (kind, strand, phase, protein flag). Families are append-only arenas of
//! [`LatticeState`]s ordered by stop position; predecessor links are stored
//! as `(family, index)` pairs ([`StateRef`]), never as references, so the
//! whole lattice lives and dies with one decode call.

use core::fmt;

use physalia_core::{PhysaliaError, Result};

/// Strand orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strand {
    Forward,
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// The closed set of lattice state kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateKind {
    SingleExon,
    FirstExon,
    InternalExon,
    LastExon,
    Intron,
    Intergenic,
}

impl StateKind {
    /// Whether states of this kind contribute exon coordinates to a gene.
    pub fn is_exon(&self) -> bool {
        matches!(
            self,
            StateKind::SingleExon
                | StateKind::FirstExon
                | StateKind::InternalExon
                | StateKind::LastExon
        )
    }

    /// Whether states of this kind belong to a gene (exons and introns).
    pub fn is_genic(&self) -> bool {
        !matches!(self, StateKind::Intergenic)
    }
}

/// Protein-evidence requirement attached to a state family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProteinEvidence {
    /// The state must not use protein support.
    No,
    /// The state requires protein support.
    Required,
    /// The state does not care (intergenic).
    Indifferent,
}

impl ProteinEvidence {
    /// Whether two statuses disagree (triggering the multi-protein penalty).
    pub fn disagrees_with(&self, other: &ProteinEvidence) -> bool {
        match (self, other) {
            (ProteinEvidence::Indifferent, _) | (_, ProteinEvidence::Indifferent) => false,
            (a, b) => a != b,
        }
    }
}

/// The family key: kind, strand, reading phase, and protein flag.
///
/// Phase is the number of coding bases accumulated left-to-right at the
/// state's right edge, modulo 3; kinds that do not track phase use 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateClass {
    pub kind: StateKind,
    pub strand: Strand,
    pub phase: u8,
    pub protein: ProteinEvidence,
}

impl StateClass {
    pub fn new(kind: StateKind, strand: Strand, phase: u8, protein: ProteinEvidence) -> Self {
        debug_assert!(phase < 3, "phase {phase} out of range");
        Self {
            kind,
            strand,
            phase,
            protein,
        }
    }
}

/// A back-pointer to the best predecessor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateRef {
    /// The sentinel root: the decode starts here, at position 0.
    Root,
    /// A state in `family` at `index`.
    Node { family: usize, index: usize },
}

/// One lattice node: a state ending at `stop` (exclusive, half-open span).
///
/// Immutable once inserted; the forward pass only ever inserts the best
/// candidate per signal, so scores never decrease after finalisation.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatticeState {
    /// End of the state's span (exclusive).
    pub stop: usize,
    /// Best cumulative path score ending in this state.
    pub score: f64,
    /// Best predecessor.
    pub left: StateRef,
}

/// All state families of one decode session.
pub struct Lattice {
    classes: Vec<StateClass>,
    states: Vec<Vec<LatticeState>>,
}

impl Lattice {
    /// Enumerate the fixed family set.
    ///
    /// Per strand and protein flag: phase-split first/internal exons and
    /// introns on the forward strand, phase-split last/internal exons and
    /// introns on the reverse strand, single phase for the remaining exon
    /// kinds; one shared intergenic family.
    pub fn new() -> Self {
        let mut classes = Vec::new();
        for strand in [Strand::Forward, Strand::Reverse] {
            for protein in [ProteinEvidence::No, ProteinEvidence::Required] {
                for phase in 0..3u8 {
                    classes.push(StateClass::new(StateKind::InternalExon, strand, phase, protein));
                    classes.push(StateClass::new(StateKind::Intron, strand, phase, protein));
                    let phased_edge = match strand {
                        Strand::Forward => StateKind::FirstExon,
                        Strand::Reverse => StateKind::LastExon,
                    };
                    classes.push(StateClass::new(phased_edge, strand, phase, protein));
                }
                let unphased_edge = match strand {
                    Strand::Forward => StateKind::LastExon,
                    Strand::Reverse => StateKind::FirstExon,
                };
                classes.push(StateClass::new(unphased_edge, strand, 0, protein));
                classes.push(StateClass::new(StateKind::SingleExon, strand, 0, protein));
            }
        }
        classes.push(StateClass::new(
            StateKind::Intergenic,
            Strand::Forward,
            0,
            ProteinEvidence::Indifferent,
        ));
        let states = classes.iter().map(|_| Vec::new()).collect();
        Self { classes, states }
    }

    /// Number of families.
    pub fn n_families(&self) -> usize {
        self.classes.len()
    }

    /// The class of family `id`.
    pub fn class(&self, id: usize) -> &StateClass {
        &self.classes[id]
    }

    /// The states of family `id`, ordered by stop position.
    pub fn states(&self, id: usize) -> &[LatticeState] {
        &self.states[id]
    }

    /// Look up the family id for a class.
    ///
    /// The intergenic family is shared between strands.
    pub fn family_id(&self, class: &StateClass) -> Option<usize> {
        if class.kind == StateKind::Intergenic {
            return Some(self.classes.len() - 1);
        }
        self.classes.iter().position(|c| c == class)
    }

    /// Append a state to family `id`.
    ///
    /// Growth failure surfaces as [`PhysaliaError::Resource`] instead of an
    /// allocation unwind.
    pub fn push(&mut self, id: usize, state: LatticeState) -> Result<()> {
        let family = &mut self.states[id];
        debug_assert!(
            family.last().map_or(true, |s| s.stop <= state.stop),
            "states must be inserted in stop order"
        );
        if family.len() == family.capacity() {
            let grow = family.capacity().max(16);
            family.try_reserve(grow).map_err(|e| {
                PhysaliaError::Resource(format!("growing lattice family {id}: {e}"))
            })?;
        }
        family.push(state);
        Ok(())
    }

    /// Resolve a back-pointer, or `None` for the root.
    pub fn resolve(&self, r: StateRef) -> Option<(&StateClass, &LatticeState)> {
        match r {
            StateRef::Root => None,
            StateRef::Node { family, index } => {
                Some((&self.classes[family], &self.states[family][index]))
            }
        }
    }
}

impl Default for Lattice {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_enumeration_is_complete() {
        let lattice = Lattice::new();
        // 11 genic families per strand x protein flag, plus one intergenic
        assert_eq!(lattice.n_families(), 45);
        let ig = lattice
            .family_id(&StateClass::new(
                StateKind::Intergenic,
                Strand::Reverse,
                0,
                ProteinEvidence::Indifferent,
            ))
            .unwrap();
        assert_eq!(ig, lattice.n_families() - 1);
    }

    #[test]
    fn genic_families_exist_for_both_strands() {
        let lattice = Lattice::new();
        for strand in [Strand::Forward, Strand::Reverse] {
            for phase in 0..3 {
                let c = StateClass::new(StateKind::Intron, strand, phase, ProteinEvidence::No);
                assert!(lattice.family_id(&c).is_some(), "missing {c:?}");
            }
            let c = StateClass::new(StateKind::SingleExon, strand, 0, ProteinEvidence::Required);
            assert!(lattice.family_id(&c).is_some());
        }
    }

    #[test]
    fn push_and_resolve() {
        let mut lattice = Lattice::new();
        let fam = lattice
            .family_id(&StateClass::new(
                StateKind::Intron,
                Strand::Forward,
                1,
                ProteinEvidence::No,
            ))
            .unwrap();
        lattice
            .push(
                fam,
                LatticeState {
                    stop: 10,
                    score: -1.5,
                    left: StateRef::Root,
                },
            )
            .unwrap();
        let (class, state) = lattice
            .resolve(StateRef::Node { family: fam, index: 0 })
            .unwrap();
        assert_eq!(class.kind, StateKind::Intron);
        assert_eq!(state.stop, 10);
        assert!(lattice.resolve(StateRef::Root).is_none());
    }

    #[test]
    fn protein_disagreement() {
        use ProteinEvidence::*;
        assert!(No.disagrees_with(&Required));
        assert!(Required.disagrees_with(&No));
        assert!(!No.disagrees_with(&No));
        assert!(!Indifferent.disagrees_with(&Required));
        assert!(!No.disagrees_with(&Indifferent));
    }
}
